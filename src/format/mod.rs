//! Parallel source formatting
//!
//! This module provides:
//! - A formatter table (built in, or loaded from TOML)
//! - Discovery of formattable files with directory ignores
//! - Concurrent check or in-place runs of the external tools
//! - A summary report with per-file line changes in check mode

pub mod config;
pub mod diff;
pub mod discover;
pub mod report;
pub mod runner;

use anyhow::{Context, Result};
use colored::Colorize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

pub use config::FormatterTable;

/// Exit status after Ctrl+C
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors from a single formatter run or from setup
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("root directory '{}' not found", .0.display())]
    RootNotFound(PathBuf),

    #[error("'{0}' not found in PATH")]
    ToolMissing(String),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid formatter config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Options for one `format` invocation
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub root: PathBuf,
    /// Directories to skip, relative to `root` or absolute
    pub ignore: Vec<String>,
    /// Concurrent tool processes; defaults to available parallelism
    pub jobs: Option<usize>,
    /// Report required changes instead of rewriting files
    pub check: bool,
    pub verbose: bool,
    /// TOML file replacing the built-in formatter table
    pub config: Option<PathBuf>,
}

impl FormatOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: Vec::new(),
            jobs: None,
            check: false,
            verbose: false,
            config: None,
        }
    }

    fn job_count(&self) -> usize {
        self.jobs
            .filter(|j| *j > 0)
            .or_else(|| std::thread::available_parallelism().map(usize::from).ok())
            .unwrap_or(1)
    }
}

/// Load the formatter table from `path`, or the built-in one
pub fn load_table(path: Option<&Path>) -> Result<FormatterTable, FormatError> {
    let Some(path) = path else {
        return Ok(FormatterTable::builtin());
    };
    let text = std::fs::read_to_string(path).map_err(|source| FormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FormatterTable::from_toml(&text).map_err(|source| FormatError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Every table command that cannot be found
pub fn missing_tools(table: &FormatterTable) -> Vec<FormatError> {
    table
        .commands()
        .into_iter()
        .filter(|cmd| runner::find_on_path(cmd).is_none())
        .map(|cmd| FormatError::ToolMissing(cmd.to_string()))
        .collect()
}

/// Run the formatter command; returns the process exit code
pub fn run(options: &FormatOptions) -> Result<i32> {
    let table = load_table(options.config.as_deref())?;

    if options.verbose {
        println!("{}", "Formatters:".white().bold());
        for formatter in table.formatters() {
            println!("  {} -> {}", formatter.name.cyan(), formatter.command);
        }
    }

    let missing = missing_tools(&table);
    if !missing.is_empty() {
        for err in &missing {
            println!("{}", format!("[ERROR] {}.", err).red());
        }
        return Ok(1);
    }

    let root = match options.root.canonicalize() {
        Ok(root) if root.is_dir() => root,
        _ => {
            let err = FormatError::RootNotFound(options.root.clone());
            eprintln!("{}", format!("[ERROR] {}.", err).red());
            return Ok(1);
        }
    };

    let width = report::header_width();
    println!("{} Scanning for all source files in: {}", "[*]".cyan().bold(), root.display());

    let ignore = discover::resolve_ignore_dirs(&root, &options.ignore);
    if options.verbose && !options.ignore.is_empty() {
        println!("{}", report::banner("Ignored Directories", width));
        if ignore.dirs.is_empty() {
            println!("  (No directories matched the ignore entries)");
        }
        for dir in &ignore.dirs {
            println!("  {}", dir.display());
        }
        for entry in &ignore.unmatched {
            println!("  {} {}", "skipped:".dimmed(), entry);
        }
    }

    let files = discover::find_files(&root, &ignore.dirs, &table);
    if files.is_empty() {
        println!("No files found to process.");
        return Ok(0);
    }

    if options.verbose {
        println!("{}", report::banner("Files Found", width));
        for file in &files {
            let rel = file.path.strip_prefix(&root).unwrap_or(&file.path);
            println!("  {}", rel.display());
        }
    }

    let jobs = options.job_count();
    let action = if options.check { "Checking" } else { "Formatting" };
    println!(
        "{} Found {} files. {} using {} jobs.",
        "[*]".cyan().bold(),
        files.len(),
        action,
        jobs
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let check = options.check;
    let results = runtime.block_on(async move {
        tokio::select! {
            results = runner::run_all(files, jobs, check) => Some(results),
            Ok(()) = tokio::signal::ctrl_c() => None,
        }
    });

    let Some(results) = results else {
        println!("Operation cancelled by user.");
        return Ok(EXIT_INTERRUPTED);
    };

    let stdout = io::stdout();
    let code = report::write_report(&mut stdout.lock(), &results, &root, options.check, width)
        .context("Failed to write report")?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_job_count_defaults() {
        let mut options = FormatOptions::new(".");
        assert!(options.job_count() >= 1);
        options.jobs = Some(3);
        assert_eq!(options.job_count(), 3);
        options.jobs = Some(0);
        assert!(options.job_count() >= 1);
    }

    #[test]
    fn test_missing_tools_are_reported() {
        let table = FormatterTable::new(vec![config::Formatter {
            name: "ghost".into(),
            command: "definitely-not-a-real-formatter-tool".into(),
            args: vec![],
            extensions: vec!["c".into()],
            file_names: vec![],
        }]);
        let missing = missing_tools(&table);
        assert_eq!(missing.len(), 1);
        assert_eq!(
            missing[0].to_string(),
            "'definitely-not-a-real-formatter-tool' not found in PATH"
        );
    }

    #[test]
    fn test_load_table_errors() {
        let dir = tempdir().unwrap();
        let bad = dir.path().join("fmt.toml");
        fs::write(&bad, "[[formatter]]\nname = 1\n").unwrap();

        assert!(matches!(load_table(Some(&bad)), Err(FormatError::Config { .. })));
        assert!(matches!(
            load_table(Some(&dir.path().join("absent.toml"))),
            Err(FormatError::Io { .. })
        ));
        assert_eq!(load_table(None).unwrap().formatters().len(), 2);
    }

    #[test]
    fn test_missing_root_exits_with_error() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("fmt.toml");
        fs::write(&config, "").unwrap();

        let mut options = FormatOptions::new(dir.path().join("nope"));
        options.config = Some(config);
        assert_eq!(run(&options).unwrap(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_check_then_format_project() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("project");
        fs::create_dir_all(project.join("src")).unwrap();
        fs::create_dir_all(project.join("build")).unwrap();
        fs::write(project.join("src/main.c"), "int main;\n").unwrap();
        fs::write(project.join("build/gen.c"), "generated;\n").unwrap();

        let script = dir.path().join("upper.sh");
        fs::write(
            &script,
            "if [ \"$2\" = \"-i\" ]; then tr 'a-z' 'A-Z' < \"$1\" > \"$1.tmp\" && mv \"$1.tmp\" \"$1\"; else tr 'a-z' 'A-Z' < \"$1\"; fi\n",
        )
        .unwrap();
        let config = dir.path().join("fmt.toml");
        fs::write(
            &config,
            format!(
                "[[formatter]]\nname = \"upper\"\ncommand = \"sh\"\nargs = [\"{}\"]\nextensions = [\"c\"]\n",
                script.display()
            ),
        )
        .unwrap();

        let mut options = FormatOptions::new(&project);
        options.config = Some(config);
        options.ignore = vec!["build".to_string()];
        options.jobs = Some(2);

        options.check = true;
        assert_eq!(run(&options).unwrap(), 1);
        assert_eq!(fs::read_to_string(project.join("src/main.c")).unwrap(), "int main;\n");

        options.check = false;
        assert_eq!(run(&options).unwrap(), 0);
        assert_eq!(fs::read_to_string(project.join("src/main.c")).unwrap(), "INT MAIN;\n");
        assert_eq!(fs::read_to_string(project.join("build/gen.c")).unwrap(), "generated;\n");

        options.check = true;
        assert_eq!(run(&options).unwrap(), 0);
    }
}
