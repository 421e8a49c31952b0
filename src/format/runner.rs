//! Parallel formatter dispatch
//!
//! Each file is handed to its tool as a child process; a semaphore bounds how
//! many run at once.

use super::diff::{changed_lines, DiffLine};
use super::discover::SourceFile;
use super::FormatError;
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    pub changed: bool,
    /// Changed lines; only filled in check mode
    pub diff: Vec<DiffLine>,
}

impl FileResult {
    fn unchanged(path: PathBuf) -> Self {
        Self {
            path,
            changed: false,
            diff: Vec::new(),
        }
    }
}

/// Whether `command` can be executed: an existing file for paths, a `PATH` hit for bare names
pub fn find_on_path(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(command);
        if full.is_file() {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", command));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Check or format a single file.
///
/// Check mode compares the tool's stdout with the file; in-place mode runs the
/// tool with `-i` and compares the rewritten file with the original bytes.
pub async fn process_file(file: &SourceFile, check: bool) -> Result<FileResult, FormatError> {
    let io_err = |source: std::io::Error| FormatError::Io {
        path: file.path.clone(),
        source,
    };

    let original = tokio::fs::read(&file.path).await.map_err(io_err)?;

    let mut command = Command::new(&file.command);
    command
        .args(&file.args)
        .arg(&file.path)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if !check {
        command.arg("-i");
    }

    log::debug!("Running {} on {}", file.command, file.path.display());
    let output = command.output().await.map_err(|source| FormatError::Spawn {
        command: file.command.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(FormatError::ToolFailed {
            command: file.command.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let formatted = if check {
        output.stdout
    } else {
        tokio::fs::read(&file.path).await.map_err(io_err)?
    };

    if formatted == original {
        return Ok(FileResult::unchanged(file.path.clone()));
    }

    let diff = if check {
        changed_lines(
            &String::from_utf8_lossy(&original),
            &String::from_utf8_lossy(&formatted),
        )
    } else {
        Vec::new()
    };

    Ok(FileResult {
        path: file.path.clone(),
        changed: true,
        diff,
    })
}

/// Process every file with at most `jobs` tools running at once; results are ordered by path.
///
/// A file whose tool fails is reported on stderr and counted as unchanged.
pub async fn run_all(files: Vec<SourceFile>, jobs: usize, check: bool) -> Vec<FileResult> {
    let limit = Arc::new(Semaphore::new(jobs.max(1)));
    let mut tasks = JoinSet::new();

    for file in files {
        let limit = Arc::clone(&limit);
        tasks.spawn(async move {
            let _permit = limit.acquire_owned().await.ok();
            let result = process_file(&file, check).await;
            (file.path, result)
        });
    }

    let action = if check { "checking" } else { "formatting" };
    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(result))) => results.push(result),
            Ok((path, Err(e))) => {
                let msg = format!("Error {} {}: {}", action, path.display(), e);
                eprintln!("{}", msg.red());
                results.push(FileResult::unchanged(path));
            }
            Err(e) => {
                let msg = format!("A task generated an exception: {}", e);
                eprintln!("{}", msg.red());
            }
        }
    }

    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}
