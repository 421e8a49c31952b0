//! Source file discovery

use super::config::FormatterTable;
use colored::Colorize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file paired with the tool that formats it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub command: String,
    pub args: Vec<String>,
}

/// Ignore entries split into existing directories and entries that matched nothing
#[derive(Debug, Default)]
pub struct IgnoreDirs {
    pub dirs: Vec<PathBuf>,
    pub unmatched: Vec<String>,
}

/// Resolve literal ignore entries (relative to `root` or absolute) to canonical directories
pub fn resolve_ignore_dirs(root: &Path, entries: &[String]) -> IgnoreDirs {
    let mut resolved = IgnoreDirs::default();
    for entry in entries {
        let candidate = root.join(entry);
        match candidate.canonicalize() {
            Ok(dir) if dir.is_dir() => {
                if !resolved.dirs.contains(&dir) {
                    resolved.dirs.push(dir);
                }
            }
            _ => {
                log::debug!("Ignore entry {:?} is not a directory under {}", entry, root.display());
                resolved.unmatched.push(entry.clone());
            }
        }
    }
    resolved.dirs.sort();
    resolved
}

/// Walk `root` and collect every file the table has a formatter for.
///
/// Symlinks are neither followed nor returned, ignored directories are not
/// entered, and unreadable entries are reported and skipped. Results are
/// ordered by path.
pub fn find_files(root: &Path, ignored: &[PathBuf], table: &FormatterTable) -> Vec<SourceFile> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if e.path_is_symlink() {
                return false;
            }
            !(e.file_type().is_dir() && ignored.iter().any(|dir| dir == e.path()))
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                eprintln!("{} {}", "[WARN]".yellow().bold(), err);
                log::warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(formatter) = table.lookup(entry.path()) {
            files.push(SourceFile {
                path: entry.into_path(),
                command: formatter.command.clone(),
                args: formatter.args.clone(),
            });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
