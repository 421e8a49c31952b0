//! Formatter summary output

use super::diff::DiffLine;
use super::runner::FileResult;
use colored::Colorize;
use std::io::{self, Write};
use std::path::Path;

/// Widest header line, also used when the terminal size is unknown
pub const MAX_WIDTH: usize = 80;

/// Header width: the terminal width capped at [`MAX_WIDTH`]
pub fn header_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| (cols as usize).min(MAX_WIDTH))
        .ok()
        .filter(|w| *w > 0)
        .unwrap_or(MAX_WIDTH)
}

/// ` Title ` centred in a line of dashes
pub fn banner(title: &str, width: usize) -> String {
    format!("{:-^width$}", format!(" {} ", title), width = width)
}

/// Print the summary for `results`; returns the process exit code
pub fn write_report<W: Write>(
    out: &mut W,
    results: &[FileResult],
    root: &Path,
    check: bool,
    width: usize,
) -> io::Result<i32> {
    let mut changed: Vec<&FileResult> = results.iter().filter(|r| r.changed).collect();
    changed.sort_by(|a, b| a.path.cmp(&b.path));

    let display = |path: &Path| path.strip_prefix(root).unwrap_or(path).display().to_string();

    if check {
        if changed.is_empty() {
            writeln!(
                out,
                "{}",
                "[OK] Check passed. All files are correctly formatted.".green()
            )?;
            return Ok(0);
        }

        writeln!(out, "\n{}", banner("Files Requiring Formatting", width))?;
        for result in &changed {
            writeln!(out, "\n{}", format!("[FAIL] {}", display(&result.path)).yellow())?;
            for line in &result.diff {
                match line {
                    DiffLine::Added(_) => writeln!(out, "{}", line.to_string().green())?,
                    DiffLine::Removed(_) => writeln!(out, "{}", line.to_string().red())?,
                }
            }
        }
        let msg = format!("Check failed. {} files require formatting.", changed.len());
        writeln!(out, "\n{}", msg.red().bold())?;
        return Ok(1);
    }

    if changed.is_empty() {
        writeln!(out, "[OK] All files are already correctly formatted. No changes made.")?;
        return Ok(0);
    }

    writeln!(out, "{}", banner("Files Reformatted", width))?;
    for result in &changed {
        writeln!(out, "{}", format!("  {}", display(&result.path)).green())?;
    }
    writeln!(out, "[OK] Done. {} files were reformatted.", changed.len())?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(path: &str, changed: bool, diff: Vec<DiffLine>) -> FileResult {
        FileResult {
            path: PathBuf::from("/proj").join(path),
            changed,
            diff,
        }
    }

    fn render(results: &[FileResult], check: bool) -> (String, i32) {
        let mut out = Vec::new();
        let code = write_report(&mut out, results, Path::new("/proj"), check, 40).unwrap();
        (String::from_utf8(out).unwrap(), code)
    }

    #[test]
    fn test_banner_is_centred() {
        let line = banner("Files Reformatted", 40);
        assert_eq!(line.chars().count(), 40);
        assert!(line.starts_with("----"));
        assert!(line.contains(" Files Reformatted "));
        assert!(line.ends_with("----"));
    }

    #[test]
    fn test_header_width_is_capped() {
        let width = header_width();
        assert!(width > 0 && width <= MAX_WIDTH);
    }

    #[test]
    fn test_check_passed() {
        let (text, code) = render(&[result("a.c", false, vec![])], true);
        assert_eq!(code, 0);
        assert!(text.contains("Check passed"));
    }

    #[test]
    fn test_check_failed_lists_files_and_changes() {
        let results = vec![
            result("src/b.c", true, vec![DiffLine::Removed("x".into()), DiffLine::Added("y".into())]),
            result("src/a.c", true, vec![DiffLine::Added("z".into())]),
            result("src/c.c", false, vec![]),
        ];
        let (text, code) = render(&results, true);
        assert_eq!(code, 1);
        assert!(text.contains(" Files Requiring Formatting "));

        let a = text.find("src/a.c").unwrap();
        let b = text.find("src/b.c").unwrap();
        assert!(a < b);
        assert!(!text.contains("src/c.c"));
        assert!(text.contains("-x"));
        assert!(text.contains("+y"));
        assert!(text.contains("Check failed. 2 files require formatting."));
    }

    #[test]
    fn test_in_place_summaries() {
        let (text, code) = render(&[result("a.c", false, vec![])], false);
        assert_eq!(code, 0);
        assert!(text.contains("already correctly formatted"));

        let (text, code) = render(&[result("a.c", true, vec![]), result("b.c", true, vec![])], false);
        assert_eq!(code, 0);
        assert!(text.contains(" Files Reformatted "));
        assert!(text.contains("Done. 2 files were reformatted."));
    }
}
