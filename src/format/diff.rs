//! Line diff for check mode
//!
//! Only the changed lines are reported, removals before additions within each
//! changed region, the way a unified diff lists them without context.

use std::fmt;

/// Above this many table cells the whole differing middle is reported instead
const MAX_TABLE_CELLS: usize = 4_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Removed(String),
    Added(String),
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffLine::Removed(line) => write!(f, "-{}", line),
            DiffLine::Added(line) => write!(f, "+{}", line),
        }
    }
}

/// Changed lines between `old` and `new`
pub fn changed_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let a: Vec<&str> = old.lines().collect();
    let b: Vec<&str> = new.lines().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a = &a[prefix..a.len() - suffix];
    let b = &b[prefix..b.len() - suffix];

    if (a.len() + 1).saturating_mul(b.len() + 1) > MAX_TABLE_CELLS {
        let mut out: Vec<DiffLine> = a.iter().map(|l| DiffLine::Removed(l.to_string())).collect();
        out.extend(b.iter().map(|l| DiffLine::Added(l.to_string())));
        return out;
    }

    let width = b.len() + 1;
    // lcs[i * width + j]: longest common subsequence of a[i..] and b[j..]
    let mut lcs = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut out = Vec::new();
    let mut removed = Vec::new();
    let mut added = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        if i < a.len() && j < b.len() && a[i] == b[j] {
            flush(&mut out, &mut removed, &mut added);
            i += 1;
            j += 1;
        } else if j == b.len() || (i < a.len() && lcs[(i + 1) * width + j] >= lcs[i * width + j + 1]) {
            removed.push(DiffLine::Removed(a[i].to_string()));
            i += 1;
        } else {
            added.push(DiffLine::Added(b[j].to_string()));
            j += 1;
        }
    }
    flush(&mut out, &mut removed, &mut added);
    out
}

fn flush(out: &mut Vec<DiffLine>, removed: &mut Vec<DiffLine>, added: &mut Vec<DiffLine>) {
    out.append(removed);
    out.append(added);
}
