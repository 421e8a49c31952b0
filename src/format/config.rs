//! Formatter table
//!
//! Maps file names and extensions to the external tool that formats them.
//! The built-in table covers C/C++ (clang-format) and CMake (cmake-format);
//! a TOML file with `[[formatter]]` entries can replace it.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One external formatting tool and the files it handles
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Formatter {
    pub name: String,
    /// Executable name or path
    pub command: String,
    /// Arguments placed before the file path
    #[serde(default)]
    pub args: Vec<String>,
    /// Extensions with or without the leading dot
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Exact file names, e.g. `CMakeLists.txt`
    #[serde(default)]
    pub file_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "formatter", default)]
    formatters: Vec<Formatter>,
}

/// Built-in formatter definitions
pub static DEFAULT_FORMATTERS: Lazy<Vec<Formatter>> = Lazy::new(|| {
    vec![
        Formatter {
            name: "clang-format".to_string(),
            command: "clang-format".to_string(),
            args: Vec::new(),
            extensions: [".h", ".hpp", ".hxx", ".hh", ".c", ".cpp", ".cxx", ".cc"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            file_names: Vec::new(),
        },
        Formatter {
            name: "cmake-format".to_string(),
            command: "cmake-format".to_string(),
            args: Vec::new(),
            extensions: vec![".cmake".to_string()],
            file_names: vec!["CMakeLists.txt".to_string()],
        },
    ]
});

/// Formatter lookup by file name, then by extension.
///
/// When several formatters claim the same name or extension the first one wins.
#[derive(Debug, Clone)]
pub struct FormatterTable {
    formatters: Vec<Formatter>,
    by_name: HashMap<String, usize>,
    by_extension: HashMap<String, usize>,
}

impl FormatterTable {
    pub fn new(formatters: Vec<Formatter>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_extension = HashMap::new();

        for (index, formatter) in formatters.iter().enumerate() {
            for name in &formatter.file_names {
                by_name.entry(name.clone()).or_insert(index);
            }
            for ext in &formatter.extensions {
                let ext = ext.trim_start_matches('.');
                if !ext.is_empty() {
                    by_extension.entry(ext.to_string()).or_insert(index);
                }
            }
        }

        Self {
            formatters,
            by_name,
            by_extension,
        }
    }

    pub fn builtin() -> Self {
        Self::new(DEFAULT_FORMATTERS.clone())
    }

    /// Parse a table from `[[formatter]]` TOML entries
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(Self::new(file.formatters))
    }

    pub fn formatters(&self) -> &[Formatter] {
        &self.formatters
    }

    /// Distinct commands in table order
    pub fn commands(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for formatter in &self.formatters {
            if !seen.contains(&formatter.command.as_str()) {
                seen.push(formatter.command.as_str());
            }
        }
        seen
    }

    /// Find the formatter responsible for `path`
    pub fn lookup(&self, path: &Path) -> Option<&Formatter> {
        let by_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| self.by_name.get(n));

        let index = by_name.or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(|e| self.by_extension.get(e))
        })?;

        self.formatters.get(*index)
    }
}

impl Default for FormatterTable {
    fn default() -> Self {
        Self::builtin()
    }
}
