use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

/// Optional `.metricq` settings file: `KEY=VALUE` lines, `#` comments.
/// Looked up in the working directory first, then the home directory.
/// Real environment variables always take precedence, so the file only fills
/// gaps; values are not interpolated (placeholder expansion happens later,
/// uniformly with CLI values).
#[derive(Debug, Default)]
pub(crate) struct EnvFile {
    values: BTreeMap<String, String>,
}

impl EnvFile {
    const FILE_NAME: &'static str = ".metricq";

    pub(crate) fn load() -> Self {
        for directory in Self::search_paths() {
            let path = directory.join(Self::FILE_NAME);
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    debug!(path = %path.display(), "loaded settings file");
                    return Self {
                        values: Self::parse(&content),
                    };
                }
                Err(_) => continue,
            }
        }
        Self::default()
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(home) = std::env::var_os("HOME") {
            paths.push(PathBuf::from(home));
        }
        paths
    }

    fn parse(content: &str) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(
                    key.trim().to_owned(),
                    value.trim().trim_matches('"').to_owned(),
                );
            }
        }
        values
    }

    /// The file fills in only what the process environment does not set.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        if std::env::var_os(key).is_some() {
            return None;
        }
        self.values.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_assignments_and_comments() {
        let values = EnvFile::parse(
            "# settings\nMETRICQ_SERVER=metricq://broker\n\nMETRICQ_TOKEN = \"tool-me\"\n",
        );
        assert_eq!(
            values.get("METRICQ_SERVER").map(String::as_str),
            Some("metricq://broker")
        );
        assert_eq!(
            values.get("METRICQ_TOKEN").map(String::as_str),
            Some("tool-me")
        );
    }

    #[test]
    fn environment_variables_take_precedence() {
        let env_file = EnvFile {
            values: BTreeMap::from([("PATH".to_owned(), "/overridden".to_owned())]),
        };
        assert_eq!(env_file.get("PATH"), None);
    }
}
