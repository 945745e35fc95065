//! Layered configuration
//!
//! A [`Config`] is an immutable view of every registered option. Layers are
//! applied lowest precedence first: built-in defaults, then option files from
//! the repository base down to the directory, then command-line values. A
//! value given on the command line is never replaced by a file.

pub mod file;
pub mod options;

pub use file::{FILE_NAME, OptionFile};
pub use options::{OptionKind, OptionRegistry, OptionSpec};

use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown option \"{name}\" ({origin})")]
    UnknownOption { name: String, origin: String },

    #[error("{}:{line}: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("option {name}: invalid value \"{value}\": {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where the effective value of an option came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Default,
    File(PathBuf),
    Cli,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Default => write!(f, "default"),
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Cli => write!(f, "command line"),
        }
    }
}

#[derive(Debug, Clone)]
struct Setting {
    value: String,
    source: Source,
}

/// Merged option values for one directory
#[derive(Debug, Clone)]
pub struct Config {
    registry: Arc<OptionRegistry>,
    environment: String,
    values: IndexMap<&'static str, Setting>,
}

impl Config {
    /// Build the base configuration from command-line values.
    ///
    /// Every name must be registered; boolean values must parse.
    pub fn new(
        registry: Arc<OptionRegistry>,
        environment: &str,
        cli: &IndexMap<String, String>,
    ) -> Result<Self> {
        let mut config = Self {
            registry,
            environment: environment.to_string(),
            values: IndexMap::new(),
        };
        for (name, value) in cli {
            let spec = config.registry.get(name).ok_or_else(|| Error::UnknownOption {
                name: name.clone(),
                origin: Source::Cli.to_string(),
            })?;
            let key = spec.name;
            config.set(key, value.clone(), Source::Cli)?;
        }
        Ok(config)
    }

    /// Return a new config with `file` layered on top: its sectionless part
    /// first, then the section for the active environment.
    pub fn with_file(&self, file: &OptionFile) -> Result<Self> {
        let mut config = self.clone();
        for section in ["", self.environment.as_str()] {
            for entry in file.entries(section) {
                let Some((name, value)) = file::resolve_entry(&self.registry, entry, &file.path)?
                else {
                    continue;
                };
                if config.on_cli(name) {
                    continue;
                }
                config.set(name, value, Source::File(file.path.clone()))?;
            }
        }
        Ok(config)
    }

    fn set(&mut self, name: &'static str, value: String, source: Source) -> Result<()> {
        if self.registry.get(name).is_some_and(OptionSpec::is_bool) {
            parse_bool(name, &value)?;
        }
        self.values.insert(name, Setting { value, source });
        Ok(())
    }

    /// Active environment name (selects option-file sections)
    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn registry(&self) -> &OptionRegistry {
        &self.registry
    }

    /// Effective value; `""` for unset options without a default
    pub fn get(&self, name: &str) -> &str {
        if let Some(setting) = self.values.get(name) {
            return &setting.value;
        }
        match self.registry.get(name) {
            Some(spec) => spec.default,
            None => {
                log::warn!("lookup of unregistered option {name}");
                ""
            }
        }
    }

    pub fn get_bool(&self, name: &str) -> bool {
        parse_bool(name, self.get(name)).unwrap_or(false)
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        let value = self.get(name).trim();
        value.parse().map_err(|_| Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: "not an integer".to_string(),
        })
    }

    /// Byte size with optional `B/KB/MB/GB/TB` suffix
    pub fn get_size(&self, name: &str) -> Result<u64> {
        let value = self.get(name);
        crate::ui::parse_size(value).map_err(|reason| Error::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason,
        })
    }

    /// Value restricted to a fixed set (case-insensitive); `""` is always allowed
    pub fn get_enum(&self, name: &str, allowed: &[&str]) -> Result<String> {
        let value = self.get(name).to_ascii_lowercase();
        if value.is_empty() || allowed.contains(&value.as_str()) {
            return Ok(value);
        }
        Err(Error::InvalidValue {
            name: name.to_string(),
            value,
            reason: format!("allowed values: {}", allowed.join(", ")),
        })
    }

    pub fn source(&self, name: &str) -> Source {
        self.values
            .get(name)
            .map_or(Source::Default, |setting| setting.source.clone())
    }

    /// Whether the effective value differs from the option's default.
    /// Explicitly setting an option to its default does not count.
    pub fn changed(&self, name: &str) -> bool {
        let Some(setting) = self.values.get(name) else {
            return false;
        };
        match self.registry.get(name) {
            Some(spec) if spec.is_bool() => {
                parse_bool(name, &setting.value).ok() != parse_bool(name, spec.default).ok()
            }
            Some(spec) => setting.value.trim() != spec.default,
            None => true,
        }
    }

    pub fn on_cli(&self, name: &str) -> bool {
        self.values
            .get(name)
            .is_some_and(|setting| setting.source == Source::Cli)
    }
}

pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(Error::InvalidValue {
            name: name.to_string(),
            value: other.to_string(),
            reason: "not a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;

    pub(crate) fn test_registry() -> Arc<OptionRegistry> {
        Arc::new(crate::commands::push::registry())
    }

    pub(crate) fn base_config(cli: &[(&str, &str)]) -> Config {
        let cli: IndexMap<String, String> = cli
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::new(test_registry(), "production", &cli).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = base_config(&[]);
        assert_eq!(config.get("port"), "3306");
        assert_eq!(config.get("host"), "");
        assert!(config.get_bool("verify"));
        assert!(!config.get_bool("dry-run"));
        assert!(!config.changed("port"));
        assert_eq!(config.source("port"), Source::Default);
    }

    #[test]
    fn test_set_to_default_is_not_changed() {
        let config = base_config(&[("port", "3306"), ("verify", "1"), ("dry-run", "on")]);
        assert!(!config.changed("port"));
        assert!(!config.changed("verify"));
        assert!(config.changed("dry-run"));
        assert!(config.on_cli("port"));
    }

    #[test]
    fn test_unknown_cli_option() {
        let cli: IndexMap<String, String> = [("bogus".to_string(), "1".to_string())].into();
        let err = Config::new(test_registry(), "production", &cli).unwrap_err();
        assert!(matches!(err, Error::UnknownOption { .. }));
    }

    #[test]
    fn test_precedence() {
        let base = base_config(&[("schema", "from_cli")]);
        let file = OptionFile::parse_str(
            "host=top\nschema=top\nport=3307\n[production]\nhost=env\n[staging]\nhost=other\n",
            Path::new("/r/.schemer"),
        )
        .unwrap();
        let config = base.with_file(&file).unwrap();

        assert_eq!(config.get("host"), "env");
        assert_eq!(config.get("schema"), "from_cli");
        assert_eq!(config.get("port"), "3307");
        assert!(config.changed("port"));
        assert_eq!(config.source("host"), Source::File(PathBuf::from("/r/.schemer")));
        assert!(config.on_cli("schema"));

        // Original layer is untouched
        assert_eq!(base.get("host"), "");
    }

    #[test]
    fn test_deeper_file_wins() {
        let shallow = OptionFile::parse_str("host=a\nport=1\n", Path::new("/r/.schemer")).unwrap();
        let deep = OptionFile::parse_str("host=b\n", Path::new("/r/x/.schemer")).unwrap();
        let config = base_config(&[]).with_file(&shallow).unwrap().with_file(&deep).unwrap();
        assert_eq!(config.get("host"), "b");
        assert_eq!(config.get("port"), "1");
    }

    #[test]
    fn test_skip_prefix_and_invalid_bool() {
        let file = OptionFile::parse_str("skip-verify\n", Path::new(".schemer")).unwrap();
        let config = base_config(&[]).with_file(&file).unwrap();
        assert!(!config.get_bool("verify"));

        let bad = OptionFile::parse_str("dry-run=maybe\n", Path::new(".schemer")).unwrap();
        assert!(matches!(
            base_config(&[]).with_file(&bad),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_typed_getters() {
        let config = base_config(&[
            ("concurrent-instances", "x"),
            ("safe-below-size", "2MB"),
            ("alter-lock", "SHARED"),
        ]);
        assert!(config.get_int("concurrent-instances").is_err());
        assert_eq!(config.get_size("safe-below-size").unwrap(), 2 * 1024 * 1024);
        assert_eq!(
            config.get_enum("alter-lock", &["none", "shared", "exclusive"]).unwrap(),
            "shared"
        );
        assert!(config.get_enum("alter-lock", &["none"]).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("x", "ON").unwrap());
        assert!(parse_bool("x", "").unwrap());
        assert!(!parse_bool("x", "0").unwrap());
        assert!(parse_bool("x", "2").is_err());
    }
}
