//! Option registry - every option name the tool understands, with its default

use indexmap::IndexMap;

/// Value type of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Free-form string (numbers and sizes are validated on read)
    String,
    /// Boolean flag; accepts bare `name` and `skip-name` in option files
    Bool,
}

/// Declaration of a single option
#[derive(Debug, Clone)]
pub struct OptionSpec {
    pub name: &'static str,
    pub short: Option<char>,
    pub default: &'static str,
    pub kind: OptionKind,
    pub group: &'static str,
    pub description: &'static str,
    pub hidden: bool,
}

impl OptionSpec {
    /// A string option with the given default ("" for none)
    pub fn string(name: &'static str, default: &'static str, description: &'static str) -> Self {
        Self {
            name,
            short: None,
            default,
            kind: OptionKind::String,
            group: "",
            description,
            hidden: false,
        }
    }

    /// A boolean option
    pub fn bool(name: &'static str, default: bool, description: &'static str) -> Self {
        Self {
            name,
            short: None,
            default: if default { "true" } else { "false" },
            kind: OptionKind::Bool,
            group: "",
            description,
            hidden: false,
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_bool(&self) -> bool {
        self.kind == OptionKind::Bool
    }
}

/// Ordered set of option declarations, grouped for help output
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    specs: IndexMap<&'static str, OptionSpec>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add options under a help group. A later declaration of the same name
    /// replaces the earlier one.
    pub fn add_group(&mut self, group: &'static str, specs: impl IntoIterator<Item = OptionSpec>) {
        for mut spec in specs {
            spec.group = group;
            self.specs.insert(spec.name, spec);
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.values()
    }

    /// Group names in declaration order
    pub fn groups(&self) -> Vec<&'static str> {
        let mut groups: Vec<&'static str> = Vec::new();
        for spec in self.specs.values() {
            if !groups.contains(&spec.group) {
                groups.push(spec.group);
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Options shared by every command that talks to database instances
pub fn connection_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::string("host", "", "Database hostname or IP address, or a list of them"),
        OptionSpec::string("port", "3306", "Port to use for database host"),
        OptionSpec::string(
            "socket",
            "/tmp/mysql.sock",
            "Absolute path to Unix socket file used if host is localhost",
        ),
        OptionSpec::string("user", "root", "Username to connect to database host"),
        OptionSpec::string("schema", "", "Database schema name(s), comma-separated"),
        OptionSpec::string(
            "connect-options",
            "",
            "Comma-separated session options to set upon connecting to each database instance",
        ),
        OptionSpec::string(
            "default-character-set",
            "",
            "Schema-level default character set",
        ),
        OptionSpec::string("default-collation", "", "Schema-level default collation"),
    ]
}

/// Options controlling external programs used to discover hosts
pub fn host_wrapper_options() -> Vec<OptionSpec> {
    vec![
        OptionSpec::string(
            "host-wrapper",
            "",
            "External bin to shell out to for host lookup; see manual for template vars",
        ),
        OptionSpec::string(
            "temp-schema",
            "_schemer_tmp",
            "Name of temporary schema used by verification tools",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_defaults() {
        assert_eq!(OptionSpec::bool("lint", true, "").default, "true");
        assert_eq!(OptionSpec::bool("dry-run", false, "").default, "false");
        assert!(OptionSpec::bool("dry-run", false, "").is_bool());
    }

    #[test]
    fn test_groups_keep_declaration_order() {
        let mut registry = OptionRegistry::new();
        registry.add_group("Connection", connection_options());
        registry.add_group("External tool", host_wrapper_options());
        registry.add_group("Safety", [OptionSpec::bool("dry-run", false, "")]);

        assert_eq!(registry.groups(), vec!["Connection", "External tool", "Safety"]);
        assert_eq!(registry.get("dry-run").unwrap().group, "Safety");
        assert!(registry.contains("host-wrapper"));
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_redeclaring_replaces() {
        let mut registry = OptionRegistry::new();
        registry.add_group("A", [OptionSpec::string("port", "3306", "")]);
        registry.add_group("B", [OptionSpec::string("port", "3307", "")]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("port").unwrap().default, "3307");
    }
}
