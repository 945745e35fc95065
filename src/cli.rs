use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use indexmap::IndexMap;

#[derive(Parser)]
#[command(name = "schemer")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Manage database schemas as files and push them to many instances", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Alter objects on databases to reflect the filesystem representation
    ///
    /// Exit status is 0 on success, 1 if some objects were unsupported or a
    /// dry run found differences, 2 on failure and 78 on bad configuration.
    Push(Box<PushArgs>),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Push
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct PushArgs {
    /// Section of .schemer files to apply on top of sectionless options
    #[arg(default_value = "production")]
    pub environment: String,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "dir", value_name = "PATH", default_value = ".")]
    pub workdir: String,

    // DDL generation
    /// Follow *.sql table definitions exactly, even for differences with no functional impact
    #[arg(long, help_heading = "DDL generation", overrides_with = "skip_exact_match")]
    pub exact_match: bool,
    #[arg(long, hide = true, overrides_with = "exact_match")]
    pub skip_exact_match: bool,

    /// Apply a LOCK clause to all ALTER TABLEs (none, shared, exclusive)
    #[arg(long, value_name = "LOCK", help_heading = "DDL generation")]
    pub alter_lock: Option<String>,

    /// Apply an ALGORITHM clause to all ALTER TABLEs (inplace, copy, instant)
    #[arg(long, value_name = "ALGORITHM", help_heading = "DDL generation")]
    pub alter_algorithm: Option<String>,

    // External tool
    /// External bin to shell out to for host lookup
    #[arg(long, value_name = "CMD", help_heading = "External tool")]
    pub host_wrapper: Option<String>,

    /// Name of temporary schema used by verification tools
    #[arg(long, value_name = "NAME", help_heading = "External tool")]
    pub temp_schema: Option<String>,

    /// External bin that prints the DDL needed to make a schema match its *.sql files
    #[arg(long, value_name = "CMD", help_heading = "External tool")]
    pub diff_wrapper: Option<String>,

    /// External bin that checks generated DDL before it runs
    #[arg(long, value_name = "CMD", help_heading = "External tool")]
    pub verify_wrapper: Option<String>,

    /// External bin to shell out to for ALTER TABLE
    #[arg(short = 'x', long, value_name = "CMD", help_heading = "External tool")]
    pub alter_wrapper: Option<String>,

    /// Ignore --alter-wrapper for tables smaller than this size in bytes
    #[arg(long, value_name = "SIZE", help_heading = "External tool")]
    pub alter_wrapper_min_size: Option<String>,

    /// Like --alter-wrapper, but applies to all DDL types (CREATE, DROP, ALTER)
    #[arg(short = 'X', long, value_name = "CMD", help_heading = "External tool")]
    pub ddl_wrapper: Option<String>,

    // Linter
    /// Check directories for problems before proceeding (default)
    #[arg(long, help_heading = "Linter", overrides_with = "skip_lint")]
    pub lint: bool,
    /// Do not check directories for problems
    #[arg(long, help_heading = "Linter", overrides_with = "lint")]
    pub skip_lint: bool,

    // Safety
    /// Verify generated statements with verify-wrapper before running them (default)
    #[arg(long, help_heading = "Safety", overrides_with = "skip_verify")]
    pub verify: bool,
    /// Do not verify generated statements
    #[arg(long, help_heading = "Safety", overrides_with = "verify")]
    pub skip_verify: bool,

    /// Permit running ALTER or DROP operations that are potentially destructive
    #[arg(long, help_heading = "Safety", overrides_with = "skip_allow_unsafe")]
    pub allow_unsafe: bool,
    #[arg(long, hide = true, overrides_with = "allow_unsafe")]
    pub skip_allow_unsafe: bool,

    /// Output DDL but don't run it
    #[arg(long, help_heading = "Safety", overrides_with = "skip_dry_run")]
    pub dry_run: bool,
    #[arg(long, hide = true, overrides_with = "dry_run")]
    pub skip_dry_run: bool,

    /// Force the server to check referential integrity of any new foreign key
    #[arg(long, help_heading = "Safety", overrides_with = "skip_foreign_key_checks")]
    pub foreign_key_checks: bool,
    #[arg(long, hide = true, overrides_with = "foreign_key_checks")]
    pub skip_foreign_key_checks: bool,

    /// Always permit destructive operations for tables below this size in bytes
    #[arg(long, value_name = "SIZE", help_heading = "Safety")]
    pub safe_below_size: Option<String>,

    // Sharding
    /// For dirs mapping to multiple instances or schemas, just run against the first per dir
    #[arg(short = '1', long, help_heading = "Sharding", overrides_with = "skip_first_only")]
    pub first_only: bool,
    #[arg(long, hide = true, overrides_with = "first_only")]
    pub skip_first_only: bool,

    #[arg(long, hide = true, overrides_with = "skip_brief")]
    pub brief: bool,
    #[arg(long, hide = true, overrides_with = "brief")]
    pub skip_brief: bool,

    /// Perform operations on this number of instances concurrently
    #[arg(short = 'c', long, value_name = "N", help_heading = "Sharding")]
    pub concurrent_instances: Option<String>,

    // Connection
    /// Database hostname or IP address
    #[arg(long, help_heading = "Connection")]
    pub host: Option<String>,

    /// Port to use for database host
    #[arg(long, help_heading = "Connection")]
    pub port: Option<String>,

    /// Absolute path to Unix socket file used if host is localhost
    #[arg(long, value_name = "PATH", help_heading = "Connection")]
    pub socket: Option<String>,

    /// Username to connect to database host
    #[arg(long, help_heading = "Connection")]
    pub user: Option<String>,

    /// Database schema name(s), comma-separated
    #[arg(long, help_heading = "Connection")]
    pub schema: Option<String>,

    /// Comma-separated session options to set upon connecting
    #[arg(long, value_name = "OPTS", help_heading = "Connection")]
    pub connect_options: Option<String>,

    /// Schema-level default character set
    #[arg(long, value_name = "CHARSET", help_heading = "Connection")]
    pub default_character_set: Option<String>,

    /// Schema-level default collation
    #[arg(long, value_name = "COLLATION", help_heading = "Connection")]
    pub default_collation: Option<String>,
}

/// `--x` / `--skip-x` pair; the later flag on the command line wins
fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (_, true) => Some(false),
        (true, false) => Some(true),
        (false, false) => None,
    }
}

impl PushArgs {
    /// Option values given on the command line, keyed by option name
    pub fn overrides(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();

        let toggles = [
            ("exact-match", toggle(self.exact_match, self.skip_exact_match)),
            ("lint", toggle(self.lint, self.skip_lint)),
            ("verify", toggle(self.verify, self.skip_verify)),
            ("allow-unsafe", toggle(self.allow_unsafe, self.skip_allow_unsafe)),
            ("dry-run", toggle(self.dry_run, self.skip_dry_run)),
            (
                "foreign-key-checks",
                toggle(self.foreign_key_checks, self.skip_foreign_key_checks),
            ),
            ("first-only", toggle(self.first_only, self.skip_first_only)),
            ("brief", toggle(self.brief, self.skip_brief)),
        ];
        for (name, value) in toggles {
            if let Some(value) = value {
                out.insert(name.to_string(), value.to_string());
            }
        }

        let values = [
            ("alter-lock", &self.alter_lock),
            ("alter-algorithm", &self.alter_algorithm),
            ("host-wrapper", &self.host_wrapper),
            ("temp-schema", &self.temp_schema),
            ("diff-wrapper", &self.diff_wrapper),
            ("verify-wrapper", &self.verify_wrapper),
            ("alter-wrapper", &self.alter_wrapper),
            ("alter-wrapper-min-size", &self.alter_wrapper_min_size),
            ("ddl-wrapper", &self.ddl_wrapper),
            ("safe-below-size", &self.safe_below_size),
            ("concurrent-instances", &self.concurrent_instances),
            ("host", &self.host),
            ("port", &self.port),
            ("socket", &self.socket),
            ("user", &self.user),
            ("schema", &self.schema),
            ("connect-options", &self.connect_options),
            ("default-character-set", &self.default_character_set),
            ("default-collation", &self.default_collation),
        ];
        for (name, value) in values {
            if let Some(value) = value {
                out.insert(name.to_string(), value.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn push_args(args: &[&str]) -> PushArgs {
        let mut argv = vec!["schemer", "push"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Push(args) => *args,
            Command::Completions { .. } => panic!("expected push"),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = push_args(&[]);
        assert_eq!(args.environment, "production");
        assert_eq!(args.workdir, ".");
        assert!(args.overrides().is_empty());
    }

    #[test]
    fn test_overrides() {
        let args = push_args(&[
            "staging",
            "--skip-verify",
            "-c",
            "4",
            "-x",
            "osc {DDL}",
            "-1",
            "--dry-run",
            "--schema",
            "a,b",
        ]);
        assert_eq!(args.environment, "staging");
        let overrides = args.overrides();
        assert_eq!(overrides["verify"], "false");
        assert_eq!(overrides["concurrent-instances"], "4");
        assert_eq!(overrides["alter-wrapper"], "osc {DDL}");
        assert_eq!(overrides["first-only"], "true");
        assert_eq!(overrides["dry-run"], "true");
        assert_eq!(overrides["schema"], "a,b");
        assert!(!overrides.contains_key("lint"));
    }

    #[test]
    fn test_last_toggle_wins() {
        assert_eq!(push_args(&["--skip-lint", "--lint"]).overrides()["lint"], "true");
        assert_eq!(push_args(&["--lint", "--skip-lint"]).overrides()["lint"], "false");
    }

    #[test]
    fn test_override_names_are_registered() {
        let registry = crate::commands::push::registry();
        let args = push_args(&[
            "--exact-match",
            "--alter-lock=none",
            "--alter-algorithm=inplace",
            "--host-wrapper=x",
            "--temp-schema=t",
            "--diff-wrapper=d",
            "--verify-wrapper=v",
            "--alter-wrapper=a",
            "--alter-wrapper-min-size=1",
            "--ddl-wrapper=w",
            "--lint",
            "--verify",
            "--allow-unsafe",
            "--dry-run",
            "--foreign-key-checks",
            "--safe-below-size=1",
            "--first-only",
            "--brief",
            "--concurrent-instances=2",
            "--host=h",
            "--port=1",
            "--socket=s",
            "--user=u",
            "--schema=s",
            "--connect-options=a=b",
            "--default-character-set=c",
            "--default-collation=c",
        ]);
        let overrides = args.overrides();
        assert_eq!(overrides.len(), registry.len());
        for name in overrides.keys() {
            assert!(registry.contains(name), "{name} is not a push option");
        }
    }
}
