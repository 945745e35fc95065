//! `schemer push` - bring live schemas in line with the filesystem

use super::{CommandSpec, ExitValue, Invocation};
use crate::applier::{self, ApplyError, Printer, WalkOptions, WrapperBackend};
use crate::config::{OptionRegistry, OptionSpec, options};
use crate::fs::{self, Dir};
use std::sync::Arc;

pub const SUMMARY: &str = "Alter objects on databases to reflect the filesystem representation";

/// Every option `push` accepts, grouped for help output
pub fn registry() -> OptionRegistry {
    let mut registry = OptionRegistry::new();
    registry.add_group(
        "DDL generation",
        [
            OptionSpec::bool(
                "exact-match",
                false,
                "Follow *.sql table definitions exactly, even for differences with no functional impact",
            ),
            OptionSpec::string(
                "alter-lock",
                "",
                "Apply a LOCK clause to all ALTER TABLEs (none, shared, exclusive)",
            ),
            OptionSpec::string(
                "alter-algorithm",
                "",
                "Apply an ALGORITHM clause to all ALTER TABLEs (inplace, copy, instant)",
            ),
        ],
    );

    let mut external = options::host_wrapper_options();
    external.extend([
        OptionSpec::string(
            "diff-wrapper",
            "",
            "External bin that prints the DDL needed to make a schema match its *.sql files",
        ),
        OptionSpec::string(
            "verify-wrapper",
            "",
            "External bin that checks generated DDL before it runs",
        ),
        OptionSpec::string(
            "alter-wrapper",
            "",
            "External bin to shell out to for ALTER TABLE; see manual for template vars",
        )
        .short('x'),
        OptionSpec::string(
            "alter-wrapper-min-size",
            "0",
            "Ignore --alter-wrapper for tables smaller than this size in bytes",
        ),
        OptionSpec::string(
            "ddl-wrapper",
            "",
            "Like --alter-wrapper, but applies to all DDL types (CREATE, DROP, ALTER)",
        )
        .short('X'),
    ]);
    registry.add_group("External tool", external);

    registry.add_group(
        "Linter",
        [OptionSpec::bool(
            "lint",
            true,
            "Check directories for problems before proceeding",
        )],
    );

    registry.add_group(
        "Safety",
        [
            OptionSpec::bool(
                "verify",
                true,
                "Test all generated statements with verify-wrapper before running them",
            ),
            OptionSpec::bool(
                "allow-unsafe",
                false,
                "Permit running ALTER or DROP operations that are potentially destructive",
            ),
            OptionSpec::bool("dry-run", false, "Output DDL but don't run it"),
            OptionSpec::bool(
                "foreign-key-checks",
                false,
                "Force the server to check referential integrity of any new foreign key",
            ),
            OptionSpec::string(
                "safe-below-size",
                "0",
                "Always permit destructive operations for tables below this size in bytes",
            ),
        ],
    );

    registry.add_group(
        "Sharding",
        [
            OptionSpec::bool(
                "first-only",
                false,
                "For dirs mapping to multiple instances or schemas, just run against the first per dir",
            )
            .short('1'),
            OptionSpec::bool("brief", false, "With --dry-run, only list instances with differences")
                .hidden(),
            OptionSpec::string(
                "concurrent-instances",
                "1",
                "Perform operations on this number of instances concurrently",
            )
            .short('c'),
        ],
    );

    registry.add_group("Connection", options::connection_options());
    registry
}

pub fn command() -> CommandSpec {
    CommandSpec {
        name: "push",
        summary: SUMMARY,
        registry: Arc::new(registry()),
        handler: handle,
    }
}

fn handle(invocation: &Invocation) -> ExitValue {
    let dir = match Dir::parse(&invocation.workdir, &invocation.config) {
        Ok(dir) => Arc::new(dir),
        Err(fs::Error::Config(e)) => return ExitValue::bad_config(e.to_string()),
        Err(e) => return ExitValue::fatal(e.to_string()),
    };
    let config = Arc::clone(&dir.config);

    let workers = match config.get_int("concurrent-instances") {
        Ok(n) if n >= 1 => usize::try_from(n).unwrap_or(usize::MAX),
        Ok(_) => return ExitValue::bad_config("concurrent-instances cannot be less than 1"),
        Err(e) => return ExitValue::bad_config(e.to_string()),
    };

    let dry_run = config.get_bool("dry-run");
    let printer = Printer::new(dry_run && config.get_bool("brief"));
    let options = WalkOptions {
        first_only: config.get_bool("first-only"),
        lint: config.get_bool("lint"),
    };
    log::info!(
        "pushing {} with {workers} worker(s){}",
        dir.path.display(),
        if dry_run { " (dry run)" } else { "" }
    );

    match applier::run(dir, &WrapperBackend::new(), &printer, workers, options) {
        Ok(summary) => ExitValue::from(summary.outcome(dry_run)),
        Err(ApplyError::Config(message)) => ExitValue::bad_config(message),
        Err(ApplyError::Fatal(message)) => ExitValue::fatal(message),
    }
}
