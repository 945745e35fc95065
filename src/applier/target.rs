//! Target enumeration
//!
//! A producer thread walks the directory tree depth-first and streams one
//! [`Target`] per (instance, logical schema, schema name) onto a bounded
//! channel. Directories that cannot be turned into targets are counted as
//! skips.

use crate::fs::{self, Dir, LogicalSchema};
use crate::instance::{self, Instance};
use crossbeam_channel::{Sender, select};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use workpool::CancelToken;

/// One unit of apply work
#[derive(Debug, Clone)]
pub struct Target {
    pub instance: Instance,
    pub dir: Arc<Dir>,
    /// Schema the definitions are pushed to on the instance
    pub schema_name: String,
    schema_index: usize,
}

impl Target {
    pub fn new(instance: Instance, dir: Arc<Dir>, schema_index: usize, schema_name: String) -> Self {
        Self {
            instance,
            dir,
            schema_name,
            schema_index,
        }
    }

    pub fn logical_schema(&self) -> &LogicalSchema {
        &self.dir.logical_schemas[self.schema_index]
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.instance, self.schema_name)
    }
}

/// Settings for the walk, taken from the root directory's config
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    pub first_only: bool,
    pub lint: bool,
}

/// Targets of one directory plus how many skips it contributed
#[derive(Debug, Default)]
pub struct DirTargets {
    pub targets: Vec<Target>,
    pub skipped: usize,
}

/// Expand a single directory into targets, without descending.
pub fn dir_targets(dir: &Arc<Dir>, options: WalkOptions) -> DirTargets {
    let mut out = DirTargets::default();
    let rel = dir.rel_path();

    if let Some(err) = &dir.parse_error {
        log::warn!("Skipping {rel}: {err}");
        out.skipped += 1;
        return out;
    }
    if dir.logical_schemas.is_empty() {
        return out;
    }
    if !dir.has_host() {
        log::debug!("{rel}: no host configured for environment {}", dir.config.environment());
        return out;
    }

    let instances = match instance::resolve(dir) {
        Ok(list) if list.is_empty() => {
            log::warn!("Skipping {rel}: host resolved to no instances");
            out.skipped += 1;
            return out;
        }
        Ok(list) => list,
        Err(e) => {
            log::warn!("Skipping {rel}: {e}");
            out.skipped += 1;
            return out;
        }
    };

    let mut shards = dir.schema_names();
    let nameless_usable = !shards.is_empty();
    if dir.logical_schemas.iter().any(LogicalSchema::is_nameless) && !nameless_usable {
        log::warn!("Skipping {rel}: no schema name set for its *.sql definitions");
        out.skipped += 1;
    }
    if options.first_only {
        shards.truncate(1);
    }

    let instance_count = if options.first_only { 1 } else { instances.len() };
    for instance in instances.into_iter().take(instance_count) {
        for (index, schema) in dir.logical_schemas.iter().enumerate() {
            // first-only means the first schema that yields targets
            if schema.is_nameless() && shards.is_empty() {
                continue;
            }
            if schema.is_nameless() {
                for name in &shards {
                    out.targets
                        .push(Target::new(instance.clone(), Arc::clone(dir), index, name.clone()));
                }
            } else {
                out.targets.push(Target::new(
                    instance.clone(),
                    Arc::clone(dir),
                    index,
                    schema.name.clone(),
                ));
            }
            if options.first_only {
                break;
            }
        }
    }
    out
}

/// Start the producer.
///
/// The thread owns `tx`; dropping it on return closes the channel. Joining
/// yields the number of skipped directories, or the fatal error that ended
/// the walk (the token is cancelled in that case).
pub fn spawn_producer(
    root: Arc<Dir>,
    tx: Sender<Target>,
    token: CancelToken,
    options: WalkOptions,
) -> std::io::Result<JoinHandle<fs::Result<usize>>> {
    thread::Builder::new()
        .name("targets".to_string())
        .spawn(move || {
            let mut skipped = 0;
            let result = walk(&root, &tx, &token, options, &mut skipped);
            if result.is_err() {
                token.cancel();
            }
            result.map(|_| skipped)
        })
}

enum Flow {
    Continue,
    Stop,
}

fn walk(
    dir: &Arc<Dir>,
    tx: &Sender<Target>,
    token: &CancelToken,
    options: WalkOptions,
    skipped: &mut usize,
) -> fs::Result<Flow> {
    if token.is_cancelled() {
        return Ok(Flow::Stop);
    }

    if options.lint && !dir.ignored_statements.is_empty() {
        let first = &dir.ignored_statements[0];
        log::warn!(
            "{}: {} statement(s) are not CREATEs and will be ignored, first at {}",
            dir.rel_path(),
            dir.ignored_statements.len(),
            first.location()
        );
    }

    let found = dir_targets(dir, options);
    *skipped += found.skipped;
    for target in found.targets {
        log::debug!("queueing {target}");
        select! {
            send(tx, target) -> sent => {
                if sent.is_err() {
                    return Ok(Flow::Stop);
                }
            }
            recv(token.done()) -> _ => return Ok(Flow::Stop),
        }
    }

    if dir.parse_error.is_some() {
        return Ok(Flow::Continue);
    }
    for child in dir.subdirs()? {
        if let Flow::Stop = walk(&child, tx, token, options, skipped)? {
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}
