//! Directory nodes: merged config, parsed SQL and logical schemas

use super::ancestry::{ancestor_paths, clean_path, find_repo_base};
use super::logical::LogicalSchema;
use super::{Error, ParseError, Result};
use crate::config::{self, Config, OptionFile};
use indexmap::IndexMap;
use sqlfile::{Statement, StatementType};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use walkdir::WalkDir;

/// One directory of the schema tree
#[derive(Debug)]
pub struct Dir {
    pub path: PathBuf,
    pub config: Arc<Config>,
    pub option_file: Option<OptionFile>,
    pub logical_schemas: Vec<LogicalSchema>,
    /// Statements that are neither CREATEs nor schema switches
    pub ignored_statements: Vec<Statement>,
    pub parse_error: Option<ParseError>,
    repo_base: PathBuf,
    parent: Weak<Dir>,
    named_statements: Vec<Statement>,
}

impl Dir {
    /// Parse `path` with `base` as the lowest-precedence configuration.
    ///
    /// Option files of every directory from the repository base down to
    /// `path` are layered on top of `base`, shallowest first.
    pub fn parse(path: &Path, base: &Config) -> Result<Self> {
        let absolute = std::path::absolute(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let path = clean_path(&absolute);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(Error::NotDir(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path));
            }
            Err(source) => return Err(Error::Io { path, source }),
        }

        let home = crate::paths::home_dir();
        let repo_base = find_repo_base(&path, home.as_deref());

        let mut config = base.clone();
        let mut inherited_error = None;
        let mut ancestors: Vec<PathBuf> = ancestor_paths(&path)
            .into_iter()
            .skip(1)
            .filter(|a| a.starts_with(&repo_base))
            .collect();
        ancestors.reverse();
        for ancestor in &ancestors {
            match load_option_file(ancestor, &repo_base) {
                Ok(Some(file)) => config = config.with_file(&file)?,
                Ok(None) => {}
                Err(Load::Fatal(e)) => return Err(e.into()),
                Err(Load::Local(e)) => {
                    inherited_error.get_or_insert(e);
                }
            }
        }

        let mut dir = Self::build(path, &config, repo_base, Weak::new())?;
        if let Some(e) = inherited_error {
            dir.parse_error.get_or_insert(e);
        }
        Ok(dir)
    }

    fn build(
        path: PathBuf,
        parent_config: &Config,
        repo_base: PathBuf,
        parent: Weak<Self>,
    ) -> Result<Self> {
        let mut dir = Self {
            config: Arc::new(parent_config.clone()),
            option_file: None,
            logical_schemas: Vec::new(),
            ignored_statements: Vec::new(),
            parse_error: None,
            repo_base,
            parent,
            named_statements: Vec::new(),
            path,
        };

        match load_option_file(&dir.path, &dir.repo_base) {
            Ok(Some(file)) => {
                dir.config = Arc::new(parent_config.with_file(&file)?);
                dir.option_file = Some(file);
            }
            Ok(None) => {}
            Err(Load::Fatal(e)) => return Err(e.into()),
            Err(Load::Local(e)) => {
                dir.parse_error = Some(e);
                return Ok(dir);
            }
        }

        if let Err(e) = dir.parse_sql() {
            log::debug!("{}: {e}", dir.path.display());
            dir.logical_schemas.clear();
            dir.parse_error = Some(e);
        }
        Ok(dir)
    }

    fn parse_sql(&mut self) -> std::result::Result<(), ParseError> {
        let mut nameless: Option<LogicalSchema> = None;
        let mut named: IndexMap<String, LogicalSchema> = IndexMap::new();

        for file in self.sql_files()? {
            let mut current_schema: Option<String> = None;
            for stmt in sqlfile::parse_file(&file)? {
                match stmt.kind {
                    StatementType::Create => {
                        let qualified = stmt.schema.is_some();
                        let schema_name = stmt.schema.clone().or_else(|| current_schema.clone());
                        let target = match &schema_name {
                            Some(name) => named
                                .entry(name.clone())
                                .or_insert_with(|| LogicalSchema::named(name.clone())),
                            None => nameless.get_or_insert_with(LogicalSchema::default),
                        };
                        if qualified {
                            self.named_statements.push(stmt.clone());
                        }
                        target.add_create(stmt).map_err(ParseError::Duplicate)?;
                    }
                    StatementType::Command if stmt.is_schema_switch() => {
                        current_schema.clone_from(&stmt.schema);
                        self.named_statements.push(stmt);
                    }
                    StatementType::Command | StatementType::Noop => {}
                    StatementType::Unknown => self.ignored_statements.push(stmt),
                }
            }
        }

        if nameless.is_none()
            && named.is_empty()
            && self
                .option_file
                .as_ref()
                .is_some_and(|f| f.sets_option("schema", self.config.environment()))
        {
            nameless = Some(LogicalSchema::default());
        }

        if let Some(mut schema) = nameless {
            schema.char_set = self.config.get("default-character-set").to_string();
            schema.collation = self.config.get("default-collation").to_string();
            self.logical_schemas.push(schema);
        }
        self.logical_schemas.extend(named.into_values());
        Ok(())
    }

    /// `*.sql` files directly in this directory, sorted by name
    fn sql_files(&self) -> std::result::Result<Vec<PathBuf>, ParseError> {
        let read_err = |source| ParseError::Io {
            path: self.path.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "sql") {
                continue;
            }
            let file_type = entry.file_type().map_err(read_err)?;
            if file_type.is_symlink() {
                check_symlink(&path, &self.repo_base)?;
            } else if !file_type.is_file() {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }

    /// Immediate non-hidden, non-symlinked subdirectories.
    ///
    /// Children with a parse error are included; a fatal config error in
    /// any child aborts.
    pub fn subdirs(self: &Arc<Self>) -> Result<Vec<Arc<Self>>> {
        let mut children = Vec::new();
        let walker = WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let child = Self::build(
                entry.path().to_path_buf(),
                &self.config,
                self.repo_base.clone(),
                Arc::downgrade(self),
            )?;
            children.push(Arc::new(child));
        }

        let bad = children.iter().filter(|c| c.parse_error.is_some()).count();
        if bad > 0 {
            log::debug!(
                "{}: {bad} of {} subdirectories could not be parsed",
                self.path.display(),
                children.len()
            );
        }
        Ok(children)
    }

    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent.upgrade()
    }

    pub fn repo_base(&self) -> &Path {
        &self.repo_base
    }

    /// USE commands and schema-qualified CREATEs, in file order
    pub fn named_schema_statements(&self) -> &[Statement] {
        &self.named_statements
    }

    pub fn base_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Path relative to the repository base: `.` for the base itself, just
    /// the base name when outside it.
    pub fn rel_path(&self) -> String {
        match self.path.strip_prefix(&self.repo_base) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => self.base_name(),
        }
    }

    /// Whether the directory maps to database instances at all
    pub fn has_host(&self) -> bool {
        !self.config.get("host").trim().is_empty()
    }

    /// Entries of the `schema` option
    pub fn schema_names(&self) -> Vec<String> {
        self.config
            .get("schema")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

enum Load {
    Fatal(config::Error),
    Local(ParseError),
}

fn load_option_file(dir: &Path, repo_base: &Path) -> std::result::Result<Option<OptionFile>, Load> {
    let path = dir.join(config::FILE_NAME);
    let meta = match fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(Load::Local(ParseError::Io { path, source })),
    };
    if meta.file_type().is_symlink() {
        check_symlink(&path, repo_base).map_err(Load::Local)?;
    } else if !meta.is_file() {
        return Err(Load::Local(ParseError::Symlink {
            path,
            reason: "not a regular file".to_string(),
        }));
    }
    OptionFile::read(&path).map(Some).map_err(Load::Fatal)
}

/// A symlinked file is usable only if it resolves to a regular file inside
/// the repository base.
fn check_symlink(path: &Path, repo_base: &Path) -> std::result::Result<(), ParseError> {
    let fail = |reason: String| ParseError::Symlink {
        path: path.to_path_buf(),
        reason,
    };
    let target = fs::canonicalize(path).map_err(|e| fail(format!("cannot resolve symlink: {e}")))?;
    let base = fs::canonicalize(repo_base).unwrap_or_else(|_| repo_base.to_path_buf());
    if !target.starts_with(&base) {
        return Err(fail(format!(
            "symlink points outside repository ({})",
            target.display()
        )));
    }
    match fs::metadata(&target) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(fail("symlink does not point to a regular file".to_string())),
        Err(e) => Err(fail(format!("cannot read symlink target: {e}"))),
    }
}
