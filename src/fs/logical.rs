//! Logical schemas - CREATE statements grouped by the schema they target

use indexmap::IndexMap;
use indexmap::map::Entry;
use sqlfile::{ObjectKey, Statement};
use std::fmt;

/// A named or nameless group of CREATE statements from one directory.
///
/// The nameless schema (empty `name`) maps onto whatever the `schema` option
/// says; a named schema always targets the database schema of that name.
#[derive(Debug, Clone, Default)]
pub struct LogicalSchema {
    pub name: String,
    pub char_set: String,
    pub collation: String,
    pub creates: IndexMap<ObjectKey, Statement>,
}

/// Two CREATEs in one logical schema define the same object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub key: ObjectKey,
    pub first: String,
    pub second: String,
}

impl fmt::Display for Duplicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} defined more than once in same schema: {} and {}",
            self.key, self.first, self.second
        )
    }
}

impl LogicalSchema {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_nameless(&self) -> bool {
        self.name.is_empty()
    }

    /// Add a CREATE; rejects a second definition of the same object.
    pub fn add_create(&mut self, stmt: Statement) -> Result<(), Duplicate> {
        let Some(key) = stmt.object.clone() else {
            return Ok(());
        };
        match self.creates.entry(key) {
            Entry::Occupied(existing) => Err(Duplicate {
                key: existing.key().clone(),
                first: existing.get().location(),
                second: stmt.location(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(stmt);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.creates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty()
    }
}
