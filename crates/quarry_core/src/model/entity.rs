//! Entity contract: table metadata, row mapping and change tracking.
//!
//! # Responsibility
//! - Describe how a Rust struct maps to one table row.
//! - Track the original snapshot used to compute changed fields.
//! - Carry the persister-issued handle of a queued entity.
//!
//! # Invariants
//! - `as_storable_changed_array()` is always a subset of
//!   `as_storable_array()`.
//! - Relationship names and unstorable fields never reach a write.
//! - An entity without a captured snapshot reports every storable field as
//!   changed.
//!
//! # See also
//! - `crate::repo::persister` for how snapshots and handles are consumed.

use crate::db::{Record, Value};
use crate::error::{OrmError, OrmResult};
use crate::factory::DEFAULT_REPOSITORY;
use chrono::Utc;
use std::fmt::{Display, Formatter};

/// Storage format for timestamp and soft-delete date columns (UTC).
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opaque identity issued by a persister when an entity is queued.
///
/// Handles are only meaningful to the persister that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub(crate) u64);

impl Display for EntityHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bookkeeping embedded in every entity value.
///
/// Cloning an entity clones its handle too, so a clone refers to the same
/// queued operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    /// Storable column snapshot taken when the entity was loaded or written.
    pub original: Option<Vec<(String, Value)>>,
    /// Set while (or after) the entity sits in a persister queue.
    pub handle: Option<EntityHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

/// Declared association to rows of another table.
///
/// Rows are matched with `related.foreign_key = self.local_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub name: &'static str,
    pub table: &'static str,
    pub local_key: &'static str,
    pub foreign_key: &'static str,
    pub kind: RelationKind,
}

impl Relationship {
    pub const fn one(
        name: &'static str,
        table: &'static str,
        local_key: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            local_key,
            foreign_key,
            kind: RelationKind::One,
        }
    }

    pub const fn many(
        name: &'static str,
        table: &'static str,
        local_key: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            table,
            local_key,
            foreign_key,
            kind: RelationKind::Many,
        }
    }
}

/// Columns used by soft-deletable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDeleteColumns {
    /// Integer flag; `1` marks the row deleted.
    pub flag: &'static str,
    /// Optional date column stamped on soft delete.
    pub date: Option<&'static str>,
}

impl Default for SoftDeleteColumns {
    fn default() -> Self {
        Self {
            flag: "deleted",
            date: Some("deleted_date"),
        }
    }
}

/// Columns stamped automatically on create/save for dated entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampColumns {
    pub created: Option<&'static str>,
    pub modified: Option<&'static str>,
}

impl Default for TimestampColumns {
    fn default() -> Self {
        Self {
            created: Some("created"),
            modified: Some("modified"),
        }
    }
}

/// A struct mapped to one table row.
///
/// Implementors provide row mapping (`from_record`, `values`, `set_field`)
/// and embed an `EntityState`; everything else has defaults.
pub trait Entity: Sized + 'static {
    fn table() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    /// Repository class id resolved through the factory.
    fn repository() -> &'static str {
        DEFAULT_REPOSITORY
    }

    /// Connection override; `None` uses the default connection.
    fn connection() -> Option<&'static str> {
        None
    }

    fn relationships() -> Vec<Relationship> {
        Vec::new()
    }

    /// Whitelist of writable columns; `None` means every column.
    fn storable() -> Option<&'static [&'static str]> {
        None
    }

    fn unstorable() -> &'static [&'static str] {
        &[]
    }

    fn soft_delete() -> Option<SoftDeleteColumns> {
        None
    }

    fn timestamps() -> Option<TimestampColumns> {
        None
    }

    /// Builds an entity from one result row.
    fn from_record(record: &Record) -> OrmResult<Self>;

    /// Column values in declaration order.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Assigns one column value (pk back-fill, timestamps, soft delete).
    fn set_field(&mut self, column: &str, value: Value) -> OrmResult<()>;

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// Receives rows loaded for a declared relationship.
    fn attach_relationship(&mut self, name: &str, _records: Vec<Record>) -> OrmResult<()> {
        Err(OrmError::UnknownRelationship {
            table: Self::table().to_string(),
            name: name.to_string(),
        })
    }

    fn relationship(name: &str) -> Option<Relationship> {
        Self::relationships()
            .into_iter()
            .find(|relationship| relationship.name == name)
    }

    fn as_array(&self) -> Vec<(&'static str, Value)> {
        self.values()
    }

    /// Columns eligible for writes.
    fn as_storable_array(&self) -> Vec<(&'static str, Value)> {
        let relationships = Self::relationships();
        let whitelist = Self::storable();
        let blacklist = Self::unstorable();
        self.values()
            .into_iter()
            .filter(|(column, _)| {
                whitelist.map_or(true, |allowed| allowed.contains(column))
                    && !blacklist.contains(column)
                    && !relationships.iter().any(|r| r.name == *column)
            })
            .collect()
    }

    /// Storable columns whose value differs from the captured snapshot.
    fn as_storable_changed_array(&self) -> Vec<(&'static str, Value)> {
        let storable = self.as_storable_array();
        let Some(original) = self.state().original.as_ref() else {
            return storable;
        };
        storable
            .into_iter()
            .filter(|(column, value)| {
                original
                    .iter()
                    .find(|(name, _)| name == column)
                    .map_or(true, |(_, before)| before != value)
            })
            .collect()
    }

    /// Primary key value, `None` when absent or NULL.
    fn primary_key_value(&self) -> Option<Value> {
        let key = Self::primary_key();
        self.values()
            .into_iter()
            .find(|(column, _)| *column == key)
            .map(|(_, value)| value)
            .filter(|value| *value != Value::Null)
    }

    /// Takes a fresh snapshot of the storable columns.
    fn capture_original(&mut self) {
        let snapshot = self
            .as_storable_array()
            .into_iter()
            .map(|(column, value)| (column.to_string(), value))
            .collect();
        self.state_mut().original = Some(snapshot);
    }

    /// Captures the snapshot at construction time so only later changes are
    /// written by `save`.
    fn tracked(mut self) -> Self {
        self.capture_original();
        self
    }

    fn is_tracked(&self) -> bool {
        self.state().original.is_some()
    }

    fn handle(&self) -> Option<EntityHandle> {
        self.state().handle
    }
}

/// Maps one row and captures the snapshot right after mapping.
pub(crate) fn hydrate<E: Entity>(record: &Record) -> OrmResult<E> {
    let mut entity = E::from_record(record)?;
    entity.capture_original();
    Ok(entity)
}

/// Current UTC time in `DATE_FORMAT`.
pub fn now_timestamp() -> String {
    Utc::now().format(DATE_FORMAT).to_string()
}
