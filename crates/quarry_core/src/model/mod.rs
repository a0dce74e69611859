//! Entity model contracts shared by the retriever and persister.
//!
//! # Responsibility
//! - Define the metadata and mapping surface every entity type implements.
//!
//! # Invariants
//! - Entities are plain values; all database access goes through a driver.

pub mod entity;

pub use entity::{
    now_timestamp, Entity, EntityHandle, EntityState, RelationKind, Relationship,
    SoftDeleteColumns, TimestampColumns, DATE_FORMAT,
};
