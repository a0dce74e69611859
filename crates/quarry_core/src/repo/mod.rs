//! Entity repositories: the read path and the write path.
//!
//! # Responsibility
//! - Map selects to typed entities (`retriever`).
//! - Turn entity writes into statements, immediately or batched
//!   (`persister`).
//! - Bundle both per entity type (`repository`).
//!
//! # Invariants
//! - Repositories never own a handle; they borrow their driver's.
//! - Writes for one connection share one ordered queue.
//!
//! # See also
//! - `crate::driver` for the connection these operate on.

pub mod persister;
pub mod repository;
pub mod retriever;

pub use persister::{
    ExecutedOperation, OperationKind, PendingOperation, PersistReport, Persister, WriteOutcome,
};
pub use repository::Repository;
pub use retriever::Retriever;
