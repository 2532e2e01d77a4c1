//! Transient storage for pending edits and their in-progress votes.
//!
//! This crate provides the validation-window store: every proposed edit and
//! its votes live here from proposal until a terminal verdict, at which
//! point the engine freezes them into durable storage and deletes them.
//!
//! - [`kv`] — versioned key-value core with compare-and-swap guards and
//!   all-or-nothing batches.
//! - [`pending`] — the [`PendingEditStore`] built on top of it.
//! - [`error`] — the store error taxonomy.

pub mod error;
pub mod kv;
pub mod pending;

pub use error::StoreError;
pub use kv::{KvOp, KvValue, MemoryKv};
pub use pending::{NewEdit, PendingEditStore, ValidationData};
