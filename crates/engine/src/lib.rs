//! Edit lifecycle orchestration.
//!
//! [`EditLifecycleCoordinator`] drives every pending edit from proposal to
//! a terminal verdict: it computes the diff, persists the edit in the
//! transient store, schedules deferred tallies and reminder notifications,
//! records votes, and, on an accept or reject, freezes the edit into
//! durable storage and cleans the transient state up.
//!
//! The coordinator runs as a pool of independent tasks: synchronously
//! inside a vote cast, or asynchronously via the at-least-once
//! [`Scheduler`]. All cross-invocation coordination goes through the
//! transient store's atomic primitives; nothing here assumes in-process
//! mutual exclusion.

pub mod coordinator;
pub mod error;
pub mod notify;
pub mod scheduler;
pub mod storage;

pub use coordinator::EditLifecycleCoordinator;
pub use error::{EngineError, EngineResult};
pub use notify::{EditNotification, EditNotifier, EventBusNotifier, NotificationKind};
pub use scheduler::{Scheduler, TaskFuture, TokioScheduler};
pub use storage::{DurableEditStore, PgDurableEditStore};
