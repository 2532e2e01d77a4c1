//! Lorebase event bus and notification infrastructure.
//!
//! This crate provides the building blocks for edit lifecycle
//! notifications:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`EditEvent`] — the canonical domain event envelope.
//! - [`delivery`] — external delivery channels (email).
//!
//! Delivery is fire-and-forget: failures are logged by the callers and
//! never block edit finalization.

pub mod bus;
pub mod delivery;

pub use bus::{EditEvent, EventBus};
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
