//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight exchanges drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast handle; every long-running task subscribes to it
//! - Draining has no deadline of its own; the request timeout bounds it

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_handler, wait_for_signal};
