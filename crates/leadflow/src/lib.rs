//! Lead lifecycle workflow engine.
//!
//! Leads enter through CSV intake, are qualified as ready, worked on the outbound-call
//! Kanban board, scheduled into call slots and handed to an external dialer. Every stage
//! change lands in an append-only activity log.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
