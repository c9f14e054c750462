//! Conversation orchestration for the Skylark travel assistant.
//!
//! This crate ties the rest of the system together: it classifies each
//! incoming message, routes it to an intent handler, drives the multi-step
//! booking flow, and keeps replies coming even when a collaborator is down.
//! It also hosts the background maintenance worker that watches fares,
//! schedules departure reminders, and sweeps idle sessions.

pub mod booking;
pub mod error;
pub mod maintenance;
pub mod orchestrator;
pub mod response;

pub use booking::{booking_steps, StepStatus};
pub use error::DialogueError;
pub use maintenance::MaintenanceWorker;
pub use orchestrator::Orchestrator;
pub use response::{EngineResponse, Responder};
