//! Loop Autopilot: schedules ordered interview loops against candidate availability and
//! interviewer calendars.
//!
//! The solver itself lives in [`workflows::interview_loop::solver`] and is a pure, synchronous
//! computation. The surrounding [`workflows::interview_loop::service`] adds idempotent
//! persistence and the commit workflow through collaborator traits.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
