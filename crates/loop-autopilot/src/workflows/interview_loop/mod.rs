//! Interview loop scheduling: domain model, the autopilot solver, and the service that wraps it
//! with idempotent persistence and the calendar commit workflow.

pub mod commit;
pub mod domain;
pub mod policy;
pub mod repository;
pub mod router;
pub mod service;
pub mod solver;

#[cfg(test)]
mod tests;

pub use commit::{CommitOutcome, CommitStatus, CommittedEvent, RollbackEntry};
pub use domain::{
    BookingStatus, BusyInterval, CandidateAvailabilityBlock, ExistingBooking, InterviewerPool,
    InterviewerSchedule, LoopSessionTemplate, LoopSolveRequest, SessionConstraints, SolveId,
};
pub use policy::{SchedulingPolicy, SchedulingPolicyOverrides};
pub use repository::{
    CalendarError, CalendarEventDraft, CalendarEventId, CalendarGateway, LoopSolveRun,
    RepositoryError, SolveRunRepository,
};
pub use router::loop_router;
pub use service::{LoopAutopilotService, LoopServiceError};
pub use solver::{
    ActionType, Confidence, ConstraintViolation, LoopAutopilotSolver, LoopSolution,
    LoopSolveResult, RecommendedAction, ScheduledSession, SolveMetadata, SolveStatus,
    ViolationKey,
};
