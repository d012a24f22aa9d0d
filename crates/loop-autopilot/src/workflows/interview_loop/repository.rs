use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commit::CommitOutcome;
use super::domain::{InterviewerSchedule, SolveId};
use super::solver::{LoopSolveResult, SolveStatus};

/// Persisted record of one solve, keyed by the caller's idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSolveRun {
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub result: LoopSolveResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitOutcome>,
}

impl LoopSolveRun {
    pub fn new(idempotency_key: impl Into<String>, result: LoopSolveResult) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            created_at: Utc::now(),
            result,
            commit: None,
        }
    }

    pub fn solve_id(&self) -> &SolveId {
        &self.result.solve_id
    }

    pub fn status(&self) -> SolveStatus {
        self.result.status
    }
}

/// Storage abstraction for solve runs so the service can be exercised in isolation.
pub trait SolveRunRepository: Send + Sync {
    fn insert(&self, run: LoopSolveRun) -> Result<LoopSolveRun, RepositoryError>;
    fn fetch(&self, id: &SolveId) -> Result<Option<LoopSolveRun>, RepositoryError>;
    fn fetch_by_key(&self, idempotency_key: &str) -> Result<Option<LoopSolveRun>, RepositoryError>;
    fn record_commit(&self, id: &SolveId, outcome: CommitOutcome) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Identifier assigned by the calendar provider to a created event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarEventId(pub String);

/// Event the commit workflow asks the calendar provider to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEventDraft {
    pub solve_id: SolveId,
    pub solution_id: String,
    pub session_id: String,
    pub title: String,
    pub interviewer_email: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Calendar provider boundary: busy lookups for the solver, event writes for commits.
pub trait CalendarGateway: Send + Sync {
    fn busy_schedules(&self, emails: &[String]) -> Result<Vec<InterviewerSchedule>, CalendarError>;
    fn create_event(&self, draft: &CalendarEventDraft) -> Result<CalendarEventId, CalendarError>;
    fn delete_event(&self, id: &CalendarEventId) -> Result<(), CalendarError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar provider unavailable: {0}")]
    Unavailable(String),
    #[error("calendar provider rejected the request: {0}")]
    Rejected(String),
}
