use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::SolveId;
use super::repository::{CalendarEventDraft, CalendarEventId, CalendarGateway};
use super::solver::LoopSolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitStatus {
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedEvent {
    pub session_id: String,
    pub event_id: CalendarEventId,
}

/// What happened to an event created before the commit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackEntry {
    pub session_id: String,
    pub event_id: CalendarEventId,
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub solve_id: SolveId,
    pub solution_id: String,
    pub status: CommitStatus,
    pub events: Vec<CommittedEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rollback: Vec<RollbackEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Creates one event per session in order; the first failure deletes what was created,
/// newest first. No retries are attempted.
pub(crate) fn commit_solution<C>(
    calendar: &C,
    solve_id: &SolveId,
    solution: &LoopSolution,
) -> CommitOutcome
where
    C: CalendarGateway + ?Sized,
{
    let mut created: Vec<CommittedEvent> = Vec::with_capacity(solution.sessions.len());

    for session in &solution.sessions {
        let draft = CalendarEventDraft {
            solve_id: solve_id.clone(),
            solution_id: solution.solution_id.clone(),
            session_id: session.session_id.clone(),
            title: session.name.clone(),
            interviewer_email: session.interviewer_email.clone(),
            start: session.start,
            end: session.end,
        };

        match calendar.create_event(&draft) {
            Ok(event_id) => created.push(CommittedEvent {
                session_id: session.session_id.clone(),
                event_id,
            }),
            Err(err) => {
                warn!(
                    %solve_id,
                    session_id = %session.session_id,
                    error = %err,
                    "calendar write failed, rolling back loop"
                );
                let rollback = created
                    .iter()
                    .rev()
                    .map(|event| match calendar.delete_event(&event.event_id) {
                        Ok(()) => RollbackEntry {
                            session_id: event.session_id.clone(),
                            event_id: event.event_id.clone(),
                            deleted: true,
                            error: None,
                        },
                        Err(delete_err) => RollbackEntry {
                            session_id: event.session_id.clone(),
                            event_id: event.event_id.clone(),
                            deleted: false,
                            error: Some(delete_err.to_string()),
                        },
                    })
                    .collect();

                return CommitOutcome {
                    solve_id: solve_id.clone(),
                    solution_id: solution.solution_id.clone(),
                    status: CommitStatus::RolledBack,
                    events: Vec::new(),
                    rollback,
                    failure: Some(format!("{}: {err}", session.session_id)),
                };
            }
        }
    }

    CommitOutcome {
        solve_id: solve_id.clone(),
        solution_id: solution.solution_id.clone(),
        status: CommitStatus::Committed,
        events: created,
        rollback: Vec::new(),
        failure: None,
    }
}
