use std::sync::Arc;

use tracing::{info, warn};

use super::commit::{commit_solution, CommitOutcome, CommitStatus};
use super::domain::{LoopSolveRequest, SolveId};
use super::policy::SchedulingPolicy;
use super::repository::{CalendarGateway, LoopSolveRun, RepositoryError, SolveRunRepository};
use super::solver::{LoopAutopilotSolver, LoopSolveResult, SolveStatus};

/// Service composing the solver with run persistence and the calendar provider.
pub struct LoopAutopilotService<R, C> {
    repository: Arc<R>,
    calendar: Arc<C>,
    solver: Arc<LoopAutopilotSolver>,
}

impl<R, C> LoopAutopilotService<R, C>
where
    R: SolveRunRepository + 'static,
    C: CalendarGateway + 'static,
{
    pub fn new(repository: Arc<R>, calendar: Arc<C>, policy: SchedulingPolicy) -> Self {
        Self {
            repository,
            calendar,
            solver: Arc::new(LoopAutopilotSolver::new(policy)),
        }
    }

    pub fn solver(&self) -> &LoopAutopilotSolver {
        &self.solver
    }

    /// Solve once per idempotency key; repeat calls return the stored run.
    ///
    /// Schedules missing from the request are fetched from the calendar gateway. If that fails
    /// the ERROR result is returned without being stored so the caller can retry.
    pub fn solve(
        &self,
        idempotency_key: &str,
        mut request: LoopSolveRequest,
    ) -> Result<LoopSolveRun, LoopServiceError> {
        if let Some(existing) = self.repository.fetch_by_key(idempotency_key)? {
            info!(
                solve_id = %existing.solve_id(),
                idempotency_key,
                "returning stored loop solve"
            );
            return Ok(existing);
        }

        let missing = request.missing_schedule_emails();
        if !missing.is_empty() {
            match self.calendar.busy_schedules(&missing) {
                Ok(schedules) => {
                    for schedule in schedules {
                        request
                            .interviewer_schedules
                            .entry(schedule.email.clone())
                            .or_insert(schedule);
                    }
                }
                Err(err) => {
                    warn!(error = %err, idempotency_key, "interviewer schedules unavailable");
                    let result = LoopSolveResult::error(SolveId::generate(), &err);
                    return Ok(LoopSolveRun::new(idempotency_key, result));
                }
            }
        }

        let result = self.solver.solve(&request);
        match self
            .repository
            .insert(LoopSolveRun::new(idempotency_key, result))
        {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict) => self
                .repository
                .fetch_by_key(idempotency_key)?
                .ok_or(LoopServiceError::Repository(RepositoryError::Conflict)),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the chosen solution to calendars, rolling back on partial failure.
    ///
    /// A run that already committed returns its recorded outcome.
    pub fn commit(
        &self,
        solve_id: &SolveId,
        solution_id: &str,
    ) -> Result<CommitOutcome, LoopServiceError> {
        let run = self.get(solve_id)?;

        if run.status() != SolveStatus::Solved {
            return Err(LoopServiceError::NotSolved {
                solve_id: solve_id.clone(),
                status: run.status(),
            });
        }
        if let Some(previous) = run
            .commit
            .as_ref()
            .filter(|outcome| outcome.status == CommitStatus::Committed)
        {
            return Ok(previous.clone());
        }

        let solution = run
            .result
            .solution(solution_id)
            .ok_or_else(|| LoopServiceError::SolutionNotFound {
                solve_id: solve_id.clone(),
                solution_id: solution_id.to_string(),
            })?;

        let outcome = commit_solution(self.calendar.as_ref(), solve_id, solution);
        info!(
            %solve_id,
            solution_id,
            status = ?outcome.status,
            events = outcome.events.len(),
            "loop commit finished"
        );
        self.repository.record_commit(solve_id, outcome.clone())?;
        Ok(outcome)
    }

    /// Fetch a stored run for API responses.
    pub fn get(&self, solve_id: &SolveId) -> Result<LoopSolveRun, LoopServiceError> {
        self.repository
            .fetch(solve_id)?
            .ok_or_else(|| LoopServiceError::SolveNotFound(solve_id.clone()))
    }
}

/// Error raised by the loop autopilot service.
#[derive(Debug, thiserror::Error)]
pub enum LoopServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("solve {0} not found")]
    SolveNotFound(SolveId),
    #[error("solution {solution_id} not found in solve {solve_id}")]
    SolutionNotFound {
        solve_id: SolveId,
        solution_id: String,
    },
    #[error("solve {solve_id} is {} and has nothing to commit", .status.label())]
    NotSolved {
        solve_id: SolveId,
        status: SolveStatus,
    },
}
