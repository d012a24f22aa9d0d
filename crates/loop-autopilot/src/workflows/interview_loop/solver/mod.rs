//! Loop Autopilot solver.
//!
//! A solve runs in five phases: candidate availability is discretized into slots, each session
//! gets its independently feasible placements, a bounded backtracking search combines them in
//! session order, complete schedules are ranked, and when nothing fits the diagnostics explain
//! why. The solver holds no state between calls and performs no I/O.

pub(crate) mod diagnostics;
pub(crate) mod feasibility;
pub(crate) mod ranking;
pub(crate) mod search;
pub(crate) mod slots;

pub use diagnostics::{
    ActionPayload, ActionType, ConstraintViolation, EstimatedImpact, RecommendedAction, Severity,
    ViolationKey,
};
pub use feasibility::FeasiblePlacement;
pub use ranking::{LoopSolution, RankingFactor, ScheduledSession, ScoreComponent};
pub use slots::{generate_slots, CandidateSlot};

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{LoopSolveRequest, SolveId};
use super::policy::SchedulingPolicy;
use diagnostics::Diagnostics;
use feasibility::FeasibilityEngine;
use ranking::{rank_solutions, SolutionBuilder};
use search::{BacktrackingSearch, SearchBudget};

/// Candidates collected per returned solution so the ranker has alternatives to choose from.
const OVER_COLLECTION_FACTOR: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Solved,
    Unsatisfiable,
    Timeout,
    Error,
}

impl SolveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SolveStatus::Solved => "SOLVED",
            SolveStatus::Unsatisfiable => "UNSATISFIABLE",
            SolveStatus::Timeout => "TIMEOUT",
            SolveStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveMetadata {
    pub solve_duration_ms: u64,
    pub search_iterations: u64,
    pub slots_evaluated: u64,
    /// Interviewer schedules supplied to the solve, a proxy for upstream calendar cost.
    pub graph_api_calls: usize,
    pub booking_conflicts_detected: u64,
    pub timed_out: bool,
    pub iteration_limit_reached: bool,
}

/// Failure that happened before the solver could run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveErrorDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSolveResult {
    pub solve_id: SolveId,
    pub status: SolveStatus,
    pub solutions: Vec<LoopSolution>,
    pub top_constraints: Vec<ConstraintViolation>,
    pub recommended_actions: Vec<RecommendedAction>,
    pub confidence: Confidence,
    pub metadata: SolveMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SolveErrorDetail>,
}

impl LoopSolveResult {
    /// Builds an ERROR result from a failure raised while gathering solver input.
    pub fn error(solve_id: SolveId, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            solve_id,
            status: SolveStatus::Error,
            solutions: Vec::new(),
            top_constraints: Vec::new(),
            recommended_actions: Vec::new(),
            confidence: Confidence::Low,
            metadata: SolveMetadata::default(),
            error: Some(SolveErrorDetail {
                message: err.to_string(),
                causes,
            }),
        }
    }

    pub fn solution(&self, solution_id: &str) -> Option<&LoopSolution> {
        self.solutions
            .iter()
            .find(|solution| solution.solution_id == solution_id)
    }
}

/// Stateless solver configured with a base policy; requests may override it per field.
#[derive(Debug, Clone, Default)]
pub struct LoopAutopilotSolver {
    policy: SchedulingPolicy,
}

impl LoopAutopilotSolver {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn solve(&self, request: &LoopSolveRequest) -> LoopSolveResult {
        let started = Instant::now();
        let solve_id = SolveId::generate();
        let policy = self.policy.merged(request.policy.as_ref());
        let sessions = request.ordered_sessions();
        let mut metadata = SolveMetadata {
            graph_api_calls: request.interviewer_schedules.len(),
            ..SolveMetadata::default()
        };
        let mut diagnostics = Diagnostics::default();

        if sessions.is_empty() || request.candidate_blocks.is_empty() {
            diagnostics.no_candidate_availability(sessions.len(), request.candidate_blocks.len());
            return finish(solve_id, Vec::new(), diagnostics, metadata, started, false);
        }

        let slots = generate_slots(&request.candidate_blocks, policy.slot_granularity_minutes);
        debug!(%solve_id, slots = slots.len(), "generated candidate slots");

        let engine = FeasibilityEngine::new(
            &request.candidate_blocks,
            &request.interviewer_schedules,
            &request.existing_bookings,
            &policy,
        );
        let feasibility = engine.evaluate(&sessions, &slots);
        metadata.slots_evaluated = feasibility.slots_evaluated;
        metadata.booking_conflicts_detected = feasibility.booking_conflicts;

        let blocked = feasibility.blocked_sessions();
        if !blocked.is_empty() {
            debug!(%solve_id, blocked = blocked.len(), "sessions without feasible placements");
            for index in blocked {
                diagnostics.diagnose_session(
                    &sessions[index],
                    &request.candidate_blocks,
                    &request.interviewer_schedules,
                );
            }
            return finish(solve_id, Vec::new(), diagnostics, metadata, started, false);
        }

        let builder = SolutionBuilder::new(&sessions, &request.candidate_timezone);
        let budget = SearchBudget {
            timeout: Duration::from_millis(policy.solver_timeout_ms),
            max_iterations: policy.max_search_iterations,
            max_days_span: usize::try_from(policy.max_days_span).unwrap_or(usize::MAX),
            solution_cap: policy
                .max_solutions_to_return
                .saturating_mul(OVER_COLLECTION_FACTOR),
        };
        let outcome =
            BacktrackingSearch::new(&sessions, &feasibility.placements, &builder, budget).run();

        metadata.search_iterations = outcome.iterations;
        metadata.timed_out = outcome.timed_out;
        metadata.iteration_limit_reached = outcome.iteration_limit_reached;
        if outcome.budget_exhausted() {
            warn!(
                %solve_id,
                iterations = outcome.iterations,
                timed_out = outcome.timed_out,
                "loop search stopped on budget"
            );
        }

        let budget_exhausted = outcome.budget_exhausted();
        let mut solutions = outcome.solutions;
        if solutions.is_empty() {
            if budget_exhausted {
                diagnostics.search_budget_exhausted(
                    metadata.search_iterations,
                    metadata.timed_out,
                    &policy,
                );
            } else {
                diagnostics.sequencing_conflict(&sessions, &policy);
                for session in &sessions {
                    diagnostics.diagnose_session(
                        session,
                        &request.candidate_blocks,
                        &request.interviewer_schedules,
                    );
                }
            }
            return finish(
                solve_id,
                solutions,
                diagnostics,
                metadata,
                started,
                budget_exhausted,
            );
        }

        rank_solutions(&mut solutions, &policy);
        solutions.truncate(policy.max_solutions_to_return);
        finish(solve_id, solutions, diagnostics, metadata, started, budget_exhausted)
    }
}

fn finish(
    solve_id: SolveId,
    solutions: Vec<LoopSolution>,
    diagnostics: Diagnostics,
    mut metadata: SolveMetadata,
    started: Instant,
    budget_exhausted: bool,
) -> LoopSolveResult {
    let status = if !solutions.is_empty() {
        SolveStatus::Solved
    } else if budget_exhausted {
        SolveStatus::Timeout
    } else {
        SolveStatus::Unsatisfiable
    };

    let confidence = match (status, solutions.len()) {
        (SolveStatus::Solved, count) if count >= 3 => Confidence::High,
        (SolveStatus::Solved, _) => Confidence::Medium,
        // A budget notice is not a diagnosis, so TIMEOUT stays LOW.
        (SolveStatus::Unsatisfiable, _) if !diagnostics.is_empty() => Confidence::High,
        _ => Confidence::Low,
    };

    let (top_constraints, recommended_actions) = diagnostics.finish();
    metadata.solve_duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    info!(
        %solve_id,
        status = status.label(),
        solutions = solutions.len(),
        iterations = metadata.search_iterations,
        duration_ms = metadata.solve_duration_ms,
        "loop solve finished"
    );

    LoopSolveResult {
        solve_id,
        status,
        solutions,
        top_constraints,
        recommended_actions,
        confidence,
        metadata,
        error: None,
    }
}
