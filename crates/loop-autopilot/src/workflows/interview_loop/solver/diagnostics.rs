use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::super::domain::{CandidateAvailabilityBlock, InterviewerSchedule, LoopSessionTemplate};
use super::super::policy::SchedulingPolicy;

const TOP_CONSTRAINT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKey {
    NoCandidateAvailability,
    InvalidSessionDuration,
    InterviewerPoolEmpty,
    InterviewerPoolAllBusy,
    SessionTooLongForBlocks,
    BusinessHoursViolation,
    SequencingConflict,
    SearchBudgetExhausted,
}

/// Only blocking violations are produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocking,
}

/// A constraint that most likely prevented a loop from being scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub key: ViolationKey,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub evidence: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    RequestCandidateAvailability,
    FixSessionDuration,
    AddInterviewersToPool,
    ReduceSessionDuration,
    ExpandCandidateAvailability,
    ExtendBusinessHours,
    RelaxSequencingConstraints,
    IncreaseSearchBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstimatedImpact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub estimated_impact: EstimatedImpact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

/// Remediation suggestion; priority 1 is the most urgent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action_type: ActionType,
    pub description: String,
    pub priority: u8,
    pub payload: ActionPayload,
}

impl RecommendedAction {
    fn new(
        action_type: ActionType,
        priority: u8,
        impact: EstimatedImpact,
        session_id: Option<&str>,
        description: String,
    ) -> Self {
        Self {
            action_type,
            description,
            priority,
            payload: ActionPayload {
                estimated_impact: impact,
                session_id: session_id.map(str::to_string),
                details: BTreeMap::new(),
            },
        }
    }

    fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.payload.details.insert(key.to_string(), value);
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.payload.session_id.as_deref()
    }
}

/// Accumulates violations and actions, deduplicating as it goes.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    violations: Vec<ConstraintViolation>,
    seen: BTreeSet<(ViolationKey, Option<String>)>,
    actions: Vec<RecommendedAction>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn record(&mut self, violation: ConstraintViolation, actions: Vec<RecommendedAction>) {
        let key = (violation.key, violation.session_id.clone());
        if self.seen.insert(key) {
            self.violations.push(violation);
            self.actions.extend(actions);
        }
    }

    pub fn no_candidate_availability(&mut self, session_count: usize, block_count: usize) {
        let description = if session_count == 0 {
            "no interview sessions were supplied, nothing can be scheduled".to_string()
        } else {
            "candidate has not declared any availability".to_string()
        };

        self.record(
            ConstraintViolation {
                key: ViolationKey::NoCandidateAvailability,
                severity: Severity::Blocking,
                description,
                session_id: None,
                evidence: json!({
                    "session_count": session_count,
                    "candidate_block_count": block_count,
                }),
            },
            vec![RecommendedAction::new(
                ActionType::RequestCandidateAvailability,
                1,
                EstimatedImpact::High,
                None,
                "Ask the candidate to share availability windows".to_string(),
            )],
        );
    }

    /// Finds the most likely blocking cause for one session, first match wins.
    pub fn diagnose_session(
        &mut self,
        session: &LoopSessionTemplate,
        blocks: &[CandidateAvailabilityBlock],
        schedules: &BTreeMap<String, InterviewerSchedule>,
    ) {
        let session_id = session.id.as_str();
        let pool = session.interviewer_pool.distinct_emails();
        let longest_block = blocks
            .iter()
            .map(CandidateAvailabilityBlock::duration_minutes)
            .max()
            .unwrap_or(0);

        if session.duration().is_none() {
            self.record(
                violation(
                    ViolationKey::InvalidSessionDuration,
                    session,
                    format!(
                        "{} has an unusable duration of {} minutes",
                        session.name, session.duration_minutes
                    ),
                    json!({ "duration_minutes": session.duration_minutes }),
                ),
                vec![RecommendedAction::new(
                    ActionType::FixSessionDuration,
                    1,
                    EstimatedImpact::High,
                    Some(session_id),
                    format!("Set a valid duration for {}", session.name),
                )],
            );
            return;
        }

        if pool.is_empty() {
            self.record(
                violation(
                    ViolationKey::InterviewerPoolEmpty,
                    session,
                    format!("{} has no interviewers in its pool", session.name),
                    json!({ "pool_size": 0 }),
                ),
                vec![add_interviewers(session)],
            );
            return;
        }

        // Any busy interval, or no calendar at all, counts as unavailable.
        let missing: Vec<&str> = pool
            .iter()
            .copied()
            .filter(|email| !schedules.contains_key(*email))
            .collect();
        let all_busy = pool.iter().all(|email| {
            schedules
                .get(*email)
                .map(|schedule| !schedule.busy_intervals.is_empty())
                .unwrap_or(true)
        });
        if all_busy {
            self.record(
                violation(
                    ViolationKey::InterviewerPoolAllBusy,
                    session,
                    format!(
                        "every interviewer in the {} pool has calendar conflicts",
                        session.name
                    ),
                    json!({ "pool": pool, "missing_schedules": missing }),
                ),
                vec![add_interviewers(session)],
            );
            return;
        }

        if session.duration_minutes > longest_block {
            self.record(
                violation(
                    ViolationKey::SessionTooLongForBlocks,
                    session,
                    format!(
                        "{} needs {} minutes but the longest availability block is {} minutes",
                        session.name, session.duration_minutes, longest_block
                    ),
                    json!({
                        "duration_minutes": session.duration_minutes,
                        "longest_block_minutes": longest_block,
                    }),
                ),
                vec![
                    RecommendedAction::new(
                        ActionType::ReduceSessionDuration,
                        2,
                        EstimatedImpact::Medium,
                        Some(session_id),
                        format!(
                            "Shorten {} to at most {} minutes",
                            session.name, longest_block
                        ),
                    )
                    .with_detail("max_duration_minutes", json!(longest_block)),
                    RecommendedAction::new(
                        ActionType::ExpandCandidateAvailability,
                        1,
                        EstimatedImpact::High,
                        Some(session_id),
                        format!(
                            "Ask the candidate for a block of at least {} minutes",
                            session.duration_minutes
                        ),
                    )
                    .with_detail("min_block_minutes", json!(session.duration_minutes)),
                ],
            );
            return;
        }

        let window = format!(
            "{}-{}",
            session.constraints.earliest_start_local.format("%H:%M"),
            session.constraints.latest_end_local.format("%H:%M")
        );
        self.record(
            violation(
                ViolationKey::BusinessHoursViolation,
                session,
                format!(
                    "no availability for {} fits inside business hours {} UTC",
                    session.name, window
                ),
                json!({ "business_hours_utc": window }),
            ),
            vec![RecommendedAction::new(
                ActionType::ExtendBusinessHours,
                3,
                EstimatedImpact::Low,
                Some(session_id),
                format!("Extend the allowed hours for {}", session.name),
            )],
        );
    }

    /// Every session had placements but no combination satisfied gaps and day span.
    pub fn sequencing_conflict(
        &mut self,
        sessions: &[LoopSessionTemplate],
        policy: &SchedulingPolicy,
    ) {
        let gaps: BTreeMap<&str, u32> = sessions
            .iter()
            .map(|session| {
                (
                    session.id.as_str(),
                    session.constraints.min_gap_to_next_minutes,
                )
            })
            .collect();

        self.record(
            ConstraintViolation {
                key: ViolationKey::SequencingConflict,
                severity: Severity::Blocking,
                description: format!(
                    "no ordering of feasible placements satisfies the session gaps within {} day(s)",
                    policy.max_days_span
                ),
                session_id: None,
                evidence: json!({
                    "max_days_span": policy.max_days_span,
                    "min_gap_to_next_minutes": gaps,
                }),
            },
            vec![RecommendedAction::new(
                ActionType::RelaxSequencingConstraints,
                2,
                EstimatedImpact::Medium,
                None,
                "Reduce gaps between sessions or allow the loop to span more days".to_string(),
            )
            .with_detail("max_days_span", json!(policy.max_days_span))],
        );
    }

    pub fn search_budget_exhausted(
        &mut self,
        iterations: u64,
        timed_out: bool,
        policy: &SchedulingPolicy,
    ) {
        self.record(
            ConstraintViolation {
                key: ViolationKey::SearchBudgetExhausted,
                severity: Severity::Blocking,
                description: if timed_out {
                    format!(
                        "search stopped after {} ms before finding a schedule",
                        policy.solver_timeout_ms
                    )
                } else {
                    format!("search stopped after {iterations} iterations before finding a schedule")
                },
                session_id: None,
                evidence: json!({
                    "iterations": iterations,
                    "timed_out": timed_out,
                    "max_search_iterations": policy.max_search_iterations,
                    "solver_timeout_ms": policy.solver_timeout_ms,
                }),
            },
            vec![RecommendedAction::new(
                ActionType::IncreaseSearchBudget,
                2,
                EstimatedImpact::Medium,
                None,
                "Raise the solver timeout or iteration limit and retry".to_string(),
            )],
        );
    }

    /// Top violations plus actions deduplicated by type and session, most urgent first.
    pub fn finish(self) -> (Vec<ConstraintViolation>, Vec<RecommendedAction>) {
        let mut violations = self.violations;
        violations.truncate(TOP_CONSTRAINT_LIMIT);

        let mut seen = BTreeSet::new();
        let mut actions: Vec<RecommendedAction> = self
            .actions
            .into_iter()
            .filter(|action| seen.insert((action.action_type, action.payload.session_id.clone())))
            .collect();
        actions.sort_by_key(|action| action.priority);

        (violations, actions)
    }
}

fn violation(
    key: ViolationKey,
    session: &LoopSessionTemplate,
    description: String,
    evidence: Value,
) -> ConstraintViolation {
    ConstraintViolation {
        key,
        severity: Severity::Blocking,
        description,
        session_id: Some(session.id.clone()),
        evidence,
    }
}

fn add_interviewers(session: &LoopSessionTemplate) -> RecommendedAction {
    RecommendedAction::new(
        ActionType::AddInterviewersToPool,
        1,
        EstimatedImpact::High,
        Some(&session.id),
        format!("Add available interviewers to the {} pool", session.name),
    )
}
