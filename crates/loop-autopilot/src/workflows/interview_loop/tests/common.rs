use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::interview_loop::commit::CommitOutcome;
use crate::workflows::interview_loop::domain::{
    BusyInterval, CandidateAvailabilityBlock, InterviewerPool, InterviewerSchedule,
    LoopSessionTemplate, LoopSolveRequest, SessionConstraints, SolveId,
};
use crate::workflows::interview_loop::repository::{
    CalendarError, CalendarEventDraft, CalendarEventId, CalendarGateway, LoopSolveRun,
    RepositoryError, SolveRunRepository,
};
use crate::workflows::interview_loop::{
    loop_router, LoopAutopilotService, LoopAutopilotSolver, SchedulingPolicy,
    SchedulingPolicyOverrides,
};

pub(super) const ANA: &str = "ana@example.com";
pub(super) const BO: &str = "bo@example.com";

/// Instant on 2025-03-`day` (a Tuesday when `day` is 4) in UTC.
pub(super) fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn block(
    day: u32,
    (start_hour, start_minute): (u32, u32),
    (end_hour, end_minute): (u32, u32),
) -> CandidateAvailabilityBlock {
    CandidateAvailabilityBlock {
        start_at: at(day, start_hour, start_minute),
        end_at: at(day, end_hour, end_minute),
    }
}

pub(super) fn session(
    id: &str,
    order: u32,
    duration_minutes: i64,
    gap_minutes: u32,
    pool: &[&str],
) -> LoopSessionTemplate {
    LoopSessionTemplate {
        id: id.to_string(),
        order,
        name: format!("{id} interview"),
        duration_minutes,
        interviewer_pool: InterviewerPool {
            emails: pool.iter().map(|email| email.to_string()).collect(),
            required_count: 1,
        },
        constraints: SessionConstraints {
            min_gap_to_next_minutes: gap_minutes,
            ..SessionConstraints::default()
        },
    }
}

pub(super) fn free(email: &str) -> InterviewerSchedule {
    InterviewerSchedule {
        email: email.to_string(),
        busy_intervals: Vec::new(),
    }
}

pub(super) fn busy(email: &str, intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> InterviewerSchedule {
    InterviewerSchedule {
        email: email.to_string(),
        busy_intervals: intervals
            .iter()
            .map(|(start_at, end_at)| BusyInterval {
                start_at: *start_at,
                end_at: *end_at,
            })
            .collect(),
    }
}

pub(super) fn request(
    sessions: Vec<LoopSessionTemplate>,
    candidate_blocks: Vec<CandidateAvailabilityBlock>,
    schedules: Vec<InterviewerSchedule>,
) -> LoopSolveRequest {
    LoopSolveRequest {
        sessions,
        candidate_blocks,
        candidate_timezone: "UTC".to_string(),
        interviewer_schedules: schedules
            .into_iter()
            .map(|schedule| (schedule.email.clone(), schedule))
            .collect::<BTreeMap<_, _>>(),
        existing_bookings: Vec::new(),
        policy: None,
    }
}

/// Phone screen then onsite on one 09:00-13:00 block with a single free interviewer.
pub(super) fn two_session_request() -> LoopSolveRequest {
    request(
        vec![
            session("screen", 1, 45, 15, &[ANA]),
            session("onsite", 2, 60, 0, &[ANA]),
        ],
        vec![block(4, (9, 0), (13, 0))],
        vec![free(ANA)],
    )
}

pub(super) fn with_policy(
    mut request: LoopSolveRequest,
    overrides: SchedulingPolicyOverrides,
) -> LoopSolveRequest {
    request.policy = Some(overrides);
    request
}

pub(super) fn solver() -> LoopAutopilotSolver {
    LoopAutopilotSolver::new(SchedulingPolicy::default())
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    runs: Arc<Mutex<HashMap<SolveId, LoopSolveRun>>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.runs.lock().expect("repository mutex poisoned").len()
    }
}

impl SolveRunRepository for MemoryRepository {
    fn insert(&self, run: LoopSolveRun) -> Result<LoopSolveRun, RepositoryError> {
        let mut guard = self.runs.lock().expect("repository mutex poisoned");
        let duplicate_key = guard
            .values()
            .any(|existing| existing.idempotency_key == run.idempotency_key);
        if duplicate_key || guard.contains_key(run.solve_id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(run.solve_id().clone(), run.clone());
        Ok(run)
    }

    fn fetch(&self, id: &SolveId) -> Result<Option<LoopSolveRun>, RepositoryError> {
        let guard = self.runs.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn fetch_by_key(&self, idempotency_key: &str) -> Result<Option<LoopSolveRun>, RepositoryError> {
        let guard = self.runs.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .find(|run| run.idempotency_key == idempotency_key)
            .cloned())
    }

    fn record_commit(&self, id: &SolveId, outcome: CommitOutcome) -> Result<(), RepositoryError> {
        let mut guard = self.runs.lock().expect("repository mutex poisoned");
        let run = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        run.commit = Some(outcome);
        Ok(())
    }
}

pub(super) struct UnavailableRepository;

impl SolveRunRepository for UnavailableRepository {
    fn insert(&self, _run: LoopSolveRun) -> Result<LoopSolveRun, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    fn fetch(&self, _id: &SolveId) -> Result<Option<LoopSolveRun>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    fn fetch_by_key(&self, _key: &str) -> Result<Option<LoopSolveRun>, RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }

    fn record_commit(&self, _id: &SolveId, _outcome: CommitOutcome) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("offline".to_string()))
    }
}

/// Calendar double that serves configured busy data and records event writes.
#[derive(Default)]
pub(super) struct MemoryCalendar {
    schedules: BTreeMap<String, InterviewerSchedule>,
    unavailable: bool,
    fail_create_at: Option<usize>,
    state: Mutex<CalendarState>,
}

#[derive(Default)]
struct CalendarState {
    lookups: Vec<Vec<String>>,
    created: Vec<CalendarEventDraft>,
    deleted: Vec<CalendarEventId>,
}

impl MemoryCalendar {
    pub(super) fn with_schedule(mut self, schedule: InterviewerSchedule) -> Self {
        self.schedules.insert(schedule.email.clone(), schedule);
        self
    }

    pub(super) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Fails the `attempt`-th create call, counting from zero.
    pub(super) fn failing_create_at(attempt: usize) -> Self {
        Self {
            fail_create_at: Some(attempt),
            ..Self::default()
        }
    }

    pub(super) fn lookups(&self) -> Vec<Vec<String>> {
        self.state.lock().expect("calendar mutex poisoned").lookups.clone()
    }

    pub(super) fn created(&self) -> Vec<CalendarEventDraft> {
        self.state.lock().expect("calendar mutex poisoned").created.clone()
    }

    pub(super) fn deleted(&self) -> Vec<CalendarEventId> {
        self.state.lock().expect("calendar mutex poisoned").deleted.clone()
    }
}

impl CalendarGateway for MemoryCalendar {
    fn busy_schedules(&self, emails: &[String]) -> Result<Vec<InterviewerSchedule>, CalendarError> {
        let mut state = self.state.lock().expect("calendar mutex poisoned");
        state.lookups.push(emails.to_vec());
        if self.unavailable {
            return Err(CalendarError::Unavailable("graph api timeout".to_string()));
        }
        Ok(emails
            .iter()
            .filter_map(|email| self.schedules.get(email).cloned())
            .collect())
    }

    fn create_event(&self, draft: &CalendarEventDraft) -> Result<CalendarEventId, CalendarError> {
        let mut state = self.state.lock().expect("calendar mutex poisoned");
        let attempt = state.created.len();
        if self.fail_create_at == Some(attempt) {
            return Err(CalendarError::Rejected("calendar quota exceeded".to_string()));
        }
        state.created.push(draft.clone());
        Ok(CalendarEventId(format!("evt-{attempt}")))
    }

    fn delete_event(&self, id: &CalendarEventId) -> Result<(), CalendarError> {
        let mut state = self.state.lock().expect("calendar mutex poisoned");
        state.deleted.push(id.clone());
        Ok(())
    }
}

pub(super) fn build_service(
    calendar: MemoryCalendar,
) -> (
    LoopAutopilotService<MemoryRepository, MemoryCalendar>,
    Arc<MemoryRepository>,
    Arc<MemoryCalendar>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let calendar = Arc::new(calendar);
    let service = LoopAutopilotService::new(
        repository.clone(),
        calendar.clone(),
        SchedulingPolicy::default(),
    );
    (service, repository, calendar)
}

pub(super) fn router_with_service(
    service: LoopAutopilotService<MemoryRepository, MemoryCalendar>,
) -> axum::Router {
    loop_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
