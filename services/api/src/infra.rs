use chrono::NaiveDate;
use loop_autopilot::workflows::interview_loop::{
    CalendarError, CalendarEventDraft, CalendarEventId, CalendarGateway, CommitOutcome,
    InterviewerSchedule, LoopSolveRun, RepositoryError, SolveId, SolveRunRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySolveRunRepository {
    runs: Arc<Mutex<HashMap<SolveId, LoopSolveRun>>>,
}

impl SolveRunRepository for InMemorySolveRunRepository {
    fn insert(&self, run: LoopSolveRun) -> Result<LoopSolveRun, RepositoryError> {
        let mut guard = self.runs.lock().expect("repository mutex poisoned");
        let key_taken = guard
            .values()
            .any(|existing| existing.idempotency_key == run.idempotency_key);
        if key_taken || guard.contains_key(run.solve_id()) {
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

/// Calendar stand-in: known interviewers report their seeded busy time, anyone else is free.
#[derive(Default, Clone)]
pub(crate) struct InMemoryCalendarGateway {
    schedules: Arc<Mutex<BTreeMap<String, InterviewerSchedule>>>,
    events: Arc<Mutex<Vec<(CalendarEventId, CalendarEventDraft)>>>,
    next_event: Arc<Mutex<u64>>,
}

impl InMemoryCalendarGateway {
    pub(crate) fn seed(&self, schedule: InterviewerSchedule) {
        let mut guard = self.schedules.lock().expect("calendar mutex poisoned");
        guard.insert(schedule.email.clone(), schedule);
    }

    pub(crate) fn events(&self) -> Vec<(CalendarEventId, CalendarEventDraft)> {
        self.events.lock().expect("calendar mutex poisoned").clone()
    }
}

impl CalendarGateway for InMemoryCalendarGateway {
    fn busy_schedules(&self, emails: &[String]) -> Result<Vec<InterviewerSchedule>, CalendarError> {
        let guard = self.schedules.lock().expect("calendar mutex poisoned");
        Ok(emails
            .iter()
            .map(|email| {
                guard.get(email).cloned().unwrap_or_else(|| InterviewerSchedule {
                    email: email.clone(),
                    busy_intervals: Vec::new(),
                })
            })
            .collect())
    }

    fn create_event(&self, draft: &CalendarEventDraft) -> Result<CalendarEventId, CalendarError> {
        let mut counter = self.next_event.lock().expect("calendar mutex poisoned");
        *counter += 1;
        let id = CalendarEventId(format!("evt-{:04}", *counter));

        let mut guard = self.events.lock().expect("calendar mutex poisoned");
        guard.push((id.clone(), draft.clone()));
        Ok(id)
    }

    fn delete_event(&self, id: &CalendarEventId) -> Result<(), CalendarError> {
        let mut guard = self.events.lock().expect("calendar mutex poisoned");
        let position = guard
            .iter()
            .position(|(known, _)| known == id)
            .ok_or_else(|| CalendarError::Rejected(format!("unknown event {}", id.0)))?;
        guard.remove(position);
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
