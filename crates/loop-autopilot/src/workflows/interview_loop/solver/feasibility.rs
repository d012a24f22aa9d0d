use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{
    CandidateAvailabilityBlock, ExistingBooking, InterviewerSchedule, LoopSessionTemplate,
    SessionConstraints,
};
use super::super::policy::SchedulingPolicy;
use super::slots::CandidateSlot;

/// A (start, end, interviewer) triple that satisfies every per-session check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasiblePlacement {
    pub session_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interviewer_email: String,
    pub day_key: NaiveDate,
}

/// Placements per session (indexed like the ordered sessions) plus counters.
#[derive(Debug, Clone, Default)]
pub(crate) struct FeasibilityReport {
    pub placements: Vec<Vec<FeasiblePlacement>>,
    pub slots_evaluated: u64,
    pub booking_conflicts: u64,
}

impl FeasibilityReport {
    pub fn blocked_sessions(&self) -> Vec<usize> {
        self.placements
            .iter()
            .enumerate()
            .filter(|(_, placements)| placements.is_empty())
            .map(|(index, _)| index)
            .collect()
    }
}

/// Evaluates each session independently of the others.
pub(crate) struct FeasibilityEngine<'a> {
    blocks: &'a [CandidateAvailabilityBlock],
    schedules: &'a BTreeMap<String, InterviewerSchedule>,
    bookings: &'a [ExistingBooking],
    policy: &'a SchedulingPolicy,
}

impl<'a> FeasibilityEngine<'a> {
    pub fn new(
        blocks: &'a [CandidateAvailabilityBlock],
        schedules: &'a BTreeMap<String, InterviewerSchedule>,
        bookings: &'a [ExistingBooking],
        policy: &'a SchedulingPolicy,
    ) -> Self {
        Self {
            blocks,
            schedules,
            bookings,
            policy,
        }
    }

    pub fn evaluate(
        &self,
        sessions: &[LoopSessionTemplate],
        slots: &[CandidateSlot],
    ) -> FeasibilityReport {
        let mut report = FeasibilityReport::default();
        for session in sessions {
            let placements = self.placements_for(session, slots, &mut report);
            report.placements.push(placements);
        }
        report
    }

    fn placements_for(
        &self,
        session: &LoopSessionTemplate,
        slots: &[CandidateSlot],
        report: &mut FeasibilityReport,
    ) -> Vec<FeasiblePlacement> {
        let mut placements = Vec::new();
        let Some(duration) = session.duration() else {
            return placements;
        };
        let pool = session.interviewer_pool.distinct_emails();

        for slot in slots {
            report.slots_evaluated += 1;

            let start = slot.start;
            let Some(end) = start.checked_add_signed(duration) else {
                continue;
            };

            if self.policy.enforce_business_hours
                && !within_business_hours(start, end, &session.constraints)
            {
                continue;
            }

            if !self.blocks.iter().any(|block| block.contains(start, end)) {
                continue;
            }

            for email in &pool {
                let Some(schedule) = self.schedules.get(*email) else {
                    continue;
                };
                if !schedule.is_free(start, end) {
                    continue;
                }

                let conflicted = self
                    .bookings
                    .iter()
                    .any(|booking| booking.conflicts_with(email, start, end));
                if conflicted {
                    report.booking_conflicts += 1;
                    if self.policy.reject_existing_booking_conflicts {
                        continue;
                    }
                }

                placements.push(FeasiblePlacement {
                    session_id: session.id.clone(),
                    start,
                    end,
                    interviewer_email: (*email).to_string(),
                    day_key: slot.date_key,
                });
            }
        }

        placements
    }
}

/// Both endpoints must sit on the same UTC day inside `[earliest, latest]`, with the start
/// strictly before `latest` and the end strictly after `earliest`.
pub(crate) fn within_business_hours(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    constraints: &SessionConstraints,
) -> bool {
    if start.date_naive() != end.date_naive() {
        return false;
    }

    let earliest = minute_of_day(constraints.earliest_start_local);
    let latest = minute_of_day(constraints.latest_end_local);
    let start_minute = start.hour() * 60 + start.minute();
    let end_minute = end.hour() * 60 + end.minute();

    start_minute >= earliest
        && start_minute < latest
        && end_minute > earliest
        && end_minute <= latest
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}
