use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::SchedulingPolicyOverrides;

/// Identifier wrapper for a single solver invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolveId(pub String);

impl SolveId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SolveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of an interview loop. Sessions run in ascending `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSessionTemplate {
    pub id: String,
    pub order: u32,
    pub name: String,
    pub duration_minutes: i64,
    pub interviewer_pool: InterviewerPool,
    #[serde(default)]
    pub constraints: SessionConstraints,
}

impl LoopSessionTemplate {
    /// Session length, or `None` when it is not positive or does not fit a `Duration`.
    pub fn duration(&self) -> Option<Duration> {
        if self.duration_minutes <= 0 {
            return None;
        }
        Duration::try_minutes(self.duration_minutes)
    }
}

/// Interviewers eligible to run a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewerPool {
    pub emails: Vec<String>,
    #[serde(default = "default_required_count")]
    pub required_count: u32,
}

fn default_required_count() -> u32 {
    1
}

impl InterviewerPool {
    /// Pool members with duplicates removed, in the order they were declared.
    pub fn distinct_emails(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.emails.len());
        for email in &self.emails {
            let email = email.trim();
            if !email.is_empty() && !seen.contains(&email) {
                seen.push(email);
            }
        }
        seen
    }
}

/// Per-session placement rules. Business hours are evaluated on UTC wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConstraints {
    #[serde(with = "hhmm")]
    pub earliest_start_local: NaiveTime,
    #[serde(with = "hhmm")]
    pub latest_end_local: NaiveTime,
    /// Gap required before the next session in loop order.
    pub min_gap_to_next_minutes: u32,
}

impl Default for SessionConstraints {
    fn default() -> Self {
        Self {
            earliest_start_local: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            latest_end_local: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            min_gap_to_next_minutes: 0,
        }
    }
}

/// Window the candidate declared as available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAvailabilityBlock {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl CandidateAvailabilityBlock {
    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_at <= start && end <= self.end_at
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_at - self.start_at).num_minutes().max(0)
    }
}

/// Half-open busy interval pulled from an interviewer's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl BusyInterval {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end_at && end > self.start_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewerSchedule {
    pub email: String,
    #[serde(default)]
    pub busy_intervals: Vec<BusyInterval>,
}

impl InterviewerSchedule {
    pub fn is_free(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !self
            .busy_intervals
            .iter()
            .any(|busy| busy.overlaps(start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// Interview already committed to an interviewer's calendar by an earlier loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingBooking {
    pub booking_id: String,
    pub interviewer_email: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,
}

impl ExistingBooking {
    pub fn conflicts_with(&self, email: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status != BookingStatus::Cancelled
            && self.interviewer_email == email
            && start < self.end_at
            && end > self.start_at
    }
}

/// Everything a solve needs. Schedules are keyed by interviewer email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSolveRequest {
    pub sessions: Vec<LoopSessionTemplate>,
    pub candidate_blocks: Vec<CandidateAvailabilityBlock>,
    #[serde(default = "default_timezone")]
    pub candidate_timezone: String,
    #[serde(default)]
    pub interviewer_schedules: BTreeMap<String, InterviewerSchedule>,
    #[serde(default)]
    pub existing_bookings: Vec<ExistingBooking>,
    #[serde(default)]
    pub policy: Option<SchedulingPolicyOverrides>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl LoopSolveRequest {
    /// Sessions sorted by `order`; ties keep their submitted position.
    pub fn ordered_sessions(&self) -> Vec<LoopSessionTemplate> {
        let mut sessions = self.sessions.clone();
        sessions.sort_by_key(|session| session.order);
        sessions
    }

    /// Pool members referenced by any session that have no schedule attached yet.
    pub fn missing_schedule_emails(&self) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for session in &self.sessions {
            for email in session.interviewer_pool.distinct_emails() {
                if !self.interviewer_schedules.contains_key(email)
                    && !missing.iter().any(|known| known == email)
                {
                    missing.push(email.to_string());
                }
            }
        }
        missing
    }
}

pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
    }

    pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, hour, minute, 0)
            .single()
            .expect("valid instant")
    }

    #[test]
    fn busy_overlap_is_half_open() {
        let busy = BusyInterval {
            start_at: at(10, 0),
            end_at: at(11, 0),
        };

        assert!(!busy.overlaps(at(9, 0), at(10, 0)));
        assert!(!busy.overlaps(at(11, 0), at(12, 0)));
        assert!(busy.overlaps(at(10, 59), at(11, 30)));
    }

    #[test]
    fn cancelled_bookings_never_conflict() {
        let mut booking = ExistingBooking {
            booking_id: "bk-1".to_string(),
            interviewer_email: "ana@example.com".to_string(),
            start_at: at(10, 0),
            end_at: at(11, 0),
            status: BookingStatus::Confirmed,
        };
        assert!(booking.conflicts_with("ana@example.com", at(10, 30), at(11, 30)));
        assert!(!booking.conflicts_with("bo@example.com", at(10, 30), at(11, 30)));

        booking.status = BookingStatus::Cancelled;
        assert!(!booking.conflicts_with("ana@example.com", at(10, 30), at(11, 30)));
    }

    #[test]
    fn pool_emails_are_deduplicated_in_order() {
        let pool = InterviewerPool {
            emails: vec![
                "b@example.com".to_string(),
                "a@example.com".to_string(),
                " b@example.com ".to_string(),
                String::new(),
            ],
            required_count: 1,
        };

        assert_eq!(pool.distinct_emails(), vec!["b@example.com", "a@example.com"]);
    }

    #[test]
    fn constraints_deserialize_with_defaults() {
        let constraints: SessionConstraints =
            serde_json::from_str(r#"{ "latest_end_local": "18:30" }"#).expect("parses");

        assert_eq!(
            constraints.earliest_start_local,
            NaiveTime::from_hms_opt(9, 0, 0).expect("valid time")
        );
        assert_eq!(
            constraints.latest_end_local,
            NaiveTime::from_hms_opt(18, 30, 0).expect("valid time")
        );
        assert_eq!(constraints.min_gap_to_next_minutes, 0);
    }

    #[test]
    fn constraints_reject_malformed_times() {
        let parsed: Result<SessionConstraints, _> =
            serde_json::from_str(r#"{ "earliest_start_local": "nine" }"#);
        assert!(parsed.is_err());
    }
}
