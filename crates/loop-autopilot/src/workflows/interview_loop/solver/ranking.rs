use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::super::domain::LoopSessionTemplate;
use super::super::policy::SchedulingPolicy;
use super::search::PartialSolution;

const SINGLE_DAY_POINTS: u32 = 50;
const EXTRA_DAY_PENALTY: u32 = 20;
const EARLINESS_POINTS: f64 = 30.0;
const EARLINESS_WINDOW_MINUTES: f64 = 7.0 * 24.0 * 60.0;
const DIVERSITY_POINTS_PER_INTERVIEWER: u32 = 2;
const DIVERSITY_CAP: u32 = 10;
const COMPACTNESS_POINTS: f64 = 10.0;
const COMPACTNESS_WINDOW_MINUTES: f64 = 480.0;
const DISPLAY_FORMAT: &str = "%a %b %-d %Y, %-I:%M %p %Z";

/// One placed session of a proposed loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub session_id: String,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interviewer_email: String,
    pub rationale: String,
    pub display_start: String,
    pub display_end: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankingFactor {
    SingleDay,
    Earliness,
    InterviewerDiversity,
    Compactness,
}

/// Points a ranking factor contributed to a solution's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: RankingFactor,
    pub points: u32,
}

/// A complete schedule for every session of the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSolution {
    pub solution_id: String,
    pub score: u32,
    pub score_components: Vec<ScoreComponent>,
    pub days_span: usize,
    pub is_single_day: bool,
    pub sessions: Vec<ScheduledSession>,
    pub rationale_summary: String,
    /// Minutes from the first start to the last end, idle gaps included.
    pub total_duration_minutes: i64,
    pub loop_start_utc: DateTime<Utc>,
    pub loop_end_utc: DateTime<Utc>,
}

impl LoopSolution {
    pub fn distinct_interviewers(&self) -> usize {
        self.sessions
            .iter()
            .map(|session| session.interviewer_email.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Turns completed search states into display-ready solutions.
pub(crate) struct SolutionBuilder<'a> {
    sessions: &'a [LoopSessionTemplate],
    timezone: Tz,
}

impl<'a> SolutionBuilder<'a> {
    /// Unknown timezone names fall back to UTC for display.
    pub fn new(sessions: &'a [LoopSessionTemplate], candidate_timezone: &str) -> Self {
        let timezone = candidate_timezone.trim().parse::<Tz>().unwrap_or(Tz::UTC);
        Self { sessions, timezone }
    }

    pub fn build(&self, partial: &PartialSolution<'_>, sequence: usize) -> Option<LoopSolution> {
        let placements = partial.placements();
        let (first, last) = (placements.first()?, placements.last()?);

        let sessions = placements
            .iter()
            .zip(self.sessions)
            .map(|(placement, template)| {
                let load =
                    partial.interviewer_load(placement.day_key, &placement.interviewer_email);
                let mut rationale = format!(
                    "{} with {} ({} min) on {}",
                    template.name,
                    placement.interviewer_email,
                    template.duration_minutes,
                    placement.day_key
                );
                if load > 1 {
                    rationale.push_str(&format!(
                        "; interviewer holds {load} sessions of this loop that day"
                    ));
                }

                ScheduledSession {
                    session_id: template.id.clone(),
                    name: template.name.clone(),
                    start: placement.start,
                    end: placement.end,
                    interviewer_email: placement.interviewer_email.clone(),
                    rationale,
                    display_start: self.display(placement.start),
                    display_end: self.display(placement.end),
                }
            })
            .collect::<Vec<_>>();

        let days_span = partial.days_used();
        let is_single_day = days_span == 1;
        let rationale_summary = if is_single_day {
            format!("All {} sessions on {}", sessions.len(), first.day_key)
        } else {
            format!("{} sessions across {} days", sessions.len(), days_span)
        };

        Some(LoopSolution {
            solution_id: format!("sol-{sequence:03}"),
            score: 0,
            score_components: Vec::new(),
            days_span,
            is_single_day,
            sessions,
            rationale_summary,
            total_duration_minutes: (last.end - first.start).num_minutes(),
            loop_start_utc: first.start,
            loop_end_utc: last.end,
        })
    }

    fn display(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format(DISPLAY_FORMAT)
            .to_string()
    }
}

/// Scores every solution and sorts them best first. Ties keep discovery order.
pub(crate) fn rank_solutions(solutions: &mut [LoopSolution], policy: &SchedulingPolicy) {
    for solution in solutions.iter_mut() {
        let mut components = Vec::with_capacity(4);
        if policy.prefer_single_day {
            components.push(ScoreComponent {
                factor: RankingFactor::SingleDay,
                points: single_day_points(solution.days_span),
            });
        }
        components.push(ScoreComponent {
            factor: RankingFactor::Earliness,
            points: earliness_points(solution.loop_start_utc, solution.loop_end_utc),
        });
        components.push(ScoreComponent {
            factor: RankingFactor::InterviewerDiversity,
            points: diversity_points(solution.distinct_interviewers()),
        });
        components.push(ScoreComponent {
            factor: RankingFactor::Compactness,
            points: compactness_points(solution.total_duration_minutes),
        });

        solution.score = components.iter().map(|component| component.points).sum();
        solution.score_components = components;
    }

    solutions.sort_by(|a, b| b.score.cmp(&a.score));
}

pub(crate) fn single_day_points(days_span: usize) -> u32 {
    if days_span <= 1 {
        return SINGLE_DAY_POINTS;
    }
    let extra_days = u32::try_from(days_span - 1).unwrap_or(u32::MAX);
    SINGLE_DAY_POINTS.saturating_sub(EXTRA_DAY_PENALTY.saturating_mul(extra_days))
}

pub(crate) fn earliness_points(loop_start: DateTime<Utc>, loop_end: DateTime<Utc>) -> u32 {
    let span_minutes = (loop_end - loop_start).num_minutes().max(0) as f64;
    let ratio = (span_minutes / EARLINESS_WINDOW_MINUTES).min(1.0);
    (EARLINESS_POINTS * (1.0 - ratio)).round() as u32
}

pub(crate) fn diversity_points(distinct_interviewers: usize) -> u32 {
    let distinct = u32::try_from(distinct_interviewers).unwrap_or(u32::MAX);
    DIVERSITY_POINTS_PER_INTERVIEWER
        .saturating_mul(distinct)
        .min(DIVERSITY_CAP)
}

pub(crate) fn compactness_points(total_duration_minutes: i64) -> u32 {
    let ratio = total_duration_minutes.max(0) as f64 / COMPACTNESS_WINDOW_MINUTES;
    (COMPACTNESS_POINTS * (1.0 - ratio).max(0.0)).round() as u32
}
