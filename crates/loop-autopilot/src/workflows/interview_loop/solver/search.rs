use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use super::super::domain::LoopSessionTemplate;
use super::feasibility::FeasiblePlacement;
use super::ranking::{LoopSolution, SolutionBuilder};

/// Search state: one chosen placement per session processed so far.
#[derive(Debug, Default)]
pub(crate) struct PartialSolution<'a> {
    placements: Vec<&'a FeasiblePlacement>,
    day_usage: BTreeMap<NaiveDate, usize>,
    interviewers_by_day: BTreeMap<NaiveDate, Vec<&'a str>>,
}

impl<'a> PartialSolution<'a> {
    pub fn placements(&self) -> &[&'a FeasiblePlacement] {
        &self.placements
    }

    pub fn last(&self) -> Option<&'a FeasiblePlacement> {
        self.placements.last().copied()
    }

    pub fn days_used(&self) -> usize {
        self.day_usage.len()
    }

    pub fn uses_day(&self, day: NaiveDate) -> bool {
        self.day_usage.contains_key(&day)
    }

    /// Sessions of this partial loop the interviewer holds on `day`.
    pub fn interviewer_load(&self, day: NaiveDate, email: &str) -> usize {
        self.interviewers_by_day
            .get(&day)
            .map(|emails| emails.iter().filter(|known| **known == email).count())
            .unwrap_or(0)
    }

    fn push(&mut self, placement: &'a FeasiblePlacement) {
        *self.day_usage.entry(placement.day_key).or_insert(0) += 1;
        self.interviewers_by_day
            .entry(placement.day_key)
            .or_default()
            .push(placement.interviewer_email.as_str());
        self.placements.push(placement);
    }

    fn pop(&mut self) {
        let Some(placement) = self.placements.pop() else {
            return;
        };

        if let Some(count) = self.day_usage.get_mut(&placement.day_key) {
            *count -= 1;
            if *count == 0 {
                self.day_usage.remove(&placement.day_key);
            }
        }
        if let Some(emails) = self.interviewers_by_day.get_mut(&placement.day_key) {
            emails.pop();
            if emails.is_empty() {
                self.interviewers_by_day.remove(&placement.day_key);
            }
        }
    }
}

/// Limits that end the search early.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchBudget {
    pub timeout: Duration,
    pub max_iterations: u64,
    pub max_days_span: usize,
    /// Complete solutions to collect before stopping.
    pub solution_cap: usize,
}

#[derive(Debug, Default)]
pub(crate) struct SearchOutcome {
    pub solutions: Vec<LoopSolution>,
    pub iterations: u64,
    pub timed_out: bool,
    pub iteration_limit_reached: bool,
}

impl SearchOutcome {
    pub fn budget_exhausted(&self) -> bool {
        self.timed_out || self.iteration_limit_reached
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Abort,
}

/// Bounded depth-first enumeration of placements in session order.
pub(crate) struct BacktrackingSearch<'a> {
    sessions: &'a [LoopSessionTemplate],
    placements: &'a [Vec<FeasiblePlacement>],
    builder: &'a SolutionBuilder<'a>,
    budget: SearchBudget,
    started: Instant,
    outcome: SearchOutcome,
}

impl<'a> BacktrackingSearch<'a> {
    pub fn new(
        sessions: &'a [LoopSessionTemplate],
        placements: &'a [Vec<FeasiblePlacement>],
        builder: &'a SolutionBuilder<'a>,
        budget: SearchBudget,
    ) -> Self {
        Self {
            sessions,
            placements,
            builder,
            budget,
            started: Instant::now(),
            outcome: SearchOutcome::default(),
        }
    }

    pub fn run(mut self) -> SearchOutcome {
        let mut partial = PartialSolution::default();
        self.extend(0, &mut partial);
        self.outcome
    }

    fn extend(&mut self, index: usize, partial: &mut PartialSolution<'a>) -> Flow {
        if self.started.elapsed() >= self.budget.timeout {
            self.outcome.timed_out = true;
            return Flow::Abort;
        }
        if self.outcome.iterations >= self.budget.max_iterations {
            self.outcome.iteration_limit_reached = true;
            return Flow::Abort;
        }
        if self.outcome.solutions.len() >= self.budget.solution_cap {
            return Flow::Abort;
        }
        self.outcome.iterations += 1;

        if index == self.sessions.len() {
            let sequence = self.outcome.solutions.len() + 1;
            if let Some(solution) = self.builder.build(partial, sequence) {
                self.outcome.solutions.push(solution);
            }
            return Flow::Continue;
        }

        let min_start = match (index.checked_sub(1), partial.last()) {
            (Some(previous), Some(placement)) => {
                let gap = self.sessions[previous].constraints.min_gap_to_next_minutes;
                let earliest = placement
                    .end
                    .checked_add_signed(chrono::Duration::minutes(i64::from(gap)));
                match earliest {
                    Some(earliest) => Some(earliest),
                    None => return Flow::Continue,
                }
            }
            _ => None,
        };

        let placements = self.placements;
        for placement in &placements[index] {
            if min_start.is_some_and(|earliest| placement.start < earliest) {
                continue;
            }
            if !partial.uses_day(placement.day_key)
                && partial.days_used() >= self.budget.max_days_span
            {
                continue;
            }

            partial.push(placement);
            let flow = self.extend(index + 1, partial);
            partial.pop();

            if flow == Flow::Abort {
                return Flow::Abort;
            }
        }

        Flow::Continue
    }
}
