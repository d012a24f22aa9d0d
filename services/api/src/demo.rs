use crate::infra::{InMemoryCalendarGateway, InMemorySolveRunRepository};
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use clap::Args;
use loop_autopilot::error::AppError;
use loop_autopilot::workflows::interview_loop::{
    BusyInterval, CandidateAvailabilityBlock, CommitStatus, InterviewerPool, InterviewerSchedule,
    LoopAutopilotService, LoopSessionTemplate, LoopSolveRequest, LoopSolveResult,
    SchedulingPolicy, SessionConstraints,
};
use std::sync::Arc;

const RECRUITER: &str = "maria.recruiter@example.com";
const ENGINEER_A: &str = "dev.engineer@example.com";
const ENGINEER_B: &str = "sam.engineer@example.com";
const MANAGER: &str = "lee.manager@example.com";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First interview day (YYYY-MM-DD). Defaults to tomorrow.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Candidate timezone used for display times.
    #[arg(long, default_value = "America/New_York")]
    pub(crate) timezone: String,
    /// Write the top-ranked solution to the in-memory calendar.
    #[arg(long)]
    pub(crate) commit: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        date,
        timezone,
        commit,
    } = args;

    let day = date.unwrap_or_else(|| Local::now().date_naive() + Duration::days(1));

    let calendar = Arc::new(InMemoryCalendarGateway::default());
    for schedule in seeded_schedules(day) {
        calendar.seed(schedule);
    }
    let service = LoopAutopilotService::new(
        Arc::new(InMemorySolveRunRepository::default()),
        calendar.clone(),
        SchedulingPolicy::default(),
    );

    println!("Loop autopilot demo");
    println!("Candidate timezone: {timezone}");
    let run = service.solve(&format!("demo-{day}"), sample_request(day, timezone))?;
    render_result(&run.result);

    if !commit {
        return Ok(());
    }

    let Some(best) = run.result.solutions.first() else {
        println!("\nNothing to commit");
        return Ok(());
    };
    let outcome = service.commit(run.solve_id(), &best.solution_id)?;
    match outcome.status {
        CommitStatus::Committed => {
            println!("\nCommitted {} to calendars", outcome.solution_id);
            for (event_id, draft) in calendar.events() {
                println!(
                    "  {} {} for {} ({} - {})",
                    event_id.0, draft.title, draft.interviewer_email, draft.start, draft.end
                );
            }
        }
        CommitStatus::RolledBack => {
            println!(
                "\nCommit rolled back: {}",
                outcome.failure.as_deref().unwrap_or("unknown failure")
            );
        }
    }

    Ok(())
}

fn render_result(result: &LoopSolveResult) {
    println!(
        "Solve {}: {} (confidence {:?})",
        result.solve_id,
        result.status.label(),
        result.confidence
    );
    println!(
        "Search: {} iterations, {} slots evaluated, {} ms",
        result.metadata.search_iterations,
        result.metadata.slots_evaluated,
        result.metadata.solve_duration_ms
    );

    for solution in &result.solutions {
        println!(
            "\n{} score {} | {}",
            solution.solution_id, solution.score, solution.rationale_summary
        );
        for session in &solution.sessions {
            println!(
                "  {} -> {}  {} with {}",
                session.display_start, session.display_end, session.name, session.interviewer_email
            );
        }
    }

    if !result.top_constraints.is_empty() {
        println!("\nBlocking constraints");
        for violation in &result.top_constraints {
            println!("- {:?}: {}", violation.key, violation.description);
        }
    }
    if !result.recommended_actions.is_empty() {
        println!("\nRecommended actions");
        for action in &result.recommended_actions {
            println!("- [p{}] {}", action.priority, action.description);
        }
    }
}

fn utc(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    day.and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

fn template(
    id: &str,
    order: u32,
    name: &str,
    duration_minutes: i64,
    gap: u32,
    pool: &[&str],
) -> LoopSessionTemplate {
    LoopSessionTemplate {
        id: id.to_string(),
        order,
        name: name.to_string(),
        duration_minutes,
        interviewer_pool: InterviewerPool {
            emails: pool.iter().map(|email| email.to_string()).collect(),
            required_count: 1,
        },
        constraints: SessionConstraints {
            min_gap_to_next_minutes: gap,
            ..SessionConstraints::default()
        },
    }
}

fn sample_request(day: NaiveDate, timezone: String) -> LoopSolveRequest {
    let next_day = day + Duration::days(1);

    LoopSolveRequest {
        sessions: vec![
            template("recruiter", 1, "Recruiter intro", 30, 15, &[RECRUITER]),
            template(
                "technical",
                2,
                "Technical deep dive",
                60,
                15,
                &[ENGINEER_A, ENGINEER_B],
            ),
            template("manager", 3, "Hiring manager chat", 45, 0, &[MANAGER]),
        ],
        candidate_blocks: vec![
            CandidateAvailabilityBlock {
                start_at: utc(day, 13, 0),
                end_at: utc(day, 17, 0),
            },
            CandidateAvailabilityBlock {
                start_at: utc(next_day, 14, 0),
                end_at: utc(next_day, 17, 0),
            },
        ],
        candidate_timezone: timezone,
        interviewer_schedules: Default::default(),
        existing_bookings: Vec::new(),
        policy: None,
    }
}

fn seeded_schedules(day: NaiveDate) -> Vec<InterviewerSchedule> {
    let busy = |email: &str, from: (u32, u32), to: (u32, u32)| InterviewerSchedule {
        email: email.to_string(),
        busy_intervals: vec![BusyInterval {
            start_at: utc(day, from.0, from.1),
            end_at: utc(day, to.0, to.1),
        }],
    };

    vec![
        busy(ENGINEER_A, (14, 0), (15, 0)),
        busy(MANAGER, (16, 0), (17, 0)),
    ]
}
