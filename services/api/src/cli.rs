use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use loop_autopilot::config::AppConfig;
use loop_autopilot::error::AppError;
use loop_autopilot::workflows::interview_loop::{LoopAutopilotSolver, LoopSolveRequest};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Loop Autopilot",
    about = "Schedule interview loops from the command line or over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Solve a loop request read from a JSON file and print the result
    Solve(SolveArgs),
    /// Schedule a sample three-session loop against in-memory calendars
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct SolveArgs {
    /// Path to a solve request in JSON, or `-` for stdin
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Pretty-print the JSON result
    #[arg(long)]
    pub(crate) pretty: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Solve(args) => run_solve(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_solve(args: SolveArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;

    let raw = if args.input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)?
    };

    let request: LoopSolveRequest = serde_json::from_str(&raw)?;
    let result = LoopAutopilotSolver::new(config.solver).solve(&request);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{rendered}");

    Ok(())
}
