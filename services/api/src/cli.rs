use crate::demo::{run_catalog_listing, run_demo, run_seat_plan, CatalogArgs, DemoArgs, PlanArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use sipu_exams::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "SIPU Exams",
    about = "Distribute admission exam seats and record grades from the command line",
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
    /// Work with seat distributions built from CSV exports
    Seats {
        #[command(subcommand)]
        command: SeatsCommand,
    },
    /// Run a self-contained distribution and grading walkthrough
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum SeatsCommand {
    /// Print the seat plan an exam session would receive
    Plan(PlanArgs),
    /// List laboratories and seat capacity per site
    Catalog(CatalogArgs),
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

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Seats { command } => match command {
            SeatsCommand::Plan(args) => run_seat_plan(args),
            SeatsCommand::Catalog(args) => run_catalog_listing(args),
        },
        Command::Demo(args) => run_demo(args),
    }
}
