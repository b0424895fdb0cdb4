use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use dealdesk::error::AppError;
use dealdesk::workflows::sla::SweepJob;

#[derive(Parser, Debug)]
#[command(
    name = "Deal Desk",
    about = "Run and demonstrate the invoice-financing deal desk from the command line",
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
    /// List the scheduled sweeps and their cadence
    Jobs,
    /// Walk one deal from seller onboarding to settlement against in-memory stores
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
    /// Serve without the background sweep scheduler
    #[arg(long)]
    pub(crate) no_scheduler: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Jobs => {
            list_jobs();
            Ok(())
        }
        Command::Demo(args) => run_demo(args),
    }
}

fn list_jobs() {
    println!("{:<24} {:<10} INTERVAL", "JOB", "SCHEDULE");
    for job in SweepJob::ALL {
        println!(
            "{:<24} {:<10} {}s",
            job.name(),
            job.schedule(),
            job.interval().as_secs()
        );
    }
}
