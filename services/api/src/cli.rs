use crate::demo::{run_demo, run_offline, DemoArgs, OfflineArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use frontline_support::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Frontline Support",
    about = "Run the citizen case processing service or exercise it from the command line",
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
    /// Process one sample case end to end and print its progress
    Demo(DemoArgs),
    /// Classify a case description with the degraded offline path
    Offline(OfflineArgs),
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
        Command::Demo(args) => run_demo(args).await,
        Command::Offline(args) => run_offline(args),
    }
}
