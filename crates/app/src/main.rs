mod args;
mod op;
mod ops;
mod state;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Grant, Identity, Init, Ls, Register, Retrieve, Share, Submit};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

command_enum! {
    (Init, Init),
    (Identity, Identity),
    (Register, Register),
    (Submit, Submit),
    (Retrieve, Retrieve),
    (Share, Share),
    (Grant, Grant),
    (Ls, Ls),
}

/// Logs go to stderr so command output on stdout stays clean.
/// The returned guard must be kept alive for the duration of the program.
fn init_logging(level: tracing::Level) -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();
    guard
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // `init` runs before any config exists
    let level = state::AppState::load(args.config_path.clone())
        .map(|state| state.config.log_level())
        .unwrap_or(tracing::Level::WARN);
    let _guard = init_logging(level);

    let ctx = op::OpContext::new(args.config_path, args.identity);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            drop(_guard);
            std::process::exit(1);
        }
    }
}
