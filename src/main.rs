use clap::Parser;
use pagecharm::cdp::ChromeLauncher;
use pagecharm::cli::{self, Args};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_logging(default_filter: &str) {
    // stdout may carry the artifact, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(cli::EXIT_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(args.log_filter());

    let mut stderr = std::io::stderr();
    ExitCode::from(cli::run(args, ChromeLauncher, &mut stderr))
}
