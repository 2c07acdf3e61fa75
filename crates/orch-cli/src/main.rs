mod args;
mod error;
mod output;
mod run;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::{Cli, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let work = tokio::task::spawn_blocking(move || {
        let Command::Run(run_args) = cli.command.clone();
        run::handle(cli, run_args)
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                run_to_completion(work).await;
                return;
            }
        };

        tokio::select! {
            result = work => finish(result),
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted");
                std::process::exit(130);
            }
            _ = sigterm.recv() => {
                eprintln!("terminated");
                std::process::exit(143);
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = work => finish(result),
            _ = tokio::signal::ctrl_c() => {
                eprintln!("interrupted");
                std::process::exit(130);
            }
        }
    }
}

#[cfg(unix)]
async fn run_to_completion(work: tokio::task::JoinHandle<Result<(), error::Error>>) {
    finish(work.await);
}

fn finish(result: Result<Result<(), error::Error>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => std::process::exit(0),
        Ok(Err(err)) => {
            eprintln!("Error: {err}");
            std::process::exit(err.exit_code());
        }
        Err(join_err) => {
            eprintln!("Error: worker task failed: {join_err}");
            std::process::exit(1);
        }
    }
}
