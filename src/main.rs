// src/main.rs

use tasksmith::{cli, logging};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("tasksmith error: {err:?}");
        std::process::exit(1);
    }

    // Operator interrupt is an unrecoverable abort: host mutations are
    // irreversible, so there is no graceful mid-action cancellation.
    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        tracing::error!("interrupted by operator; aborting provisioning");
        std::process::exit(1);
    });

    // The engine itself is synchronous and single-threaded by design; run it
    // off the reactor thread.
    let result = tokio::task::spawn_blocking(move || tasksmith::run(args)).await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::error!(error = %err, "fatal provisioning error");
            eprintln!("tasksmith error: {err}");
            std::process::exit(1);
        }
        Err(join_err) => {
            eprintln!("tasksmith error: {join_err}");
            std::process::exit(1);
        }
    }
}
