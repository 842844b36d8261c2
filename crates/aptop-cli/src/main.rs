mod cli;

use aptop_core::{failure, logging};

fn main() {
    let cli = cli::parse();

    // Logging is best effort: the monitor works without a log file.
    let log_guard = logging::init().ok();
    logging::install_panic_hook();

    let code = match cli::run(cli) {
        Ok(()) => 0,
        Err(e) if failure::is_ignorable(&e) => {
            tracing::debug!(error = %format!("{e:#}"), "ignoring teardown failure");
            0
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "aptop failed");
            eprintln!("{e:#}"); // pretty anyhow chain
            1
        }
    };

    // Flush buffered log lines; process::exit skips destructors.
    drop(log_guard);
    std::process::exit(code);
}
