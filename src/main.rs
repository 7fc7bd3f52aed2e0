//! Binary entrypoint for the recall server.

use std::process::ExitCode;

use recall::start_server;

/// Load configuration from the environment and serve until Ctrl-C.
fn main() -> ExitCode {
    start_server::run()
}
