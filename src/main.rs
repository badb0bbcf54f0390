//! Binary entrypoint for the `tasksync` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    match tasksync::run(std::env::args_os()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tasksync: {err}");
            ExitCode::FAILURE
        }
    }
}
