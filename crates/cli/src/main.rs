use std::process::ExitCode;

fn main() -> ExitCode {
    banklens_cli::run()
}
