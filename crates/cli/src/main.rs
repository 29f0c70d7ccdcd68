use std::process::ExitCode;

fn main() -> ExitCode {
    paybot_cli::run()
}
