use std::process::ExitCode;

fn main() -> ExitCode {
    yaruki_cli::run()
}
