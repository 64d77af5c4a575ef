use std::process::ExitCode;

fn main() -> ExitCode {
    liquida_cli::run()
}
