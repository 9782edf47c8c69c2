use std::process::ExitCode;

fn main() -> ExitCode {
    carsellmax_cli::run()
}
