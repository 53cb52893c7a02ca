use std::process::ExitCode;

fn main() -> ExitCode {
    propmatch_cli::run()
}
