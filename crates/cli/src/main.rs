use std::process::ExitCode;

fn main() -> ExitCode {
    reviewdesk_cli::run()
}
