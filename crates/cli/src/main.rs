use std::process::ExitCode;

fn main() -> ExitCode {
    loamdesk_cli::run()
}
