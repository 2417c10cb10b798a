use std::process::ExitCode;

fn main() -> ExitCode {
    pricescout_cli::run()
}
