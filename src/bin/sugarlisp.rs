use std::process::ExitCode;

fn main() -> ExitCode {
    sugarlisp::cli::run()
}
