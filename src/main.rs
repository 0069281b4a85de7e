use std::process::ExitCode;

fn main() -> ExitCode {
    match clickcast::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("clickcast: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
