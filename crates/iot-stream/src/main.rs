mod runtime;

use std::process::ExitCode;

fn main() -> ExitCode {
    match runtime::run_from_args() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("iot-stream: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
