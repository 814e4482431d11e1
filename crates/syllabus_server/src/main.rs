use std::process::ExitCode;

use syllabus_server::config::Config;
use syllabus_server::start_server;

#[tokio::main]
async fn main() -> ExitCode {
    let result = match Config::from_env() {
        Ok(config) => start_server(config).await,
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("syllabus-server: {err}");
            ExitCode::FAILURE
        }
    }
}
