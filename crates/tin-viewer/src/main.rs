use std::process::ExitCode;

use anyhow::Context;
use tin_engine::logging::{init_logging, LoggingConfig};
use tin_engine::window::{Runtime, RuntimeConfig};

fn run() -> anyhow::Result<i32> {
    let config = RuntimeConfig {
        title: "tin viewer".to_string(),
        ..RuntimeConfig::default()
    };

    log::info!(
        "starting {}x{} window, {}x MSAA",
        config.device.width,
        config.device.height,
        config.device.sample_count
    );

    Runtime::run(config).context("viewer failed")
}

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    match run() {
        Ok(code) => {
            log::info!("exiting with code {code}");
            ExitCode::from(code.clamp(0, 255) as u8)
        }
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
