//! gifcap headless runner.
//!
//! Records the top-left 320x240 pixels for 2.2 seconds, converts the
//! recording to a GIF and puts it on the clipboard.

use std::process::ExitCode;

use anyhow::Context;
use crossbeam_channel::Receiver;
use tracing::{error, info};

use gifcap_capture::enable_dpi_awareness;
use gifcap_engine::{AppContext, Engine};
use gifcap_ipc::{event_channel, EngineEvent};
use gifcap_lib::{
    drain_events, init_logging, install_panic_hook, run_scenario, LogHandle, Scenario,
    ScenarioResult,
};

fn setup(logging: &LogHandle) -> anyhow::Result<(Engine, Receiver<EngineEvent>)> {
    let context = AppContext::load().context("failed to load configuration")?;
    let log_file = logging.attach_file(&context.layout().log_dir())?;
    info!(
        root = %context.layout().root().display(),
        log = %log_file.display(),
        "gifcap starting"
    );

    // Must precede any monitor query.
    enable_dpi_awareness();

    let (event_tx, event_rx) = event_channel();
    Ok((Engine::new(context, event_tx), event_rx))
}

fn main() -> ExitCode {
    let logging = match init_logging() {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("gifcap: {:#}", e);
            return ExitCode::from(2);
        }
    };
    install_panic_hook();

    let (engine, events) = match setup(&logging) {
        Ok(setup) => setup,
        Err(e) => {
            error!("Setup failed: {:#}", e);
            return ExitCode::from(2);
        }
    };

    let result = run_scenario(&engine, &Scenario::default());
    drain_events(&events);

    match &result {
        ScenarioResult::Completed(outcome) => {
            if let Some(gif) = &outcome.gif {
                info!(gif = %gif.display(), "Done");
            }
        }
        ScenarioResult::Failed { stage, .. } => error!(stage, "Scenario failed"),
    }
    ExitCode::from(result.exit_code())
}
