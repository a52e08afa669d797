use std::process::ExitCode;

use netspeed_overlay::error::AppError;
use netspeed_overlay::platform::{self, NativeOverlay};
use netspeed_overlay::runtime::{self, Schedule};
use netspeed_overlay::{
    NetSpeedOverlay, OverlaySettings, RateSampler, SysinfoCounters, TopmostEnforcer, logging,
};
use tracing::{error, info};

fn main() -> ExitCode {
    let _log_guard = logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, source = ?std::error::Error::source(&e), "Overlay failed to start");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let settings = OverlaySettings::load();
    settings.validate()?;
    let schedule = Schedule::from_settings(&settings);

    // Window creation and the event loop stay on the main thread
    let monitors = platform::get_all_monitors();
    let mut overlay = NetSpeedOverlay::<NativeOverlay>::new(settings, &monitors)?;
    let mut sampler = RateSampler::new(SysinfoCounters::new()?, schedule.sample)?;
    let mut enforcer = TopmostEnforcer::new();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let reason = rt.block_on(runtime::run(
        &mut overlay,
        &mut sampler,
        &mut enforcer,
        schedule,
        shutdown,
    ));
    info!(?reason, "Exiting");
    Ok(())
}
