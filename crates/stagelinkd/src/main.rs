//! Development binary: serves the in-memory stub song over the command
//! socket so clients can be exercised without the real host application.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};

use stagelink_config::Config;
use stagelinkd::{CommandServer, StubSong, TickScheduler, telemetry};

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);
const STUB_TICK: Duration = Duration::from_millis(10);

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = telemetry::initialise(&config) {
        eprintln!("failed to initialise telemetry: {error}");
        return ExitCode::FAILURE;
    }

    let scheduler = match TickScheduler::start(STUB_TICK) {
        Ok(scheduler) => Arc::new(scheduler),
        Err(error) => {
            tracing::error!(%error, "failed to start stub scheduler");
            return ExitCode::FAILURE;
        }
    };

    let server = CommandServer::new(config, Arc::new(StubSong::demo()), scheduler);
    if let Err(error) = server.start() {
        tracing::error!(%error, "failed to start command server");
        return ExitCode::FAILURE;
    }

    let term = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(error) = signal_hook::flag::register(signal, Arc::clone(&term)) {
            tracing::warn!(%error, signal, "failed to register signal handler");
        }
    }

    while !term.load(Ordering::SeqCst) {
        thread::sleep(SHUTDOWN_POLL);
    }

    tracing::info!("shutdown requested");
    match server.stop() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "failed to stop command server");
            ExitCode::FAILURE
        }
    }
}
