use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use kiosk_switcher::logging::{event_with_fields, json_kv};
use kiosk_switcher::{
    ActiveState, ControlPlane, ControlServer, DisplayConfig, DisplayController, HeadlessEngine,
    KioskArgs, KioskError, LogLevel, Logger, Result, TerminalDriver, TerminalEngine, switch_bus,
};

fn main() -> ExitCode {
    let args = KioskArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("kiosk-switcher: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: KioskArgs) -> Result<()> {
    let routes = Arc::new(args.route_table()?);
    let logger = args.logger()?;

    let active = ActiveState::new(routes.default_key());
    let (bus, consumer) = switch_bus();
    let plane = ControlPlane::new(Arc::clone(&routes), bus.clone(), active.reader())
        .with_logger(logger.clone());

    let addr = args.api_addr();
    let server = ControlServer::bind(&addr)
        .map_err(|source| KioskError::Bind {
            addr: addr.clone(),
            source,
        })?
        .with_logger(logger.clone());

    log_startup(logger.as_ref(), &args, routes.len());

    let mut config = DisplayConfig {
        logger: logger.clone(),
        ..DisplayConfig::default()
    };
    config.enable_metrics();

    if args.headless {
        let engine = HeadlessEngine::new().with_logger(logger);
        let mut controller = DisplayController::new(engine, active).with_config(config);
        controller.initialize(&routes);
        server.spawn(plane, bus)?;
        controller.run(&consumer);
        return Ok(());
    }

    let settings = args.terminal_settings();
    let engine = TerminalEngine::new(io::stdout(), settings.clone()).with_route_hint(&routes);
    let controller = DisplayController::new(engine, active).with_config(config);
    TerminalDriver::new(controller, bus.clone(), settings).run(&routes, &consumer, move || {
        server.spawn(plane, bus)?;
        Ok(())
    })
}

fn log_startup(logger: Option<&Logger>, args: &KioskArgs, route_count: usize) {
    if let Some(logger) = logger {
        let event = event_with_fields(
            LogLevel::Info,
            "kiosk::startup",
            "starting",
            [
                json_kv("api", json!(args.api_addr())),
                json_kv("routes", json!(route_count)),
                json_kv("headless", json!(args.headless)),
                json_kv("kiosk", json!(args.kiosk)),
            ],
        );
        let _ = logger.log_event(event);
    }
}
