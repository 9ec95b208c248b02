//! Display-thread runtime: the controller that owns every surface and the
//! loop that drains the switch bus.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;

use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::SwitchMetrics;
use crate::routes::RouteTable;

pub mod bus;
pub mod driver;
pub mod screens;
pub mod shared_state;

use bus::{SwitchCommand, SwitchConsumer};
use screens::{ViewEngine, ViewPool};
use shared_state::{ActiveReader, ActiveState};

const LOG_TARGET: &str = "kiosk::display";

/// Configuration knobs for the display controller.
#[derive(Clone)]
pub struct DisplayConfig {
    /// Optional structured logger.
    pub logger: Option<Logger>,
    /// Switch counters, shared so other threads may snapshot them.
    pub metrics: Option<Arc<Mutex<SwitchMetrics>>>,
    /// Target field used when emitting the metrics snapshot.
    pub metrics_target: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics: None,
            metrics_target: "kiosk::display.metrics".to_string(),
        }
    }
}

impl DisplayConfig {
    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(SwitchMetrics::new())));
        }
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<SwitchMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Ready,
}

/// What a single switch command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Applied,
    AlreadyActive,
    UnknownKey,
    NotReady,
}

/// Sole owner of the view pool and sole writer of the active key.
///
/// Lives on the display thread. Other threads reach it only through the
/// switch bus and observe it only through an [`ActiveReader`].
pub struct DisplayController<E: ViewEngine> {
    engine: E,
    pool: ViewPool<E::Surface>,
    active: ActiveState,
    state: ControllerState,
    config: DisplayConfig,
    started_at: Option<Instant>,
}

impl<E: ViewEngine> DisplayController<E> {
    pub fn new(engine: E, active: ActiveState) -> Self {
        Self {
            engine,
            pool: ViewPool::new(),
            active,
            state: ControllerState::Uninitialized,
            config: DisplayConfig::default(),
            started_at: None,
        }
    }

    pub fn with_config(mut self, config: DisplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_mut(&mut self) -> &mut DisplayConfig {
        &mut self.config
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn active_reader(&self) -> ActiveReader {
        self.active.reader()
    }

    pub fn pool(&self) -> &ViewPool<E::Surface> {
        &self.pool
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Create one surface per route, start every load, show the default
    /// route and move to [`ControllerState::Ready`]. Runs once; later calls
    /// are ignored.
    pub fn initialize(&mut self, routes: &RouteTable) {
        if self.state == ControllerState::Ready {
            self.log(LogLevel::Warn, "initialize_ignored", std::iter::empty());
            return;
        }

        for entry in routes.entries() {
            let surface = self.engine.create_surface(entry);
            if let Err(err) = self.pool.insert(&entry.key, surface) {
                self.record(SwitchMetrics::record_load_failure);
                self.log(
                    LogLevel::Warn,
                    "surface_load_failed",
                    [
                        json_kv("key", json!(entry.key)),
                        json_kv("error", json!(err.to_string())),
                    ],
                );
            }
        }

        let default_key = routes.default_key();
        self.pool.show(default_key);
        self.active.write(default_key);
        self.present(default_key);

        self.state = ControllerState::Ready;
        self.started_at = Some(Instant::now());
        self.log(
            LogLevel::Info,
            "display_ready",
            [
                json_kv("surfaces", json!(self.pool.len())),
                json_kv("active", json!(default_key)),
            ],
        );
    }

    /// Drain the bus until it is shut down. Commands are applied one at a
    /// time, in the order they were enqueued.
    pub fn run(&mut self, consumer: &SwitchConsumer) {
        while let Some(command) = consumer.recv() {
            self.handle_command(command);
        }
        self.finalize();
    }

    /// Apply every command currently queued without waiting for more.
    /// Returns the number of commands handled.
    pub fn drain_pending(&mut self, consumer: &SwitchConsumer) -> usize {
        let mut handled = 0;
        while let Some(command) = consumer.try_recv() {
            self.handle_command(command);
            handled += 1;
        }
        handled
    }

    fn handle_command(&mut self, command: SwitchCommand) {
        self.record(SwitchMetrics::record_received);
        match self.apply_switch(command.key()) {
            SwitchOutcome::Applied => self.record(SwitchMetrics::record_applied),
            SwitchOutcome::AlreadyActive => self.record(SwitchMetrics::record_redundant),
            SwitchOutcome::UnknownKey | SwitchOutcome::NotReady => {
                self.record(SwitchMetrics::record_dropped);
                self.log(
                    LogLevel::Warn,
                    "command_dropped",
                    [json_kv("key", json!(command.key()))],
                );
            }
        }
    }

    /// Make `key` the sole visible surface, then publish it as the active
    /// key. Unknown keys and calls before initialisation change nothing.
    pub(crate) fn apply_switch(&mut self, key: &str) -> SwitchOutcome {
        if self.state == ControllerState::Uninitialized {
            return SwitchOutcome::NotReady;
        }
        if !self.pool.contains(key) {
            return SwitchOutcome::UnknownKey;
        }
        if self.pool.visible_key() == Some(key) {
            return SwitchOutcome::AlreadyActive;
        }

        let previous = self.pool.visible_key().map(str::to_string);
        self.pool.show(key);
        self.active.write(key);
        self.present(key);
        self.log(
            LogLevel::Info,
            "switch_applied",
            [
                json_kv("key", json!(key)),
                json_kv("previous", json!(previous)),
            ],
        );
        SwitchOutcome::Applied
    }

    fn present(&mut self, key: &str) {
        let result = match self.pool.visible_surface() {
            Some(surface) => self.engine.present(key, surface),
            None => return,
        };
        if let Err(err) = result {
            self.log(
                LogLevel::Warn,
                "present_failed",
                [
                    json_kv("key", json!(key)),
                    json_kv("error", json!(err.to_string())),
                ],
            );
        }
    }

    fn finalize(&mut self) {
        let uptime = self
            .started_at
            .map(|start| start.elapsed())
            .unwrap_or_default();
        self.log(
            LogLevel::Info,
            "display_stopped",
            [
                json_kv("uptime_ms", json!(uptime.as_millis() as u64)),
                json_kv("active", json!(self.active.read())),
            ],
        );

        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let target = self.config.metrics_target.as_str();
                let _ = logger.log_event(guard.snapshot(uptime).to_log_event(target));
            }
        }
    }

    fn record(&self, update: fn(&mut SwitchMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, LOG_TARGET, message, fields);
            let _ = logger.log_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;
    use crate::runtime::bus::switch_bus;
    use crate::runtime::driver::headless::HeadlessEngine;
    use std::thread;
    use std::time::Duration;

    fn routes() -> RouteTable {
        RouteTable::from_entries([
            ("home", "https://a.example"),
            ("docs", "https://b.example"),
            ("news", "https://c.example"),
        ])
        .expect("routes")
    }

    fn controller() -> DisplayController<HeadlessEngine> {
        let routes = routes();
        let mut controller =
            DisplayController::new(HeadlessEngine::new(), ActiveState::new(routes.default_key()));
        controller.config_mut().enable_metrics();
        controller.initialize(&routes);
        controller
    }

    fn load_counts(controller: &DisplayController<HeadlessEngine>) -> Vec<u32> {
        controller
            .pool()
            .entries()
            .iter()
            .map(|entry| entry.surface().load_count())
            .collect()
    }

    #[test]
    fn switches_are_ignored_before_initialize() {
        let mut controller =
            DisplayController::new(HeadlessEngine::new(), ActiveState::new("home"));
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert_eq!(controller.apply_switch("docs"), SwitchOutcome::NotReady);
        assert_eq!(controller.active_reader().read(), "home");
        assert!(controller.pool().is_empty());
    }

    #[test]
    fn initialize_preloads_everything_and_shows_default() {
        let controller = controller();
        assert_eq!(controller.state(), ControllerState::Ready);
        assert_eq!(controller.pool().len(), 3);
        assert!(controller.pool().entries().iter().all(|entry| entry.loaded()));
        assert_eq!(controller.pool().visible_key(), Some("home"));
        assert_eq!(controller.pool().visible_count(), 1);
        assert_eq!(controller.active_reader().read(), "home");
        assert_eq!(controller.engine().last_presented(), Some("home"));
        assert_eq!(controller.engine().present_count(), 1);
    }

    #[test]
    fn second_initialize_does_not_rebuild_the_pool() {
        let mut controller = controller();
        controller.apply_switch("docs");
        controller.initialize(&routes());
        assert_eq!(controller.pool().len(), 3);
        assert_eq!(load_counts(&controller), vec![1, 1, 1]);
        assert_eq!(controller.active_reader().read(), "docs");
    }

    #[test]
    fn apply_switch_moves_visibility_and_state_together() {
        let mut controller = controller();
        let reader = controller.active_reader();

        assert_eq!(controller.apply_switch("docs"), SwitchOutcome::Applied);
        assert_eq!(reader.read(), "docs");
        assert_eq!(controller.pool().visible_key(), Some("docs"));
        assert_eq!(controller.pool().visible_count(), 1);

        assert_eq!(controller.apply_switch("docs"), SwitchOutcome::AlreadyActive);
        assert_eq!(controller.apply_switch("missing"), SwitchOutcome::UnknownKey);
        assert_eq!(reader.read(), "docs");
        assert_eq!(controller.pool().visible_count(), 1);
    }

    #[test]
    fn switching_never_reloads_a_surface() {
        let mut controller = controller();
        for key in ["docs", "news", "home", "news", "docs", "home"] {
            controller.apply_switch(key);
            assert_eq!(controller.pool().visible_count(), 1);
        }
        assert_eq!(load_counts(&controller), vec![1, 1, 1]);
    }

    #[test]
    fn drained_commands_apply_in_order() {
        let sink = MemorySink::new();
        let mut controller = controller();
        controller.config_mut().logger = Some(Logger::new(sink.clone()));
        let (bus, consumer) = switch_bus();
        bus.submit("docs");
        bus.submit("news");
        bus.submit("home");

        assert_eq!(controller.drain_pending(&consumer), 3);
        let applied: Vec<String> = sink
            .events()
            .into_iter()
            .filter(|event| event.message == "switch_applied")
            .filter_map(|event| event.fields.get("key")?.as_str().map(str::to_string))
            .collect();
        assert_eq!(applied, vec!["docs", "news", "home"]);
        assert_eq!(controller.engine().present_count(), 4);
        assert_eq!(controller.engine().last_presented(), Some("home"));
        assert_eq!(controller.active_reader().read(), "home");
    }

    #[test]
    fn long_switch_runs_keep_engine_state_bounded() {
        let routes = RouteTable::from_entries([
            ("home", "https://a.example"),
            ("docs", "https://b.example"),
        ])
        .expect("routes");
        let mut controller =
            DisplayController::new(HeadlessEngine::new(), ActiveState::new(routes.default_key()));
        controller.initialize(&routes);
        let (bus, consumer) = switch_bus();
        for n in 0..200_000 {
            bus.submit(if n % 2 == 0 { "docs" } else { "home" });
        }

        assert_eq!(controller.drain_pending(&consumer), 200_000);
        assert_eq!(controller.engine().present_count(), 200_001);
        assert_eq!(controller.engine().last_presented(), Some("home"));
        assert_eq!(controller.active_reader().read(), "home");
    }

    #[test]
    fn unknown_commands_are_dropped_and_logged() {
        let sink = MemorySink::new();
        let mut controller = controller();
        controller.config_mut().logger = Some(Logger::new(sink.clone()));
        let (bus, consumer) = switch_bus();
        bus.submit("missing");
        bus.submit("docs");

        controller.drain_pending(&consumer);

        assert_eq!(controller.active_reader().read(), "docs");
        assert_eq!(
            sink.messages(LOG_TARGET),
            vec!["command_dropped", "switch_applied"]
        );
        let metrics = controller.config_mut().metrics_handle().expect("metrics");
        let snapshot = metrics.lock().unwrap().snapshot(Duration::ZERO);
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.applied, 1);
        assert_eq!(snapshot.dropped, 1);
    }

    #[test]
    fn failed_loads_stay_switchable() {
        let routes = routes();
        let engine = HeadlessEngine::new().failing_loads(["news"]);
        let mut controller = DisplayController::new(engine, ActiveState::new("home"));
        controller.config_mut().enable_metrics();
        controller.initialize(&routes);

        assert!(!controller.pool().get("news").unwrap().loaded());
        assert_eq!(controller.apply_switch("news"), SwitchOutcome::Applied);
        assert_eq!(controller.active_reader().read(), "news");

        let metrics = controller.config_mut().metrics_handle().unwrap();
        assert_eq!(metrics.lock().unwrap().snapshot(Duration::ZERO).load_failures, 1);
    }

    #[test]
    fn submitted_key_eventually_becomes_active() {
        let routes = routes();
        let mut controller =
            DisplayController::new(HeadlessEngine::new(), ActiveState::new(routes.default_key()));
        controller.initialize(&routes);
        let reader = controller.active_reader();
        let (bus, consumer) = switch_bus();

        let display = thread::spawn(move || {
            controller.run(&consumer);
            controller
        });

        bus.submit("news");
        let deadline = Instant::now() + Duration::from_secs(2);
        while reader.read() != "news" {
            assert!(Instant::now() < deadline, "switch never applied");
            thread::sleep(Duration::from_millis(1));
        }

        bus.shutdown();
        let controller = display.join().expect("display thread");
        assert_eq!(reader.read(), "news");
        assert_eq!(controller.pool().visible_key(), Some("news"));
    }

    #[test]
    fn concurrent_submits_settle_on_the_last_applied_key() {
        let keys: Vec<String> = (0..16).map(|n| format!("page{n}")).collect();
        let routes =
            RouteTable::from_entries(keys.iter().map(|k| (k.clone(), format!("https://{k}"))))
                .expect("routes");
        let mut controller =
            DisplayController::new(HeadlessEngine::new(), ActiveState::new(routes.default_key()));
        controller.initialize(&routes);
        let reader = controller.active_reader();
        let (bus, consumer) = switch_bus();

        let display = thread::spawn(move || {
            controller.run(&consumer);
            controller
        });

        let producers: Vec<_> = keys
            .iter()
            .skip(1)
            .cloned()
            .map(|key| {
                let bus = bus.clone();
                let reader = reader.clone();
                thread::spawn(move || {
                    bus.submit(key);
                    let seen = reader.read();
                    assert!(seen.starts_with("page"), "unexpected key {seen}");
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer");
        }
        bus.shutdown();

        let controller = display.join().expect("display thread");
        let last = controller
            .engine()
            .last_presented()
            .map(str::to_string)
            .expect("presented");
        let active = reader.read();
        assert_eq!(active, last);
        assert!(keys[1..].contains(&active));
        assert_eq!(controller.pool().visible_count(), 1);
        assert!(controller.pool().entries().iter().all(|e| e.surface().load_count() == 1));
    }
}
