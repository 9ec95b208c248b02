use std::collections::HashSet;

use serde_json::json;

use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::routes::RouteEntry;
use crate::runtime::screens::{Surface, SurfaceError, SurfaceResult, ViewEngine};

const LOG_TARGET: &str = "kiosk::display.headless";

/// In-memory surface. Tracks how often it was asked to load and whether it
/// is currently the visible one.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    key: String,
    resource: String,
    visible: bool,
    load_count: u32,
    fail_load: bool,
}

impl HeadlessSurface {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn load_count(&self) -> u32 {
        self.load_count
    }
}

impl Surface for HeadlessSurface {
    fn begin_load(&mut self) -> SurfaceResult<()> {
        self.load_count += 1;
        if self.fail_load {
            return Err(SurfaceError::Load {
                key: self.key.clone(),
                reason: format!("cannot open {}", self.resource),
            });
        }
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// View engine with no output device. Only the latest presentation and a
/// running count are kept; the full history goes to the logger, if any.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    logger: Option<Logger>,
    last_presented: Option<String>,
    present_count: u64,
    failing: HashSet<String>,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Surfaces for these keys will report a load failure.
    pub fn failing_loads<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.failing.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Key of the most recent presentation.
    pub fn last_presented(&self) -> Option<&str> {
        self.last_presented.as_deref()
    }

    pub fn present_count(&self) -> u64 {
        self.present_count
    }
}

impl ViewEngine for HeadlessEngine {
    type Surface = HeadlessSurface;

    fn create_surface(&mut self, entry: &RouteEntry) -> HeadlessSurface {
        HeadlessSurface {
            key: entry.key.clone(),
            resource: entry.resource.clone(),
            visible: false,
            load_count: 0,
            fail_load: self.failing.contains(&entry.key),
        }
    }

    fn present(&mut self, key: &str, surface: &HeadlessSurface) -> SurfaceResult<()> {
        match self.last_presented.as_mut() {
            Some(last) => {
                last.clear();
                last.push_str(key);
            }
            None => self.last_presented = Some(key.to_string()),
        }
        self.present_count += 1;
        if let Some(logger) = self.logger.as_ref() {
            let event = event_with_fields(
                LogLevel::Debug,
                LOG_TARGET,
                "surface_presented",
                [
                    json_kv("key", json!(key)),
                    json_kv("resource", json!(surface.resource())),
                ],
            );
            let _ = logger.log_event(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;

    #[test]
    fn surfaces_start_hidden_and_unloaded() {
        let mut engine = HeadlessEngine::new();
        let surface = engine.create_surface(&RouteEntry::new("home", "https://a.example"));
        assert_eq!(surface.key(), "home");
        assert!(!surface.is_visible());
        assert_eq!(surface.load_count(), 0);
    }

    #[test]
    fn failing_keys_report_load_errors() {
        let mut engine = HeadlessEngine::new().failing_loads(["docs"]);
        let mut surface = engine.create_surface(&RouteEntry::new("docs", "https://b.example"));
        let err = surface.begin_load().unwrap_err();
        assert!(err.to_string().contains("docs"));
        assert_eq!(surface.load_count(), 1);
    }

    #[test]
    fn present_is_recorded_and_logged() {
        let sink = MemorySink::new();
        let mut engine = HeadlessEngine::new().with_logger(Some(Logger::new(sink.clone())));
        let surface = engine.create_surface(&RouteEntry::new("home", "https://a.example"));
        engine.present("home", &surface).unwrap();

        assert_eq!(engine.last_presented(), Some("home"));
        assert_eq!(engine.present_count(), 1);
        assert_eq!(sink.messages(LOG_TARGET), vec!["surface_presented"]);
    }

    #[test]
    fn repeated_presents_keep_only_the_latest_key() {
        let mut engine = HeadlessEngine::new();
        let home = engine.create_surface(&RouteEntry::new("home", "https://a.example"));
        let docs = engine.create_surface(&RouteEntry::new("docs", "https://b.example"));
        for n in 0..200_000u32 {
            if n % 2 == 0 {
                engine.present("docs", &docs).unwrap();
            } else {
                engine.present("home", &home).unwrap();
            }
        }

        assert_eq!(engine.present_count(), 200_000);
        assert_eq!(engine.last_presented(), Some("home"));
        let last = engine.last_presented.as_ref().unwrap();
        assert!(last.capacity() <= "home".len().max("docs".len()));
    }
}
