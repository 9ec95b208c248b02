//! Kiosk page switcher.
//!
//! A set of named pages is preloaded into surfaces owned by a single display
//! thread. An HTTP control plane running on its own worker pool switches the
//! visible page by submitting commands to a switch bus that the display
//! thread drains in order; the currently visible key is published through a
//! shared cell any thread may read.

pub mod config;
pub mod control;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod runtime;

pub use config::{ConfigError, ConfigResult, KioskArgs, load_routes, parse_routes};
pub use control::{ControlError, ControlPlane, ControlServer, router};
pub use error::{KioskError, Result};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink, StderrSink,
};
pub use metrics::{MetricSnapshot, SwitchMetrics};
pub use routes::{RouteEntry, RouteError, RouteTable};
pub use runtime::bus::{SwitchBus, SwitchCommand, SwitchConsumer, switch_bus};
pub use runtime::driver::headless::{HeadlessEngine, HeadlessSurface};
pub use runtime::driver::terminal::{
    TerminalDriver, TerminalEngine, TerminalSettings, TerminalSurface,
};
pub use runtime::screens::{
    Surface, SurfaceError, SurfaceResult, ViewEngine, ViewPool, ViewPoolEntry,
};
pub use runtime::shared_state::{ActiveReader, ActiveState};
pub use runtime::{ControllerState, DisplayConfig, DisplayController, SwitchOutcome};
