use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::thread::{self, JoinHandle};

use serde_json::json;

use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::runtime::bus::SwitchBus;

use super::{ControlPlane, router};

const LOG_TARGET: &str = "kiosk::control.server";
const WORKER_THREADS: usize = 8;

/// Control-plane listener. Binding happens on the caller's thread so a bad
/// address fails startup; serving happens on a dedicated thread that owns a
/// tokio runtime.
#[derive(Debug)]
pub struct ControlServer {
    listener: TcpListener,
    logger: Option<Logger>,
}

impl ControlServer {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: Option<Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve `plane` until ctrl-c. Ctrl-c also shuts down `bus`, which ends
    /// the display loop.
    pub fn spawn(self, plane: ControlPlane, bus: SwitchBus) -> io::Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("control-plane-worker")
            .enable_all()
            .build()?;
        let addr = self.local_addr()?;

        thread::Builder::new()
            .name("control-plane".to_string())
            .spawn(move || {
                self.log(
                    LogLevel::Info,
                    "server_started",
                    [json_kv("addr", json!(addr.to_string()))],
                );
                let logger = self.logger.clone();
                let result = runtime.block_on(serve(self.listener, plane, bus));
                if let (Err(err), Some(logger)) = (result, logger.as_ref()) {
                    let event = event_with_fields(
                        LogLevel::Error,
                        LOG_TARGET,
                        "server_failed",
                        [json_kv("error", json!(err.to_string()))],
                    );
                    let _ = logger.log_event(event);
                }
            })
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, LOG_TARGET, message, fields));
        }
    }
}

async fn serve(listener: TcpListener, plane: ControlPlane, bus: SwitchBus) -> io::Result<()> {
    let listener = tokio::net::TcpListener::from_std(listener)?;
    axum::serve(listener, router(plane))
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                bus.shutdown();
            }
        })
        .await
}
