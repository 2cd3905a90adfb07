// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! This module runs and manages the background tasks of the endpoint:
//!
//! - Modbus TCP server, serving every unit of the shared register store
//! - System health monitoring (heartbeat)
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbus_endpoint::{config::Config, daemon::launch_daemon::Daemon};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Later, trigger a graceful shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_modbus::server::tcp::Server;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::modbus::{ClientStream, ConnectionLimiter, RegisterModbusServer, RequestDispatcher};
use crate::store::RegisterStore;

/// How often background tasks check the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Interval between two heartbeat log lines
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for the accept loop and client sessions to stop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a daemon task manager that coordinates the endpoint's services
///
/// # Thread Safety
///
/// The `running` flag is shared with every task. Each task checks it
/// periodically to decide whether to continue or terminate. Client sessions
/// run in tasks spawned by `tokio-modbus`; they watch the `sessions` token
/// instead and stop reading as soon as it is cancelled.
///
/// The register store is allocated by [`Daemon::launch`] and shared by all
/// client connections.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    sessions: CancellationToken,
    store: Option<Arc<RegisterStore>>,
    modbus_addr: Option<SocketAddr>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            sessions: CancellationToken::new(),
            store: None,
            modbus_addr: None,
        }
    }

    /// Launch all configured tasks based on configuration
    ///
    /// Allocates the register store, starts the Modbus server if
    /// `config.modbus.enabled` is `true`, and starts the heartbeat.
    ///
    /// # Errors
    ///
    /// Fails if the configured address cannot be parsed or bound.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let store = Arc::new(RegisterStore::new(config.store.layout()));
        self.store = Some(Arc::clone(&store));

        if config.modbus.enabled {
            self.start_modbus_server(config, store).await?;
        } else {
            info!("Modbus server disabled in configuration");
        }

        self.start_heartbeat()?;

        Ok(())
    }

    /// The register store shared by all connections, once launched
    pub fn store(&self) -> Option<Arc<RegisterStore>> {
        self.store.clone()
    }

    /// Address the Modbus server is bound to, once launched
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.modbus_addr
    }

    /// Launch the modbus server
    ///
    /// The listener is bound before this method returns, so the port is
    /// accepting connections as soon as `launch` completes. Serving happens
    /// in a background task that runs until [`Daemon::shutdown`]; that task
    /// ends only once every client session has closed or the shutdown
    /// timeout expired.
    async fn start_modbus_server(&mut self, config: &Config, store: Arc<RegisterStore>) -> Result<()> {
        let socket_addr = config.modbus.socket_addr()?;
        let listener = TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("Failed to bind Modbus server to {}", socket_addr))?;
        let local_addr = listener.local_addr()?;
        self.modbus_addr = Some(local_addr);

        info!(
            "Starting modbus server on {} for {} units ({} clients max)",
            local_addr, config.store.units, config.modbus.max_clients
        );

        let dispatcher = RequestDispatcher::new(store);
        let limiter = ConnectionLimiter::new(config.modbus.max_clients);
        let sessions = self.sessions.clone();
        let stop_sessions = self.sessions.clone();
        let idle_timeout = config.modbus.idle_timeout();
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let server = Server::new(listener);

            let session_limiter = limiter.clone();
            let on_connected = move |stream: TcpStream, socket_addr: SocketAddr| {
                let stream = ClientStream::new(stream, sessions.clone(), idle_timeout);
                std::future::ready(accept_client(
                    stream,
                    socket_addr,
                    &dispatcher,
                    &session_limiter,
                ))
            };

            let on_process_error = |err: io::Error| {
                if err.kind() == io::ErrorKind::TimedOut {
                    info!("Closing idle Modbus client: {err}");
                } else {
                    error!("Modbus server error: {err}");
                }
            };

            let server_handle = tokio::spawn(async move {
                if let Err(e) = server.serve(&on_connected, on_process_error).await {
                    error!("Modbus server error: {}", e);
                }
            });

            while running.load(Ordering::SeqCst) && !server_handle.is_finished() {
                time::sleep(POLL_INTERVAL).await;
            }

            info!("Shutting down Modbus server...");
            stop_sessions.cancel();
            server_handle.abort();

            match time::timeout(SHUTDOWN_TIMEOUT, server_handle).await {
                Ok(_) => info!("Modbus server shut down successfully"),
                Err(_) => warn!("Modbus server shutdown timed out, forcing termination"),
            }

            // Sessions release their slot when their task ends
            let drained = time::timeout(SHUTDOWN_TIMEOUT, async {
                while limiter.active() > 0 {
                    time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;
            if drained.is_err() {
                warn!(
                    "{} Modbus client sessions still open after shutdown",
                    limiter.active()
                );
            }

            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            let mut elapsed = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                if elapsed >= HEARTBEAT_INTERVAL {
                    let units = store.as_ref().map_or(0, |s| s.layout().units);
                    debug!("Daemon heartbeat: running, {} units served", units);
                    elapsed = Duration::ZERO;
                }
                time::sleep(POLL_INTERVAL).await;
                elapsed += POLL_INTERVAL;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        self.sessions.cancel();
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Err(e)) => error!("Task failed: {:#}", e),
                Err(e) => error!("Task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        Ok(())
    }
}

/// Build the service for a new connection, or refuse it when the client
/// limit is reached. A refused stream is dropped, which closes it.
fn accept_client(
    stream: ClientStream,
    socket_addr: SocketAddr,
    dispatcher: &RequestDispatcher,
    limiter: &ConnectionLimiter,
) -> io::Result<Option<(RegisterModbusServer, ClientStream)>> {
    match limiter.try_acquire() {
        Some(slot) => {
            info!(
                "Accepted Modbus client {} ({}/{})",
                socket_addr,
                limiter.active(),
                limiter.max()
            );
            let service = RegisterModbusServer::with_slot(dispatcher.clone(), slot);
            Ok(Some((service, stream)))
        }
        None => {
            warn!(
                "Refusing Modbus client {}: {} clients already connected",
                socket_addr,
                limiter.max()
            );
            Ok(None)
        }
    }
}
