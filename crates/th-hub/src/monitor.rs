//! Per-tunnel process monitor
//!
//! A monitor runs exactly one tunnel end to end: optional local port
//! wait, launch, line-by-line output streaming, URL extraction (first
//! match only), private log, and release of its log on exit. Any failure
//! is logged with the tunnel's name and ends only this monitor.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use th_core::extract::extract;
use th_core::port::{wait_for_port, WaitOutcome};
use th_core::{DiscoveredUrl, TunnelError, TunnelLog, TunnelSpec};

use crate::aggregator::ResultAggregator;
use crate::process::ProcessTable;

/// Lines buffered between the pipe readers and the monitor
const LINE_BUFFER: usize = 256;

/// Everything one monitor needs, cloned out of the hub at launch
pub struct ProcessMonitor {
    spec: Arc<TunnelSpec>,
    port: u16,
    check_local_port: bool,
    poll_interval: Duration,
    log_path: Option<PathBuf>,
    results: Arc<ResultAggregator>,
    processes: Arc<ProcessTable>,
    cancel: CancellationToken,
}

impl ProcessMonitor {
    /// Create a monitor for `spec`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: Arc<TunnelSpec>,
        port: u16,
        check_local_port: bool,
        poll_interval: Duration,
        log_path: Option<PathBuf>,
        results: Arc<ResultAggregator>,
        processes: Arc<ProcessTable>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            spec,
            port,
            check_local_port,
            poll_interval,
            log_path,
            results,
            processes,
            cancel,
        }
    }

    /// Run the tunnel until its process ends or the run is cancelled
    pub async fn run(self) {
        let name = self.spec.name.clone();

        let mut log = match TunnelLog::create(&name, self.log_path.as_deref()).await {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(tunnel = %name, "Failed to open tunnel log: {}", e);
                TunnelLog::disabled(&name)
            }
        };

        if let Err(e) = self.monitor(&mut log).await {
            tracing::error!(tunnel = %name, "Error in tunnel: {}", e);
            log.write_line(&format!("Error in tunnel: {}", e)).await;
        }

        log.close().await;
        tracing::debug!(tunnel = %name, "Monitor finished");
    }

    async fn monitor(&self, log: &mut TunnelLog) -> Result<(), TunnelError> {
        let name = &self.spec.name;

        if self.check_local_port
            && wait_for_port(self.port, self.poll_interval, &self.cancel).await
                == WaitOutcome::Cancelled
        {
            return Ok(());
        }

        let argv = self.spec.argv(self.port)?;
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| TunnelError::EmptyCommand(name.clone()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                name: name.clone(),
                command: program.clone(),
                source,
            })?;

        // stdout and stderr are merged into one line stream
        let (tx, mut lines) = mpsc::channel(LINE_BUFFER);
        let mut readers = JoinSet::new();
        if let Some(stdout) = child.stdout.take() {
            readers.spawn(pump_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.spawn(pump_lines(stderr, tx.clone()));
        }
        drop(tx);

        tracing::info!(
            tunnel = %name,
            pid = child.id().unwrap_or_default(),
            "Tunnel process started"
        );

        if let Err(mut child) = self.processes.register(name, child) {
            // stop() already drained the table
            let _ = child.kill().await;
            return Ok(());
        }

        let mut extracted = false;
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = lines.recv() => next,
            };
            let Some(line) = next else {
                tracing::debug!(tunnel = %name, "Tunnel output closed");
                break;
            };
            let line = line.map_err(|source| TunnelError::Read {
                name: name.clone(),
                source,
            })?;

            if !extracted {
                if let Some(found) = extract(&self.spec, &line) {
                    extracted = true;
                    self.publish(found);
                }
            }

            tracing::debug!(tunnel = %name, "{}", line);
            log.write_line(&line).await;
        }

        readers.abort_all();
        Ok(())
    }

    fn publish(&self, found: DiscoveredUrl) {
        tracing::info!(tunnel = %found.name, "Found URL {}", found.url);
        self.results.push(found.clone());

        if let Some(callback) = self.spec.callback() {
            if let Err(e) = callback(&found) {
                tracing::error!(
                    tunnel = %found.name,
                    "An error occurred while invoking URL callback: {:#}",
                    e
                );
            }
        }
    }
}

/// Forward decoded, right-trimmed lines from `reader` until EOF
async fn pump_lines<R>(reader: R, tx: mpsc::Sender<io::Result<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if tx.send(Ok(line)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }
}
