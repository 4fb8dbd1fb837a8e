//! The tunnel hub
//!
//! `TunnelHub` accepts tunnel specs, launches one [`ProcessMonitor`] per
//! tunnel plus one reporter, and tears everything down on `stop`.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start/launch--> Running --stop--> Stopping --> Idle
//! ```
//!
//! All run resources (results, worker handles, process handles) belong to
//! the hub and are cleared only by the reset at the end of `stop`, after
//! every worker has been joined and every process terminated. While a
//! `stop` is in progress, other `stop` calls fail with `NotRunning` and
//! `launch` fails with `AlreadyRunning`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use th_core::config::HubConfig;
use th_core::{DiscoveredUrl, HubError, HubState, LogContext, TunnelSpec};

use crate::aggregator::ResultAggregator;
use crate::monitor::ProcessMonitor;
use crate::process::{terminate, ProcessTable};
use crate::reporter::{Reporter, ResultsCallback};

/// Launches tunnel clients and collects their public URLs.
///
/// Cloning is cheap and every clone drives the same hub, so one task can
/// block in [`start`](Self::start) while another calls [`stop`](Self::stop).
#[derive(Clone)]
pub struct TunnelHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    logs: LogContext,
    tunnels: Mutex<Vec<Arc<TunnelSpec>>>,
    state: Mutex<HubState>,
    run: Mutex<RunHandles>,
    results: Arc<ResultAggregator>,
    processes: Arc<ProcessTable>,
    callback: Mutex<Option<ResultsCallback>>,
}

/// Per-run signals and workers
struct RunHandles {
    cancel: CancellationToken,
    printed: Arc<Notify>,
    jobs: Vec<JoinHandle<()>>,
}

impl RunHandles {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            printed: Arc::new(Notify::new()),
            jobs: Vec::new(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TunnelHub {
    /// Create an idle hub
    pub fn new(config: HubConfig, logs: LogContext) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                logs,
                tunnels: Mutex::new(Vec::new()),
                state: Mutex::new(HubState::Idle),
                run: Mutex::new(RunHandles::new()),
                results: Arc::new(ResultAggregator::new()),
                processes: Arc::new(ProcessTable::new()),
                callback: Mutex::new(None),
            }),
        }
    }

    /// Set the callback that receives every result once they are reported
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(&[DiscoveredUrl]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        *lock(&self.inner.callback) = Some(Arc::new(callback));
    }

    /// Hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Register a tunnel.
    ///
    /// A tunnel whose executable is not on the search path is skipped with
    /// a warning; the return value tells whether it was registered.
    pub fn add_tunnel(&self, spec: TunnelSpec) -> bool {
        self.inner.logs.in_scope(|| {
            if !spec.is_executable_available() {
                tracing::warn!(
                    "Skipping {} - {} not installed",
                    spec.name,
                    spec.executable().as_deref().unwrap_or("<empty command>")
                );
                return false;
            }

            tracing::debug!("Adding tunnel {:?}", spec);
            lock(&self.inner.tunnels).push(Arc::new(spec));
            true
        })
    }

    /// Number of registered tunnels
    pub fn tunnel_count(&self) -> usize {
        lock(&self.inner.tunnels).len()
    }

    /// Comma-separated names of the registered tunnels
    pub fn tunnel_names(&self) -> String {
        lock(&self.inner.tunnels)
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Current lifecycle state
    pub fn state(&self) -> HubState {
        *lock(&self.inner.state)
    }

    /// Whether workers are running
    pub fn is_running(&self) -> bool {
        self.state() == HubState::Running
    }

    /// URLs discovered so far in this run, in discovery order
    pub fn results(&self) -> Vec<DiscoveredUrl> {
        self.inner.results.snapshot()
    }

    /// Ids of the tunnel processes of this run
    pub fn process_ids(&self) -> Vec<u32> {
        self.inner.processes.pids()
    }

    /// Spawn the monitors and the reporter, then return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(&self) -> Result<(), HubError> {
        self.launch_run().map(|_| ())
    }

    /// Launch and hand back the signals of the new run
    fn launch_run(&self) -> Result<(Arc<Notify>, CancellationToken), HubError> {
        let mut state = lock(&self.inner.state);
        if *state != HubState::Idle {
            return Err(HubError::AlreadyRunning);
        }

        let tunnels = lock(&self.inner.tunnels).clone();
        if tunnels.is_empty() {
            return Err(HubError::NoTunnels);
        }

        let config = &self.inner.config;
        let logs = &self.inner.logs;
        let mut run = lock(&self.inner.run);

        // The reporter only waits for the port if some tunnel does
        let check_local_port = tunnels
            .iter()
            .any(|spec| spec.check_local_port.unwrap_or(config.check_local_port));

        let reporter = Reporter {
            results: Arc::clone(&self.inner.results),
            expected: tunnels.len(),
            port: config.port,
            check_local_port,
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            show_report: config.show_report,
            color: logs.color(),
            callback: lock(&self.inner.callback).clone(),
            printed: Arc::clone(&run.printed),
            cancel: run.cancel.clone(),
        };
        let reporter_job = tokio::spawn(logs.instrument(reporter.run()));
        run.jobs.push(reporter_job);

        for spec in tunnels {
            let check_local_port = spec.check_local_port.unwrap_or(config.check_local_port);
            let log_path = logs.tunnel_log_path(&spec.name);
            let monitor = ProcessMonitor::new(
                spec,
                config.port,
                check_local_port,
                config.poll_interval,
                log_path,
                Arc::clone(&self.inner.results),
                Arc::clone(&self.inner.processes),
                run.cancel.clone(),
            );
            run.jobs.push(tokio::spawn(logs.instrument(monitor.run())));
        }

        *state = HubState::Running;
        logs.in_scope(|| {
            tracing::info!("Tunnels: {} -> Started.", self.tunnel_names());
        });
        Ok((Arc::clone(&run.printed), run.cancel.clone()))
    }

    /// Launch and block until the results are reported or Ctrl+C arrives.
    ///
    /// On Ctrl+C the hub is stopped before returning. After a normal
    /// return the tunnels keep running until [`stop`](Self::stop).
    pub async fn start(&self) -> Result<(), HubError> {
        self.start_until(ctrl_c()).await
    }

    /// Like [`start`](Self::start), with `interrupt` in place of Ctrl+C
    pub async fn start_until<I>(&self, interrupt: I) -> Result<(), HubError>
    where
        I: Future<Output = ()>,
    {
        let (printed, cancel) = self.launch_run()?;

        tokio::select! {
            _ = printed.notified() => Ok(()),
            // stopped from another task
            _ = cancel.cancelled() => Ok(()),
            _ = interrupt => {
                self.inner.logs.in_scope(|| {
                    tracing::warn!("Keyboard interrupt detected, stopping tunnels");
                });
                self.stop().await
            }
        }
    }

    /// Cancel every worker, terminate every process, join, and reset to idle
    pub async fn stop(&self) -> Result<(), HubError> {
        let (cancel, jobs) = {
            let mut state = lock(&self.inner.state);
            if *state != HubState::Running {
                return Err(HubError::NotRunning);
            }
            // Claim the teardown
            *state = HubState::Stopping;
            let mut run = lock(&self.inner.run);
            (run.cancel.clone(), std::mem::take(&mut run.jobs))
        };

        let logs = self.inner.logs.clone();
        logs.instrument(async {
            tracing::info!("Tunnels: {} -> Killed.", self.tunnel_names());

            cancel.cancel();
            self.terminate_processes().await;

            for joined in join_all(jobs).await {
                if let Err(e) = joined {
                    tracing::error!("Tunnel worker failed: {}", e);
                }
            }
        })
        .await;

        self.reset();
        Ok(())
    }

    async fn terminate_processes(&self) {
        let grace = self.inner.config.grace_period;
        let mut processes = self.inner.processes.close_and_drain();

        let outcomes = join_all(
            processes
                .iter_mut()
                .map(|process| async move { (process.name.clone(), terminate(process, grace).await) }),
        )
        .await;

        for (name, outcome) in outcomes {
            if let Err(e) = outcome {
                tracing::warn!(tunnel = %name, "Error terminating process: {}", e);
            }
        }
    }

    /// Clear results and handles. Only valid once workers are joined.
    fn reset(&self) {
        let mut state = lock(&self.inner.state);
        self.inner.results.clear();
        self.inner.processes.reopen();
        *lock(&self.inner.run) = RunHandles::new();
        *state = HubState::Idle;
    }
}

impl std::fmt::Debug for TunnelHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelHub")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .field("tunnels", &self.tunnel_names())
            .finish_non_exhaustive()
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
