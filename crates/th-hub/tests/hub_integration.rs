//! Hub integration tests
//!
//! Drives the full lifecycle with `sh` standing in for real tunnel clients.

#![cfg(unix)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::timeout;

use th_core::config::{HubConfig, LogConfig};
use th_core::{DiscoveredUrl, HubError, HubState, LogContext, TunnelSpec};
use th_hub::TunnelHub;

/// Hub that skips the port check and polls quickly
fn test_config() -> HubConfig {
    HubConfig {
        port: 0,
        check_local_port: false,
        timeout: Some(Duration::from_secs(5)),
        poll_interval: Duration::from_millis(50),
        grace_period: Duration::from_secs(2),
        show_report: false,
    }
}

fn file_logs(dir: &TempDir) -> LogContext {
    LogContext::new(LogConfig {
        console: false,
        color: false,
        dir: Some(dir.path().to_path_buf()),
        level: "debug".to_string(),
    })
    .unwrap()
}

/// A tunnel that prints `output` and then stays alive
fn tunnel(name: &str, output: &str, pattern: &str) -> TunnelSpec {
    let command = format!("sh -c 'echo {}; exec sleep 30'", output);
    TunnelSpec::new(&command, pattern, name).unwrap()
}

fn is_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[tokio::test]
async fn test_two_tunnels_resolve_and_stop() {
    let dir = TempDir::new().unwrap();
    let hub = TunnelHub::new(test_config(), file_logs(&dir));

    assert!(hub.add_tunnel(tunnel("tun1", "url: http://a.test", r"url: (\S+)")));
    assert!(hub.add_tunnel(tunnel("tun2", "link=b.test", r"link=(\S+)")));
    assert_eq!(hub.tunnel_count(), 2);
    assert_eq!(hub.tunnel_names(), "tun1, tun2");

    timeout(Duration::from_secs(10), hub.start())
        .await
        .expect("start did not return")
        .unwrap();

    assert!(hub.is_running());
    let found: HashSet<DiscoveredUrl> = hub.results().into_iter().collect();
    let expected: HashSet<DiscoveredUrl> = [
        DiscoveredUrl::new("http://a.test", None, "tun1"),
        DiscoveredUrl::new("http://b.test", None, "tun2"),
    ]
    .into_iter()
    .collect();
    assert_eq!(found, expected);

    let pids = hub.process_ids();
    assert_eq!(pids.len(), 2);
    assert!(pids.iter().all(|pid| is_alive(*pid)));

    hub.stop().await.unwrap();

    assert_eq!(hub.state(), HubState::Idle);
    assert!(hub.results().is_empty());
    assert!(hub.process_ids().is_empty());
    assert!(pids.iter().all(|pid| !is_alive(*pid)));

    let run_log = std::fs::read_to_string(dir.path().join("tunnelhub.log")).unwrap();
    assert!(run_log.contains("Killed."));
    let tun1_log = std::fs::read_to_string(dir.path().join("tunnel_tun1.log")).unwrap();
    assert!(tun1_log.contains("[TunnelHub.tun1]: url: http://a.test"));
}

#[tokio::test]
async fn test_lifecycle_errors() {
    let hub = TunnelHub::new(test_config(), LogContext::silent());

    assert!(matches!(hub.launch(), Err(HubError::NoTunnels)));
    assert!(matches!(hub.stop().await, Err(HubError::NotRunning)));

    hub.add_tunnel(tunnel("tun1", "url: http://a.test", r"url: (\S+)"));
    hub.launch().unwrap();
    assert!(matches!(hub.launch(), Err(HubError::AlreadyRunning)));
    assert!(matches!(
        hub.start_until(std::future::pending()).await,
        Err(HubError::AlreadyRunning)
    ));

    hub.stop().await.unwrap();
    assert!(matches!(hub.stop().await, Err(HubError::NotRunning)));
}

#[tokio::test]
async fn test_restart_after_stop() {
    let hub = TunnelHub::new(test_config(), LogContext::silent());
    hub.add_tunnel(tunnel("tun1", "url: http://a.test", r"url: (\S+)"));

    for _ in 0..2 {
        timeout(Duration::from_secs(10), hub.start())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hub.results().len(), 1);
        hub.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_missing_executable_is_skipped() {
    let hub = TunnelHub::new(test_config(), LogContext::silent());

    assert!(!hub.add_tunnel(
        TunnelSpec::new("/nonexistent/cloudflared tunnel", r"\S+", "ghost").unwrap()
    ));
    assert_eq!(hub.tunnel_count(), 0);
    assert!(matches!(hub.launch(), Err(HubError::NoTunnels)));
}

#[tokio::test]
async fn test_unresolved_tunnel_times_out_with_partial_results() {
    let dir = TempDir::new().unwrap();
    let config = HubConfig {
        timeout: Some(Duration::from_secs(1)),
        ..test_config()
    };
    let hub = TunnelHub::new(config, file_logs(&dir));

    let delivered = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&delivered);
    hub.set_callback(move |urls| {
        *sink.lock().unwrap() = Some(urls.to_vec());
        Ok(())
    });

    hub.add_tunnel(tunnel("tun1", "url: http://a.test", r"url: (\S+)"));
    hub.add_tunnel(tunnel("quiet", "nothing to see", r"url: (\S+)"));

    timeout(Duration::from_secs(10), hub.start())
        .await
        .unwrap()
        .unwrap();

    let delivered = delivered.lock().unwrap().clone().unwrap();
    assert_eq!(
        delivered,
        vec![DiscoveredUrl::new("http://a.test", None, "tun1")]
    );

    let quiet_log = std::fs::read_to_string(dir.path().join("tunnel_quiet.log")).unwrap();
    assert!(quiet_log.contains("[TunnelHub.quiet]: nothing to see"));

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_callback_errors_are_contained() {
    let hub = TunnelHub::new(test_config(), LogContext::silent());
    hub.set_callback(|_| anyhow::bail!("aggregate callback failed"));
    hub.add_tunnel(
        tunnel("tun1", "url: http://a.test", r"url: (\S+)")
            .with_callback(|_| anyhow::bail!("url callback failed")),
    );

    timeout(Duration::from_secs(10), hub.start())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(hub.results().len(), 1);
    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_waits_for_local_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = HubConfig {
        port,
        check_local_port: true,
        ..test_config()
    };
    let hub = TunnelHub::new(config, LogContext::silent());
    hub.add_tunnel(tunnel("tun1", "url: http://localhost:{port}", r"url: (\S+)"));

    hub.launch().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(hub.results().is_empty());
    assert!(hub.process_ids().is_empty());

    let _listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let hub_results = hub.clone();
    let resolved = timeout(Duration::from_secs(10), async move {
        while hub_results.results().is_empty() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(resolved.is_ok());
    assert_eq!(hub.results()[0].url, format!("http://localhost:{}", port));

    hub.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_during_port_wait() {
    let config = HubConfig {
        port: 1,
        check_local_port: true,
        ..test_config()
    };
    let hub = TunnelHub::new(config, LogContext::silent());
    hub.add_tunnel(tunnel("tun1", "url: http://a.test", r"url: (\S+)"));

    hub.launch().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    timeout(Duration::from_secs(5), hub.stop())
        .await
        .expect("stop hung on a port wait")
        .unwrap();
    assert_eq!(hub.state(), HubState::Idle);
}

#[tokio::test]
async fn test_interrupt_stops_hub() {
    let hub = TunnelHub::new(test_config(), LogContext::silent());
    hub.add_tunnel(tunnel("quiet", "nothing to see", r"url: (\S+)"));

    timeout(Duration::from_secs(10), hub.start_until(async {}))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(hub.state(), HubState::Idle);
    assert!(hub.process_ids().is_empty());
}

#[tokio::test]
async fn test_stop_from_another_task_releases_start() {
    let hub = TunnelHub::new(test_config(), LogContext::silent());
    hub.add_tunnel(tunnel("quiet", "nothing to see", r"url: (\S+)"));

    let stopper = hub.clone();
    let waiter = tokio::spawn(async move { hub.start_until(std::future::pending()).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    stopper.stop().await.unwrap();

    timeout(Duration::from_secs(5), waiter)
        .await
        .expect("start did not observe stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_overlapping_stop_waits_for_first_teardown() {
    let config = HubConfig {
        grace_period: Duration::from_secs(2),
        ..test_config()
    };
    let hub = TunnelHub::new(config, LogContext::silent());
    hub.add_tunnel(
        TunnelSpec::new(
            r#"sh -c 'trap "" TERM; echo url: http://a.test; while true; do sleep 0.1; done'"#,
            r"url: (\S+)",
            "stubborn",
        )
        .unwrap(),
    );

    timeout(Duration::from_secs(10), hub.start())
        .await
        .unwrap()
        .unwrap();
    let pids = hub.process_ids();
    assert_eq!(pids.len(), 1);

    let stopper = hub.clone();
    let first = tokio::spawn(async move { stopper.stop().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The first stop is still inside the grace period
    assert_eq!(hub.state(), HubState::Stopping);
    assert!(!hub.is_running());
    assert!(matches!(hub.stop().await, Err(HubError::NotRunning)));
    assert!(matches!(hub.launch(), Err(HubError::AlreadyRunning)));
    assert_eq!(hub.state(), HubState::Stopping);

    timeout(Duration::from_secs(10), first)
        .await
        .expect("first stop did not finish")
        .unwrap()
        .unwrap();

    assert_eq!(hub.state(), HubState::Idle);
    assert!(pids.iter().all(|pid| !is_alive(*pid)));
}

#[tokio::test]
async fn test_reporter_skips_port_wait_when_every_tunnel_opts_out() {
    let config = HubConfig {
        port: 1,
        check_local_port: true,
        timeout: Some(Duration::from_secs(1)),
        ..test_config()
    };
    let hub = TunnelHub::new(config, LogContext::silent());
    hub.add_tunnel(
        tunnel("tun1", "url: http://a.test", r"url: (\S+)").with_local_port_check(false),
    );
    hub.add_tunnel(
        tunnel("quiet", "nothing to see", r"url: (\S+)").with_local_port_check(false),
    );

    timeout(Duration::from_secs(5), hub.start())
        .await
        .expect("reporter waited for a port no tunnel needs")
        .unwrap();

    assert_eq!(
        hub.results(),
        vec![DiscoveredUrl::new("http://a.test", None, "tun1")]
    );
    hub.stop().await.unwrap();
}
