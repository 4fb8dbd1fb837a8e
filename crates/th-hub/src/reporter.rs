//! Reporter worker and the final result block

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crossterm::style::{style, Color, Stylize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use th_core::port::{wait_for_port, WaitOutcome};
use th_core::DiscoveredUrl;

use crate::aggregator::ResultAggregator;

/// Callback invoked once with every discovered URL after the report
pub type ResultsCallback = Arc<dyn Fn(&[DiscoveredUrl]) -> anyhow::Result<()> + Send + Sync>;

/// Total width of the `+====+` rule
const REPORT_WIDTH: usize = 100;

/// Name column width when nothing was discovered
const DEFAULT_NAME_WIDTH: usize = 6;

/// Waits for every tunnel to resolve (or the timeout), then reports
pub(crate) struct Reporter {
    pub results: Arc<ResultAggregator>,
    pub expected: usize,
    pub port: u16,
    pub check_local_port: bool,
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub show_report: bool,
    pub color: bool,
    pub callback: Option<ResultsCallback>,
    pub printed: Arc<Notify>,
    pub cancel: CancellationToken,
}

impl Reporter {
    pub async fn run(self) {
        if self.check_local_port
            && wait_for_port(self.port, self.poll_interval, &self.cancel).await
                == WaitOutcome::Cancelled
        {
            return;
        }

        match self
            .results
            .wait_resolved(self.expected, self.poll_interval, self.timeout, &self.cancel)
            .await
        {
            WaitOutcome::Satisfied => {}
            WaitOutcome::TimedOut => {
                tracing::warn!(
                    "Timeout while getting tunnel URLs ({} of {} resolved), print available URLs",
                    self.results.len(),
                    self.expected
                );
            }
            WaitOutcome::Cancelled => return,
        }

        if self.cancel.is_cancelled() {
            return;
        }

        let snapshot = self.results.snapshot();
        if self.show_report {
            print!("{}", render_report(&snapshot, self.color));
        }

        if let Some(callback) = &self.callback {
            if let Err(e) = callback(&snapshot) {
                tracing::error!("An error occurred while invoking results callback: {:#}", e);
            }
        }

        self.printed.notify_one();
    }
}

/// Format the block of discovered URLs.
///
/// ```text
/// +==========...==========+
///
///  🔗 Tunnel tun1  URL: http://a.test
///  🔗 Tunnel tun2  URL: http://b.test note
///
/// +==========...==========+
/// ```
pub fn render_report(results: &[DiscoveredUrl], color: bool) -> String {
    let rule = format!("+{}+", "=".repeat(REPORT_WIDTH - 2));
    let name_width = results
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(DEFAULT_NAME_WIDTH);

    let mut out = String::new();
    let _ = writeln!(out, "\n{}\n", paint(&rule, color));

    for result in results {
        let line = format!(
            "{}{:<width$}  {}{} {}",
            paint(" 🔗 Tunnel ", color),
            result.name,
            paint("URL: ", color),
            result.url,
            result.note.as_deref().unwrap_or(""),
            width = name_width
        );
        let _ = writeln!(out, "{}", line.trim_end());
    }

    let _ = writeln!(out, "\n{}\n", paint(&rule, color));
    out
}

fn paint(text: &str, color: bool) -> String {
    if color {
        style(text).with(Color::Green).to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain() {
        let results = vec![
            DiscoveredUrl::new("http://a.test", None, "tun1"),
            DiscoveredUrl::new("http://b.test", Some("backup".into()), "tunnel2"),
        ];
        let report = render_report(&results, false);
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines[1].len(), REPORT_WIDTH);
        assert!(lines[1].starts_with("+=") && lines[1].ends_with("=+"));
        assert!(report.contains(" 🔗 Tunnel tun1     URL: http://a.test\n"));
        assert!(report.contains(" 🔗 Tunnel tunnel2  URL: http://b.test backup\n"));
        assert!(!report.contains('\x1b'));
    }

    #[test]
    fn test_render_empty() {
        let report = render_report(&[], false);
        assert!(!report.contains("Tunnel"));
        assert_eq!(report.matches("+=").count(), 2);
    }

    #[test]
    fn test_render_colored() {
        let results = vec![DiscoveredUrl::new("http://a.test", None, "tun1")];
        let report = render_report(&results, true);
        assert!(report.contains('\x1b'));
        assert!(report.contains("http://a.test"));
    }

    #[tokio::test]
    async fn test_reporter_timeout_delivers_partial_results() {
        let results = Arc::new(ResultAggregator::new());
        results.push(DiscoveredUrl::new("http://a.test", None, "tun1"));

        let delivered = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let printed = Arc::new(Notify::new());

        let reporter = Reporter {
            results,
            expected: 2,
            port: 0,
            check_local_port: false,
            timeout: Some(Duration::from_secs(1)),
            poll_interval: Duration::from_millis(50),
            show_report: false,
            color: false,
            callback: Some(Arc::new(move |urls: &[DiscoveredUrl]| -> anyhow::Result<()> {
                sink.lock().unwrap().extend_from_slice(urls);
                Ok(())
            })),
            printed: Arc::clone(&printed),
            cancel: CancellationToken::new(),
        };
        reporter.run().await;

        tokio::time::timeout(Duration::from_secs(1), printed.notified())
            .await
            .expect("printed was not signalled");
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reporter_cancelled_does_not_print() {
        let printed = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reporter = Reporter {
            results: Arc::new(ResultAggregator::new()),
            expected: 1,
            port: 0,
            check_local_port: false,
            timeout: None,
            poll_interval: Duration::from_millis(50),
            show_report: false,
            color: false,
            callback: Some(Arc::new(|_: &[DiscoveredUrl]| -> anyhow::Result<()> {
                panic!("callback must not run after cancellation")
            })),
            printed: Arc::clone(&printed),
            cancel,
        };
        reporter.run().await;

        let waited = tokio::time::timeout(Duration::from_millis(100), printed.notified()).await;
        assert!(waited.is_err());
    }
}
