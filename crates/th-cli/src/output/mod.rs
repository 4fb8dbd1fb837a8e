//! Output formatting utilities for the CLI
//!
//! Tables for configured tunnels and colored status messages.

use tabled::{settings::Style, Table, Tabled};

use th_core::config::TunnelConfig;
use th_core::TunnelSpec;

/// Format the configured tunnels as an ASCII table
///
/// Each row tells whether the tunnel's client executable was found on the
/// search path. Entries that fail to parse are marked invalid.
pub fn format_tunnels(tunnels: &[TunnelConfig]) -> String {
    if tunnels.is_empty() {
        return "No tunnels configured".to_string();
    }

    #[derive(Tabled)]
    struct TunnelRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "EXECUTABLE")]
        executable: String,
        #[tabled(rename = "STATUS")]
        status: String,
        #[tabled(rename = "PATTERN")]
        pattern: String,
    }

    let rows: Vec<TunnelRow> = tunnels
        .iter()
        .map(|t| {
            let (executable, status) = match TunnelSpec::try_from(t) {
                Ok(spec) => (
                    spec.executable().unwrap_or_else(|| "-".to_string()),
                    if spec.is_executable_available() {
                        "installed".to_string()
                    } else {
                        "not installed".to_string()
                    },
                ),
                Err(e) => {
                    tracing::debug!("Tunnel {} is invalid: {}", t.name, e);
                    ("-".to_string(), "invalid".to_string())
                }
            };
            TunnelRow {
                name: t.name.clone(),
                executable,
                status,
                pattern: t.pattern.clone(),
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a success message in green with a checkmark prefix
///
/// Outputs to stdout with green coloring for positive feedback to the user.
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr so it never mixes with JSON results on stdout.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel(name: &str, command: &str, pattern: &str) -> TunnelConfig {
        TunnelConfig {
            name: name.to_string(),
            command: command.to_string(),
            pattern: pattern.to_string(),
            note: None,
            check_local_port: None,
        }
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_tunnels(&[]), "No tunnels configured");
    }

    #[test]
    fn test_format_rows() {
        let table = format_tunnels(&[
            tunnel("ghost", "/nonexistent/ghost-client --port {port}", r"\S+"),
            tunnel("broken", "ghost-client", "(unclosed"),
        ]);

        assert!(table.contains("NAME"));
        assert!(table.contains("ghost"));
        assert!(table.contains("/nonexistent/ghost-client"));
        assert!(table.contains("not installed"));
        assert!(table.contains("invalid"));
    }
}
