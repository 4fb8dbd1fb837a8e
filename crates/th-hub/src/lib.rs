//! th-hub: Tunnel orchestration for TunnelHub
//!
//! The hub launches one monitor task per registered tunnel client. Each
//! monitor streams its process output, extracts the first public URL and
//! appends it to a shared aggregator. A reporter task waits until every
//! tunnel resolved (or the timeout elapses), prints the result block and
//! hands the results to the aggregate callback.

pub mod aggregator;
pub mod hub;
pub mod monitor;
pub mod process;
pub mod reporter;

pub use aggregator::ResultAggregator;
pub use hub::TunnelHub;
pub use monitor::ProcessMonitor;
pub use process::ProcessTable;
pub use reporter::{render_report, ResultsCallback};
