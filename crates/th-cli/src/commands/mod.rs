//! CLI command implementations

mod check;
mod init;
mod run;

pub use check::check_command;
pub use init::init_command;
pub use run::{run_command, RunArgs};
