pub mod config;
pub mod session;

pub use config::CliConfig;
pub use session::{CliCommand, Session, SetArgs, RESET_CONFIRMATION};
