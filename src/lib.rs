// Input record demultiplexing library

pub mod cli;
pub mod config;
pub mod demux;
pub mod error;
pub mod layout;
pub mod logging;

pub use cli::Cli;
pub use config::CheckOptions;
pub use error::{ConfigError, ExtractionError, RecordError};
pub use logging::LogLevel;
