pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod router;
pub mod server;
pub mod showq;
pub mod source;

pub use engine::{LogLineEngine, Outcome};
pub use error::{ExporterError, Result};
