//! Observability for agent runs.
//!
//! Two concerns live here:
//! - [`init_tracing`] installs the process-wide `tracing` subscriber
//! - [`Logger`] writes a markdown transcript of every run it observes
//!
//! # Example
//!
//! ```no_run
//! use ark::observability::{init_tracing, Logger};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! init_tracing("info");
//!
//! let transcript = Arc::new(Logger::new(Some(Path::new("logs/transcript.md")), None).unwrap());
//! // runner.with_observer(transcript)
//! # let _ = transcript;
//! ```

pub mod logger;

pub use logger::Logger;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing("debug");
        init_tracing("info");
        tracing::info!("subscriber installed");
    }
}
