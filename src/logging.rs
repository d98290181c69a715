//! Structured logging setup
//!
//! The engine logs through `tracing`; binaries and demos call [`init`] once
//! to install a formatting subscriber filtered by `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `default_level` is used when `RUST_LOG` is unset. Calling this more than
/// once is harmless: later calls leave the first subscriber in place.
pub fn init(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("warn");
        init("debug");
        tracing::info!("still logging after double init");
    }
}
