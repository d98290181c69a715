//! Scoped capture of adapter log output
//!
//! While an adapter call runs, a buffer-backed subscriber replaces the
//! thread's default one. The previous subscriber comes back when the call
//! returns, including when it panics, because the guard is dropped during
//! unwinding. Captured text is replayed at debug level by the caller.
//!
//! Only `tracing` events are captured. Text an adapter writes straight to
//! stdout or stderr (`println!`, `eprintln!`, foreign libraries) is not
//! redirected and still reaches the console.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Text an adapter logged during one captured call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput(String);

impl CapturedOutput {
    /// Get the captured text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Append another capture.
    pub fn extend(&mut self, other: Self) {
        self.0.push_str(&other.0);
    }
}

/// Runs closures with adapter output either captured or passed through.
#[derive(Debug, Clone, Copy)]
pub struct OutputCapture {
    enabled: bool,
}

impl OutputCapture {
    /// Capture when `enabled`, otherwise pass output through.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Whether output is captured.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f`, catching panics.
    ///
    /// Returns the closure result (or the panic message) together with any
    /// captured output.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> (Result<T, String>, CapturedOutput) {
        if !self.enabled {
            return (catch(f), CapturedOutput::default());
        }

        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let writer_buffer = Arc::clone(&buffer);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || BufferWriter(Arc::clone(&writer_buffer)))
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || catch(f));

        let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));
        (result, CapturedOutput(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

impl Default for OutputCapture {
    fn default() -> Self {
        Self::new(true)
    }
}

fn catch<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "adapter panicked".to_string())
}

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_adapter_logs() {
        let capture = OutputCapture::new(true);
        let (result, output) = capture.run(|| {
            tracing::info!("iteration 1: cost 0.5");
            42
        });
        assert_eq!(result, Ok(42));
        assert!(output.as_str().contains("iteration 1: cost 0.5"));
    }

    #[test]
    fn test_passthrough_captures_nothing() {
        let capture = OutputCapture::new(false);
        let (result, output) = capture.run(|| {
            tracing::info!("not captured");
            1
        });
        assert_eq!(result, Ok(1));
        assert!(output.is_empty());
    }

    #[test]
    fn test_panic_is_caught_and_output_kept() {
        let capture = OutputCapture::new(true);
        let (result, output): (Result<(), String>, _) = capture.run(|| {
            tracing::warn!("about to fail");
            panic!("singular matrix");
        });
        assert_eq!(result, Err("singular matrix".to_string()));
        assert!(output.as_str().contains("about to fail"));
    }

    #[test]
    fn test_direct_prints_are_not_captured() {
        let capture = OutputCapture::new(true);
        let (result, output) = capture.run(|| {
            println!("printed directly");
            tracing::info!("logged");
        });
        assert!(result.is_ok());
        assert!(output.as_str().contains("logged"));
        assert!(!output.as_str().contains("printed directly"));
    }

    #[test]
    fn test_captures_do_not_leak_between_calls() {
        let capture = OutputCapture::new(true);
        let (_, first) = capture.run(|| tracing::info!("first"));
        let (_, second) = capture.run(|| tracing::info!("second"));
        assert!(!second.as_str().contains("first"));
        assert!(first.as_str().contains("first"));
    }
}
