//! Bridge for the blocking call variants.
//!
//! Every operation in this workspace is async-first; the `_blocking`
//! methods funnel through [`block_on`], which drives the future on a
//! lazily created single-threaded runtime shared for the process lifetime.
//!
//! Calling a `_blocking` method from inside an async context is a caller
//! error and will panic in tokio's entry guard, the same way other
//! blocking front-ends to async libraries behave.

use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};

use crate::error::{ReportError, Result};

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Runs a future to completion on the shared blocking-bridge runtime.
///
/// # Errors
/// Returns a configuration error if the runtime cannot be created.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    if RUNTIME.get().is_none() {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ReportError::configuration(format!("Failed to create blocking runtime: {}", e))
            })?;
        // Another thread may have won the race; either runtime works.
        let _ = RUNTIME.set(runtime);
    }

    let runtime = RUNTIME
        .get()
        .ok_or_else(|| ReportError::configuration("Blocking runtime unavailable"))?;

    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_returns_future_output() {
        let value = block_on(async { 41 + 1 });
        assert!(matches!(value, Ok(42)));
    }

    #[test]
    fn test_block_on_reuses_runtime() {
        assert!(matches!(block_on(async { 1 }), Ok(1)));
        assert!(matches!(block_on(async { 2 }), Ok(2)));
    }
}
