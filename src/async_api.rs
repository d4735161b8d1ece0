//! Async entry point backed by a dedicated worker thread.
//!
//! Browser handles are not required to be `Send`, so the whole session lives
//! on one thread that launches, captures and tears down, then reports back
//! over a oneshot channel.

use crate::engine::Launcher;
use crate::{CaptureOrchestrator, CaptureRequest, CaptureResult, Error, Result};
use std::thread;
use tokio::sync::oneshot;

/// Run one capture without blocking the async runtime.
pub async fn capture_async<L>(launcher: L, request: CaptureRequest) -> Result<CaptureResult>
where
    L: Launcher + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("pagecharm-capture".into())
        .spawn(move || {
            let res = CaptureOrchestrator::new(launcher).capture(&request);
            let _ = tx.send(res);
        })
        .map_err(|e| Error::Other(format!("Failed to spawn capture worker: {}", e)))?;

    rx.await
        .map_err(|e| Error::Other(format!("Capture worker canceled: {}", e)))?
}
