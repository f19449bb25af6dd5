//! Runs video scans on the blocking pool so async callers stay responsive.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::scanner::{FrameSource, ScanReport, VideoScanner};

pub struct ScanWorker {
    cancel: CancellationToken,
}

impl Default for ScanWorker {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl ScanWorker {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Opens the source and scans it on a blocking thread. The scanner sees
    /// this worker's token and stops at its next sampled frame once cancelled.
    pub async fn run<S, F>(&self, scanner: VideoScanner, open: F) -> Result<ScanReport>
    where
        S: FrameSource,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let scanner = scanner.with_cancel(self.cancel.clone());
        let mut handle = tokio::task::spawn_blocking(move || {
            let source = open().inspect_err(|_| scanner.fail())?;
            scanner.scan_with_report(source)
        });

        let joined = tokio::select! {
            joined = &mut handle => joined,
            _ = self.cancel.cancelled() => {
                log::info!("scan cancellation requested, waiting for the worker to stop");
                handle.await
            }
        };
        joined.map_err(|e| Error::Worker(e.to_string()))?
    }
}
