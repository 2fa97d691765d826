//! The narrow interface the core pipeline reports progress through,
//! keeping the fetcher and tar writer decoupled from the concrete logger.

/// Stage a progress update belongs to, so a sink can render download vs.
/// extraction progress differently without the core knowing how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Download,
    Extract,
}

pub trait ProgressSink: Send + Sync {
    /// `done`/`total` in bytes; `total == 0` means unknown (no
    /// `Content-Length`, or ISIZE unavailable yet).
    fn on_progress(&self, stage: ProgressStage, layer: &str, done: u64, total: u64);

    /// A layer finished (or was already complete) for the given reason.
    fn on_layer_done(&self, layer: &str, message: &str);
}

/// Discards every update; useful for tests and library callers that don't
/// want console output.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _stage: ProgressStage, _layer: &str, _done: u64, _total: u64) {}
    fn on_layer_done(&self, _layer: &str, _message: &str) {}
}
