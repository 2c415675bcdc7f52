//! Progress sink for dependency injection.
//!
//! Core logic reports human-readable status without being coupled to a
//! specific UI. The launcher front end renders these as the launch-state
//! banner (title/message/icon); the CLI maps them onto tracing.

/// Receives human-readable status updates from the pipeline.
pub trait Progress: Send + Sync {
    /// A stage began; `icon` is a front-end hint (e.g. `folder`, `download`).
    fn stage(&self, title: &str, message: &str, icon: &str);

    /// Informational note inside the current stage.
    fn info(&self, message: &str);

    /// Non-fatal problem; the run continues.
    fn warn(&self, message: &str);

    /// Stage failure; the run may still continue with later stages.
    fn error(&self, message: &str);
}

impl<T: Progress + ?Sized> Progress for std::sync::Arc<T> {
    fn stage(&self, title: &str, message: &str, icon: &str) {
        (**self).stage(title, message, icon);
    }
    fn info(&self, message: &str) {
        (**self).info(message);
    }
    fn warn(&self, message: &str) {
        (**self).warn(message);
    }
    fn error(&self, message: &str) {
        (**self).error(message);
    }
}

/// A no-op sink for silent operations and tests.
#[derive(Debug, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn stage(&self, _: &str, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn warn(&self, _: &str) {}
    fn error(&self, _: &str) {}
}
