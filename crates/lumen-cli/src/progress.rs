//! Console progress sink.
//!
//! Maps the pipeline's status callbacks onto tracing; a GUI front end
//! would render the same callbacks as its launch-state banner instead.

use lumen_core::Progress;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn stage(&self, title: &str, message: &str, _icon: &str) {
        tracing::info!("{title} {message}");
    }

    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
