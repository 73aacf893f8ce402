use std::fmt;

use crate::error::CapturedError;
use crate::fiber::Priority;

pub type ErrorSink = Box<dyn FnMut(CapturedError)>;

/// Reconciler construction options.
pub struct ReconcilerConfig {
    /// When set, updates without an explicit priority are performed
    /// synchronously; otherwise they are deferred at low priority.
    pub use_sync_scheduling: bool,
    pub(crate) error_sink: ErrorSink,
}

impl ReconcilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_sync_scheduling(mut self, enabled: bool) -> Self {
        self.use_sync_scheduling = enabled;
        self
    }

    /// Receives every lifecycle, ref and callback failure trapped during commit.
    pub fn error_sink(mut self, sink: impl FnMut(CapturedError) + 'static) -> Self {
        self.error_sink = Box::new(sink);
        self
    }

    pub(crate) fn default_priority(&self) -> Priority {
        if self.use_sync_scheduling {
            Priority::Synchronous
        } else {
            Priority::Low
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            use_sync_scheduling: true,
            error_sink: Box::new(|captured: CapturedError| {
                let component = captured.component.as_deref().unwrap_or("<unknown>");
                if captured.during_unmount {
                    log::error!("error while unmounting {component}: {}", captured.error);
                } else {
                    log::error!("error in {component} during commit: {}", captured.error);
                }
            }),
        }
    }
}

impl fmt::Debug for ReconcilerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerConfig")
            .field("use_sync_scheduling", &self.use_sync_scheduling)
            .finish_non_exhaustive()
    }
}
