use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use skein_history::{HistoryWriter, Restart};

/// Cooperative cancellation shared across threads.
///
/// Cancellation is honored at the next evaluation boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-solve options: observer, history, restart, and cancellation.
pub struct SolveRequest<'a, Obs = ()> {
    pub(crate) observer: Obs,
    pub(crate) history: Option<&'a mut HistoryWriter>,
    pub(crate) restart: Option<&'a Restart>,
    pub(crate) hot_start: bool,
    pub(crate) cancel: CancelToken,
}

impl Default for SolveRequest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveRequest<'_> {
    /// A cold start with no observer and no history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observer: (),
            history: None,
            restart: None,
            hot_start: false,
            cancel: CancelToken::new(),
        }
    }
}

impl<'a, Obs> SolveRequest<'a, Obs> {
    /// Reports every evaluation to `observer`.
    pub fn observer<O>(self, observer: O) -> SolveRequest<'a, O> {
        SolveRequest {
            observer,
            history: self.history,
            restart: self.restart,
            hot_start: self.hot_start,
            cancel: self.cancel,
        }
    }

    /// Appends a record per evaluation to `writer`.
    #[must_use]
    pub fn history(mut self, writer: &'a mut HistoryWriter) -> Self {
        self.history = Some(writer);
        self
    }

    /// Starts from a restart point.
    #[must_use]
    pub fn restart(mut self, restart: &'a Restart) -> Self {
        self.restart = Some(restart);
        self
    }

    /// Starts from an exact restart and replays its records while the
    /// backend requests the same points in the same order.
    #[must_use]
    pub fn hot_start(mut self, restart: &'a Restart) -> Self {
        self.restart = Some(restart);
        self.hot_start = true;
        self
    }

    /// Stops the solve when `token` is cancelled.
    #[must_use]
    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}
