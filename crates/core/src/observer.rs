/// Receives solve events and decides whether the solve should continue.
///
/// Adapters report every completed evaluation to an observer. Returning
/// `Some(action)` asks the adapter for an adapter-specific action (for
/// example, stopping at the next evaluation boundary), while `None` leaves
/// the solve untouched.
///
/// Closures implement `Observer` automatically, and `()` is the no-op
/// observer used when the caller is not interested in events.
pub trait Observer<E, A> {
    /// Observes one event and optionally requests an action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}
