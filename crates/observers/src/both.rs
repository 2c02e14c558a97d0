use skein_core::Observer;

/// Runs two observers on every event.
///
/// Both observers always see the event. If both request an action, the
/// first one wins.
#[derive(Debug, Clone, Default)]
pub struct Both<O1, O2>(pub O1, pub O2);

impl<E, A, O1, O2> Observer<E, A> for Both<O1, O2>
where
    O1: Observer<E, A>,
    O2: Observer<E, A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        let first = self.0.observe(event);
        let second = self.1.observe(event);
        first.or(second)
    }
}
