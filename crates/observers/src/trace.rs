use skein_core::Observer;

use crate::traits::{HasIndex, HasObjective, HasViolation};

/// One observed evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub index: u64,

    /// `NaN` for a failed evaluation.
    pub objective: f64,

    /// `NaN` for a failed evaluation.
    pub max_violation: f64,
}

/// Records a [`Sample`] per evaluation, for plotting or inspection after a
/// solve.
///
/// Never requests an action. Adapters take their observer by value, so to
/// keep the samples, record from a closure:
///
/// ```ignore
/// let mut trace = Trace::new();
/// let observer = |event: &Event<'_>| -> Option<Action> {
///     trace.record(event);
///     None
/// };
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    samples: Vec<Sample>,
}

impl Trace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Appends a sample for `event`.
    pub fn record<E>(&mut self, event: &E)
    where
        E: HasIndex + HasObjective + HasViolation,
    {
        self.samples.push(Sample {
            index: event.index(),
            objective: event.objective(),
            max_violation: event.max_violation(),
        });
    }

    /// Objective values in evaluation order.
    pub fn objectives(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.objective)
    }
}

impl<E, A> Observer<E, A> for Trace
where
    E: HasIndex + HasObjective + HasViolation,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self.record(event);
        None
    }
}
