use skein_core::{Functions, Observer, Problem};

use crate::{
    Error, GradientConfig, Solution,
    adapter::{
        Action, Capabilities, DenseBackend, DenseCallback, DenseDerivatives, DenseValues, EvalRequest, Event,
        Interrupt, OptimizerAdapter, SolveRequest, session::Session,
    },
};

/// Adapter for backends that take dense Jacobians.
#[derive(Debug, Clone)]
pub struct DenseAdapter<B> {
    backend: B,
    gradients: GradientConfig,
}

impl<B: DenseBackend> DenseAdapter<B> {
    /// Wraps `backend`, with forward differences for every column.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            gradients: GradientConfig::default(),
        }
    }

    /// Uses `gradients` to obtain derivatives.
    #[must_use]
    pub fn with_gradients(mut self, gradients: GradientConfig) -> Self {
        self.gradients = gradients;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: DenseBackend> OptimizerAdapter for DenseAdapter<B> {
    fn name(&self) -> &str {
        self.backend.name()
    }

    fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    fn solve<F, Obs>(
        &mut self,
        problem: &mut Problem,
        functions: &F,
        request: SolveRequest<'_, Obs>,
    ) -> Result<Solution, Error>
    where
        F: Functions + Sync + ?Sized,
        Obs: for<'e> Observer<Event<'e>, Action>,
    {
        let mut session = Session::start(
            problem,
            functions,
            self.backend.capabilities(),
            &self.gradients,
            self.backend.name(),
            request,
        )?;
        let linear = session.layout.linear_dense(session.linear_jacobian());
        let backend_problem = session.backend_problem(linear);

        let result = self.backend.run(&backend_problem, &mut Bridge { session: &mut session });
        let status = self.backend.classify(result.code);
        session.finish(result, status)
    }
}

struct Bridge<'b, 's, F: ?Sized, Obs> {
    session: &'b mut Session<'s, F, Obs>,
}

impl<F, Obs> DenseCallback for Bridge<'_, '_, F, Obs>
where
    F: Functions + Sync + ?Sized,
    Obs: for<'e> Observer<Event<'e>, Action>,
{
    fn evaluate(&mut self, x: &[f64], request: EvalRequest) -> Result<DenseValues, Interrupt> {
        let scaled = self.session.evaluate(x, request)?;
        let derivatives = scaled.derivatives.map(|(objectives, jacobian)| DenseDerivatives {
            objectives,
            jacobian: self.session.layout.callback_dense(&jacobian),
        });
        Ok(DenseValues {
            objectives: scaled.objectives,
            constraints: scaled.constraints,
            derivatives,
        })
    }
}
