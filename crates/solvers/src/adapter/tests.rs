use std::{
    convert::Infallible,
    sync::atomic::{AtomicUsize, Ordering},
};

use approx::assert_relative_eq;
use ndarray::Array2;
use skein_core::{
    BlockJacobian, ConstraintSpec, FunctionValues, Functions, Gradients, Objective, Point, Problem, VariableSpec,
};
use skein_history::{HistoryWriter, RestartMode, read, restart};
use tempfile::TempDir;
use thiserror::Error;

use super::*;
use crate::{Error, ExitStatus, GradientConfig, Strategy};

/// Takes one steepest-descent step on the first objective.
#[derive(Debug, Default)]
struct Stepper {
    capabilities: Capabilities,
    seen: Option<BackendProblem<Array2<f64>>>,
    values: Vec<DenseValues>,
}

impl Stepper {
    fn with(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }
}

impl DenseBackend for Stepper {
    fn name(&self) -> &str {
        "stepper"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn run(&mut self, problem: &BackendProblem<Array2<f64>>, callback: &mut dyn DenseCallback) -> BackendResult {
        self.seen = Some(problem.clone());
        let x0 = problem.x0.clone();
        let Ok(first) = callback.evaluate(&x0, EvalRequest::with_gradient().at(0, 0)) else {
            return stopped(x0);
        };
        let gradient = first
            .derivatives
            .as_ref()
            .map(|d| d.objectives.row(0).to_vec())
            .unwrap_or_default();
        let x1 = step(&x0, &gradient);
        self.values.push(first);
        let Ok(second) = callback.evaluate(&x1, EvalRequest::with_gradient().at(1, 0)) else {
            return stopped(x0);
        };
        self.values.push(second);
        finished(x1)
    }

    fn classify(&self, code: i32) -> ExitStatus {
        match code {
            0 => ExitStatus::Optimal,
            -1 => ExitStatus::StoppedByObserver,
            _ => ExitStatus::Failure,
        }
    }
}

/// The sparse twin of [`Stepper`].
#[derive(Debug, Default)]
struct SparseStepper {
    structure: Option<SparseStructure>,
    values: Vec<SparseValues>,
}

impl SparseBackend for SparseStepper {
    fn name(&self) -> &str {
        "sparse_stepper"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn run(
        &mut self,
        problem: &BackendProblem<SparseMatrix>,
        structure: &SparseStructure,
        callback: &mut dyn SparseCallback,
    ) -> BackendResult {
        self.structure = Some(structure.clone());
        let x0 = problem.x0.clone();
        let Ok(first) = callback.evaluate(&x0, EvalRequest::with_gradient()) else {
            return stopped(x0);
        };
        let gradient = first
            .derivatives
            .as_ref()
            .map(|d| d.objectives.row(0).to_vec())
            .unwrap_or_default();
        let x1 = step(&x0, &gradient);
        self.values.push(first);
        let Ok(second) = callback.evaluate(&x1, EvalRequest::with_gradient()) else {
            return stopped(x0);
        };
        self.values.push(second);
        finished(x1)
    }

    fn classify(&self, code: i32) -> ExitStatus {
        if code == 0 { ExitStatus::Optimal } else { ExitStatus::StoppedByObserver }
    }
}

/// Requests a point one variable short of the problem.
#[derive(Debug, Default)]
struct ShortPoint {
    outcomes: Vec<bool>,
}

impl DenseBackend for ShortPoint {
    fn name(&self) -> &str {
        "short_point"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn run(&mut self, problem: &BackendProblem<Array2<f64>>, callback: &mut dyn DenseCallback) -> BackendResult {
        let short = &problem.x0[1..];
        self.outcomes.push(callback.evaluate(short, EvalRequest::values()).is_ok());
        self.outcomes
            .push(callback.evaluate(&problem.x0, EvalRequest::values()).is_ok());
        finished(problem.x0.clone())
    }

    fn classify(&self, code: i32) -> ExitStatus {
        if code == 0 { ExitStatus::Optimal } else { ExitStatus::Failure }
    }
}

fn step(x: &[f64], gradient: &[f64]) -> Vec<f64> {
    x.iter().zip(gradient).map(|(x, g)| x - 0.1 * g).collect()
}

fn stopped(x: Vec<f64>) -> BackendResult {
    BackendResult {
        code: -1,
        x,
        iterations: 0,
        message: "interrupted".into(),
    }
}

fn finished(x: Vec<f64>) -> BackendResult {
    BackendResult {
        code: 0,
        x,
        iterations: 1,
        message: "one step".into(),
    }
}

/// `f = Σ xᵢ²`, `g = [x0 · x1, x2³]`, counting calls to `evaluate`.
#[derive(Default)]
struct Cubic {
    calls: AtomicUsize,
}

impl Functions for Cubic {
    type Error = Infallible;

    fn evaluate(&self, x: &Point<'_>) -> Result<FunctionValues, Infallible> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let x = x.as_slice();
        Ok(FunctionValues::new()
            .objective("f", x.iter().map(|v| v * v).sum::<f64>())
            .constraint("g", [x[0] * x[1], x[2].powi(3)]))
    }

    fn gradients(&self, x: &Point<'_>) -> Result<Option<Gradients>, Infallible> {
        let x = x.as_slice();
        Ok(Some(
            Gradients::new()
                .objective("f", x.iter().map(|v| 2.0 * v).collect::<Vec<_>>())
                .constraint(
                    "g",
                    BlockJacobian::Entries(vec![(0, 0, x[1]), (0, 1, x[0]), (1, 2, 3.0 * x[2] * x[2])]),
                ),
        ))
    }
}

fn cubic_problem() -> Problem {
    let mut problem = Problem::new("cubic");
    problem
        .declare_variable(VariableSpec::group("x", 3).bounds(-5.0, 5.0).value([1.0, 2.0, 3.0]))
        .unwrap();
    problem.declare_objective(Objective::minimize("f")).unwrap();
    problem
        .declare_constraint(ConstraintSpec::new("g", 2).entries([(0, 0), (0, 1), (1, 2)]).upper(30.0))
        .unwrap();
    problem
        .declare_constraint(
            ConstraintSpec::new("lin", 1)
                .entries([(0, 0), (0, 2)])
                .linear([1.0, 3.0])
                .lower(1.0),
        )
        .unwrap();
    problem
}

fn analytic() -> GradientConfig {
    GradientConfig::new(Strategy::Analytic)
}

#[test]
fn dense_and_sparse_adapters_agree() {
    let functions = Cubic::default();
    let mut dense = DenseAdapter::new(Stepper::default()).with_gradients(analytic());
    let mut sparse = SparseAdapter::new(SparseStepper::default()).with_gradients(analytic());

    let a = dense
        .solve(&mut cubic_problem(), &functions, SolveRequest::new())
        .unwrap();
    let b = sparse
        .solve(&mut cubic_problem(), &functions, SolveRequest::new())
        .unwrap();

    assert_eq!(a.x, b.x);
    assert_eq!(a.objectives, b.objectives);
    assert_eq!(a.constraints, b.constraints);

    let structure = sparse.backend().structure.as_ref().unwrap();
    for (d, s) in dense.backend().values.iter().zip(&sparse.backend().values) {
        let d = d.derivatives.as_ref().unwrap();
        let s = s.derivatives.as_ref().unwrap();
        assert_eq!(d.jacobian, structure.to_dense(&s.jacobian));
        assert_eq!(d.objectives, s.objectives);
    }
}

#[test]
fn solution_is_reported_in_user_space() {
    let functions = Cubic::default();
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(analytic());

    let solution = adapter
        .solve(&mut cubic_problem(), &functions, SolveRequest::new())
        .unwrap();

    // One step of 0.1 · 2x from [1, 2, 3].
    let expected = [0.8, 1.6, 2.4];
    for (x, e) in solution.x.iter().zip(expected) {
        assert_relative_eq!(*x, e, epsilon = 1e-12);
    }
    assert_relative_eq!(solution.objective(), 0.64 + 2.56 + 5.76, epsilon = 1e-12);
    assert_relative_eq!(solution.constraints[1], 2.4_f64.powi(3), epsilon = 1e-12);
    // Linear rows are computed from their coefficients.
    assert_relative_eq!(solution.constraints[2], 0.8 + 3.0 * 2.4, epsilon = 1e-12);
    assert!(solution.feasible);
    assert!(solution.optimal);
    assert_eq!(solution.evaluations, 2);
    assert_eq!(solution.design["x"], solution.x);
}

#[test]
fn multiple_objectives_need_a_multi_objective_backend() {
    let mut problem = Problem::new("two").multi_objective();
    problem
        .declare_variable(VariableSpec::scalar("x").bounds(0.0, 1.0))
        .unwrap();
    problem.declare_objective(Objective::minimize("a")).unwrap();
    problem.declare_objective(Objective::minimize("b")).unwrap();
    let functions = |x: &Point<'_>| -> Result<FunctionValues, Infallible> {
        let x = x.as_slice()[0];
        Ok(FunctionValues::new().objective("a", x).objective("b", -x))
    };

    let result = DenseAdapter::new(Stepper::default()).solve(&mut problem, &functions, SolveRequest::new());

    assert!(matches!(result, Err(Error::CombinationPolicy { count: 2, .. })));
}

#[test]
fn maximized_objective_is_negated_for_minimize_only_backends() {
    let mut problem = Problem::new("peak");
    problem
        .declare_variable(VariableSpec::scalar("x").bounds(-2.0, 2.0).value(1.0))
        .unwrap();
    problem.declare_objective(Objective::maximize("f")).unwrap();
    let functions = |x: &Point<'_>| -> Result<FunctionValues, Infallible> {
        let x = x.as_slice()[0];
        Ok(FunctionValues::new().objective("f", 3.2 - (x - 1.0).powi(2)))
    };
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(GradientConfig::new(Strategy::central()));

    let solution = adapter.solve(&mut problem, &functions, SolveRequest::new()).unwrap();

    let backend = adapter.backend();
    assert_eq!(backend.seen.as_ref().unwrap().senses, vec![skein_core::Sense::Minimize]);
    assert_relative_eq!(backend.values[0].objectives[0], -3.2);
    assert_relative_eq!(solution.objective(), 3.2, epsilon = 1e-12);
}

#[test]
fn native_backends_keep_the_declared_sense() {
    let mut problem = Problem::new("peak");
    problem
        .declare_variable(VariableSpec::scalar("x").bounds(-2.0, 2.0).value(1.0))
        .unwrap();
    problem.declare_objective(Objective::maximize("f")).unwrap();
    let functions = |_: &Point<'_>| -> Result<FunctionValues, Infallible> {
        Ok(FunctionValues::new().objective("f", 3.2))
    };
    let capabilities = Capabilities {
        objective: ObjectiveConvention::Native,
        ..Capabilities::default()
    };
    let mut adapter = DenseAdapter::new(Stepper::with(capabilities));

    adapter.solve(&mut problem, &functions, SolveRequest::new()).unwrap();

    let backend = adapter.backend();
    assert_eq!(backend.seen.as_ref().unwrap().senses, vec![skein_core::Sense::Maximize]);
    assert_relative_eq!(backend.values[0].objectives[0], 3.2);
}

#[test]
fn unconstrained_problem_gets_a_dummy_row_when_required() {
    let mut problem = Problem::new("free");
    problem
        .declare_variable(VariableSpec::scalar("x").bounds(-2.0, 2.0))
        .unwrap();
    problem.declare_objective(Objective::minimize("f")).unwrap();
    let functions = |x: &Point<'_>| -> Result<FunctionValues, Infallible> {
        Ok(FunctionValues::new().objective("f", x.as_slice()[0].powi(2)))
    };
    let capabilities = Capabilities {
        requires_constraint: true,
        ..Capabilities::default()
    };
    let mut adapter = DenseAdapter::new(Stepper::with(capabilities));

    let solution = adapter.solve(&mut problem, &functions, SolveRequest::new()).unwrap();

    let backend = adapter.backend();
    assert_eq!(backend.seen.as_ref().unwrap().n_constraints(), 1);
    assert_eq!(backend.values[0].constraints.len(), 1);
    assert!(solution.constraints.is_empty());
}

#[test]
fn separate_linear_rows_are_passed_as_a_constant_matrix() {
    let functions = Cubic::default();
    let capabilities = Capabilities {
        linear: LinearHandling::Separate,
        ..Capabilities::default()
    };
    let mut adapter = DenseAdapter::new(Stepper::with(capabilities)).with_gradients(analytic());

    adapter
        .solve(&mut cubic_problem(), &functions, SolveRequest::new())
        .unwrap();

    let seen = adapter.backend().seen.as_ref().unwrap();
    let linear = seen.linear.as_ref().unwrap();
    assert_eq!(linear.matrix.row(0).to_vec(), vec![1.0, 0.0, 3.0]);
    assert_eq!(linear.lower, vec![1.0]);
    assert_eq!(seen.n_constraints(), 2);
}

#[derive(Debug, Error)]
#[error("model diverged")]
struct Diverged;

#[test]
fn user_failure_aborts_with_the_evaluation_index() {
    let mut problem = Problem::new("fragile");
    problem
        .declare_variable(VariableSpec::group("x", 2).bounds(0.0, 10.0).value(5.0))
        .unwrap();
    problem.declare_objective(Objective::minimize("f")).unwrap();
    let functions = |x: &Point<'_>| -> Result<FunctionValues, Diverged> {
        let x = x.as_slice();
        if x[0] < 4.5 {
            return Err(Diverged);
        }
        Ok(FunctionValues::new().objective("f", x[0] * x[0] + x[1] * x[1]))
    };
    let mut failed = None;
    let observer = |event: &Event<'_>| -> Option<Action> {
        if let Event::Failed { index, error, .. } = event {
            failed = Some((*index, error.to_string()));
        }
        None
    };

    let result = DenseAdapter::new(Stepper::default()).solve(
        &mut problem,
        &functions,
        SolveRequest::new().observer(observer),
    );

    assert!(matches!(result, Err(Error::Evaluation { index: 1, .. })));
    assert_eq!(failed, Some((1, "model diverged".to_owned())));
}

#[test]
fn cancelled_token_stops_before_the_first_evaluation() {
    let functions = Cubic::default();
    let token = CancelToken::new();
    token.cancel();

    let solution = DenseAdapter::new(Stepper::default())
        .with_gradients(analytic())
        .solve(&mut cubic_problem(), &functions, SolveRequest::new().cancel(token))
        .unwrap();

    assert_eq!(solution.status, ExitStatus::StoppedByObserver);
    assert_eq!(solution.x, vec![1.0, 2.0, 3.0]);
    // Only the final point is evaluated.
    assert_eq!(solution.evaluations, 1);
}

#[test]
fn hot_start_replays_recorded_evaluations() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cubic.jsonl");
    let mut problem = cubic_problem();
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(analytic());

    let first = Cubic::default();
    problem.freeze().unwrap();
    let mut writer = HistoryWriter::create(&path, &problem.signature()).unwrap();
    let cold = adapter
        .solve(&mut problem, &first, SolveRequest::new().history(&mut writer))
        .unwrap();
    assert_eq!(first.calls.load(Ordering::Relaxed), 2);

    let log = read(&path).unwrap();
    assert_eq!(log.records.len(), 2);
    assert!(log.records.iter().all(|r| r.gradient.is_some()));
    assert_eq!(log.records[1].iteration.map(|i| i.major), Some(1));

    let restart = restart(&path, RestartMode::Exact, &problem.signature()).unwrap();
    let second = Cubic::default();
    let mut replayed = Vec::new();
    let observer = |event: &Event<'_>| -> Option<Action> {
        if let Event::Evaluated { replayed: r, .. } = event {
            replayed.push(*r);
        }
        None
    };
    let hot = adapter
        .solve(
            &mut problem,
            &second,
            SolveRequest::new().observer(observer).hot_start(&restart),
        )
        .unwrap();

    assert_eq!(second.calls.load(Ordering::Relaxed), 0);
    assert_eq!(replayed, vec![true, true]);
    assert_eq!(hot.x, cold.x);
    assert_eq!(hot.objectives, cold.objectives);
}

#[test]
fn exact_restart_starts_from_the_last_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cubic.jsonl");
    let mut problem = cubic_problem();
    let functions = Cubic::default();
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(analytic());

    problem.freeze().unwrap();
    let mut writer = HistoryWriter::create(&path, &problem.signature()).unwrap();
    let cold = adapter
        .solve(&mut problem, &functions, SolveRequest::new().history(&mut writer))
        .unwrap();

    let restart = restart(&path, RestartMode::Exact, &problem.signature()).unwrap();
    adapter
        .solve(&mut problem, &functions, SolveRequest::new().restart(&restart))
        .unwrap();

    assert_eq!(adapter.backend().seen.as_ref().unwrap().x0, cold.x);
}

#[test]
fn exact_restart_rejects_a_changed_problem() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cubic.jsonl");
    let functions = Cubic::default();
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(analytic());

    let mut problem = cubic_problem();
    problem.freeze().unwrap();
    let mut writer = HistoryWriter::create(&path, &problem.signature()).unwrap();
    adapter
        .solve(&mut problem, &functions, SolveRequest::new().history(&mut writer))
        .unwrap();
    let restart = restart(&path, RestartMode::Exact, &problem.signature()).unwrap();

    let mut changed = cubic_problem();
    changed
        .declare_variable(VariableSpec::scalar("extra").bounds(0.0, 1.0))
        .unwrap();
    let result = adapter.solve(&mut changed, &functions, SolveRequest::new().restart(&restart));

    assert!(matches!(
        result,
        Err(Error::Restart(skein_history::RestartUnavailable::SignatureMismatch))
    ));
}

#[test]
fn out_of_bounds_start_is_clipped_with_a_recorded_warning() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("clipped.jsonl");
    let mut problem = Problem::new("clipped");
    problem
        .declare_variable(VariableSpec::group("x", 2).bounds(0.0, 10.0).value([20.0, 3.0]))
        .unwrap();
    problem.declare_objective(Objective::minimize("f")).unwrap();
    problem.freeze().unwrap();
    let functions = |x: &Point<'_>| -> Result<FunctionValues, Infallible> {
        let x = x.as_slice();
        Ok(FunctionValues::new().objective("f", x[0] + x[1]))
    };
    let mut writer = HistoryWriter::create(&path, &problem.signature()).unwrap();
    let mut adapter = DenseAdapter::new(Stepper::default());

    adapter
        .solve(&mut problem, &functions, SolveRequest::new().history(&mut writer))
        .unwrap();

    assert_eq!(adapter.backend().seen.as_ref().unwrap().x0, vec![10.0, 3.0]);
    let log = read(&path).unwrap();
    let clipped: Vec<_> = log
        .records
        .iter()
        .map(|r| r.warnings.iter().filter(|w| w.contains("clipped")).count())
        .collect();
    assert_eq!(clipped, vec![1, 0]);
}

#[test]
fn mis_sized_backend_point_fails_the_solve() {
    let functions = Cubic::default();
    let mut problem = cubic_problem();
    let mut adapter = DenseAdapter::new(ShortPoint::default()).with_gradients(analytic());

    let result = adapter.solve(&mut problem, &functions, SolveRequest::new());

    match result {
        Err(Error::Backend { code, message }) => {
            assert_eq!(code, 0);
            assert!(message.contains("2 variables, expected 3"));
        }
        other => panic!("expected a backend error, got {other:?}"),
    }
    assert_eq!(adapter.backend().outcomes, vec![false, false]);
    assert_eq!(functions.calls.load(Ordering::Relaxed), 0);
}

#[test]
fn hot_start_after_adding_a_constraint_resumes_without_replay() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cubic.jsonl");
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(analytic());

    let mut problem = cubic_problem();
    problem.freeze().unwrap();
    let mut writer = HistoryWriter::create(&path, &problem.signature()).unwrap();
    let cold = adapter
        .solve(&mut problem, &Cubic::default(), SolveRequest::new().history(&mut writer))
        .unwrap();

    let mut extended = cubic_problem();
    extended
        .declare_constraint(
            ConstraintSpec::new("cap", 1)
                .entries([(0, 1)])
                .linear([1.0])
                .upper(4.0),
        )
        .unwrap();
    extended.freeze().unwrap();
    let restart = restart(&path, RestartMode::Exact, &extended.signature()).unwrap();

    let functions = Cubic::default();
    let mut replayed = Vec::new();
    let observer = |event: &Event<'_>| -> Option<Action> {
        if let Event::Evaluated { replayed: r, .. } = event {
            replayed.push(*r);
        }
        None
    };
    adapter
        .solve(
            &mut extended,
            &functions,
            SolveRequest::new().observer(observer).hot_start(&restart),
        )
        .unwrap();

    assert_eq!(adapter.backend().seen.as_ref().unwrap().x0, cold.x);
    assert!(functions.calls.load(Ordering::Relaxed) > 0);
    assert_eq!(replayed, vec![false, false]);
}

#[test]
fn restarted_solve_keeps_recording_into_the_same_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cubic.jsonl");
    let functions = Cubic::default();
    let mut adapter = DenseAdapter::new(Stepper::default()).with_gradients(analytic());

    let mut problem = cubic_problem();
    problem.freeze().unwrap();
    let mut writer = HistoryWriter::create(&path, &problem.signature()).unwrap();
    adapter
        .solve(&mut problem, &functions, SolveRequest::new().history(&mut writer))
        .unwrap();
    drop(writer);

    let restart = restart(&path, RestartMode::Exact, &problem.signature()).unwrap();
    let mut writer = HistoryWriter::append_to(&path, &problem.signature()).unwrap();
    adapter
        .solve(
            &mut problem,
            &functions,
            SolveRequest::new().history(&mut writer).restart(&restart),
        )
        .unwrap();

    let log = read(&path).unwrap();
    let indices: Vec<u64> = log.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(log.records[2].x, log.records[1].x);
}
