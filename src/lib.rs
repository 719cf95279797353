pub mod calculus;
pub mod config;
pub mod expr;
pub mod graph;
pub mod history;
pub mod kernel;
pub mod plot;

use std::collections::BTreeMap;

use serde_json::json;
use thiserror::Error;

// Re-exporting core types for easier access by callers.
pub use config::{load_config, EngineConfig};
pub use expr::{EvalError, Evaluator, Scope};
pub use graph::{Distance, Graph, GraphError, GraphMetrics};
pub use history::{History, HistoryRecord, MemoryStorage, ProjectSnapshot, Storage, Tab};
pub use kernel::{InverseTrace, Matrix, RrefTrace};
pub use plot::{CurveSample, SurfaceSample};

// --- Errors ---

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Expression is empty")]
    EmptyExpression,

    #[error(transparent)]
    Evaluation(#[from] EvalError),

    #[error("Derivative is undefined at x = {x}")]
    UndefinedDerivative { x: f64 },

    #[error("Integral is undefined on [{a}, {b}]")]
    UndefinedIntegral { a: f64, b: f64 },

    #[error("Invalid matrix: {0}")]
    MatrixParse(String),

    #[error("Dimension mismatch for {op}: {left:?} vs {right:?}")]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("Matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("Matrix is singular")]
    SingularMatrix,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

// --- Engine Facade ---

/// Owns the evaluator, configuration and result history.
///
/// Every successful computation stores the tab's input and appends a history
/// record. Failed computations leave both untouched.
pub struct MathEngine {
    evaluator: Evaluator,
    config: EngineConfig,
    history: History,
    inputs: BTreeMap<Tab, String>,
}

impl Default for MathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MathEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        MathEngine {
            evaluator: Evaluator::new(),
            history: History::with_capacity(config.history.capacity),
            config,
            inputs: BTreeMap::new(),
        }
    }

    /// Replaces the evaluator, e.g. one carrying extra constants.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn input(&self, tab: Tab) -> Option<&str> {
        self.inputs.get(&tab).map(String::as_str)
    }

    pub fn set_input(&mut self, tab: Tab, text: impl Into<String>) {
        self.inputs.insert(tab, text.into());
    }

    fn record(&mut self, tab: Tab, input: String, output: serde_json::Value) -> EngineResult<()> {
        self.history.add_record(tab, input.clone(), output)?;
        self.inputs.insert(tab, input);
        Ok(())
    }

    fn display(&self, value: f64) -> String {
        kernel::format_value_with(value, self.config.matrix.display_decimals)
    }

    fn display_matrix(&self, m: &Matrix) -> String {
        kernel::format_matrix_with(m, self.config.matrix.display_decimals)
    }

    pub fn evaluate(&mut self, expression: &str, scope: &Scope) -> EngineResult<f64> {
        let value = self.evaluator.evaluate(expression, scope)?;
        let output = json!({ "value": value, "display": self.display(value), "scope": scope });
        self.record(Tab::Evaluate, expression.to_string(), output)?;
        Ok(value)
    }

    pub fn derivative(&mut self, expression: &str, x: f64) -> EngineResult<f64> {
        let h = self.config.calculus.derivative_step;
        let slope = calculus::numeric_derivative(&self.evaluator, expression, x, h)?;
        let output = json!({ "x": x, "value": slope, "display": self.display(slope) });
        self.record(Tab::Derivative, expression.to_string(), output)?;
        Ok(slope)
    }

    pub fn integral(&mut self, expression: &str, a: f64, b: f64) -> EngineResult<f64> {
        let n = self.config.calculus.integral_intervals;
        let area = calculus::numeric_integral(&self.evaluator, expression, a, b, n)?;
        let output = json!({
            "a": a,
            "b": b,
            "intervals": calculus::simpson_intervals(n),
            "value": area,
            "display": self.display(area),
        });
        self.record(Tab::Integral, expression.to_string(), output)?;
        Ok(area)
    }

    fn record_matrix(&mut self, input: String, operation: &str, result: &Matrix) -> EngineResult<()> {
        let output = json!({
            "operation": operation,
            "rows": kernel::to_rows(result),
            "display": self.display_matrix(result),
        });
        self.record(Tab::Matrix, input, output)
    }

    pub fn matrix_add(&mut self, a: &str, b: &str) -> EngineResult<Matrix> {
        let sum = kernel::add(&kernel::parse_matrix(a)?, &kernel::parse_matrix(b)?)?;
        self.record_matrix(format!("{}\n+\n{}", a, b), "add", &sum)?;
        Ok(sum)
    }

    pub fn matrix_multiply(&mut self, a: &str, b: &str) -> EngineResult<Matrix> {
        let product = kernel::multiply(&kernel::parse_matrix(a)?, &kernel::parse_matrix(b)?)?;
        self.record_matrix(format!("{}\n*\n{}", a, b), "multiply", &product)?;
        Ok(product)
    }

    pub fn determinant(&mut self, text: &str) -> EngineResult<f64> {
        let m = kernel::parse_matrix(text)?;
        let det = kernel::determinant(&m, self.config.matrix.pivot_tolerance)?;
        let output = json!({ "operation": "determinant", "value": det, "display": self.display(det) });
        self.record(Tab::Matrix, text.to_string(), output)?;
        Ok(det)
    }

    pub fn inverse(&mut self, text: &str) -> EngineResult<Matrix> {
        let m = kernel::parse_matrix(text)?;
        let inv = kernel::inverse(&m, self.config.matrix.pivot_tolerance)?;
        self.record_matrix(text.to_string(), "inverse", &inv)?;
        Ok(inv)
    }

    pub fn inverse_with_steps(&mut self, text: &str) -> EngineResult<InverseTrace> {
        let m = kernel::parse_matrix(text)?;
        let trace = kernel::inverse_with_steps(&m, self.config.matrix.pivot_tolerance)?;
        self.record_matrix(text.to_string(), "inverse", &trace.inverse)?;
        Ok(trace)
    }

    pub fn rref(&mut self, text: &str) -> EngineResult<RrefTrace> {
        let m = kernel::parse_matrix(text)?;
        let trace = kernel::rref_with_steps(&m, self.config.matrix.pivot_tolerance);
        let steps: Vec<&str> = trace.steps.iter().map(|s| s.description.as_str()).collect();
        let output = json!({
            "operation": "rref",
            "rows": kernel::to_rows(&trace.result),
            "display": self.display_matrix(&trace.result),
            "rank": trace.rank(),
            "steps": steps,
        });
        self.record(Tab::Matrix, text.to_string(), output)?;
        Ok(trace)
    }

    pub fn graph_metrics(&mut self, graph: &Graph) -> EngineResult<GraphMetrics> {
        let metrics = graph::graph_metrics(graph);
        let output = serde_json::to_value(&metrics)?;
        self.record(Tab::Graph, serde_json::to_string(graph)?, output)?;
        Ok(metrics)
    }

    pub fn plot_curve(&mut self, expression: &str, x_min: f64, x_max: f64) -> EngineResult<CurveSample> {
        let points = self.config.plot.curve_points;
        let curve = plot::sample_curve(&self.evaluator, expression, x_min, x_max, points)?;
        let output = json!({
            "kind": "curve",
            "range": [x_min, x_max],
            "points": points,
            "defined": curve.defined_points(),
        });
        self.record(Tab::Plot, expression.to_string(), output)?;
        Ok(curve)
    }

    pub fn plot_surface(
        &mut self,
        expression: &str,
        x_range: (f64, f64),
        y_range: (f64, f64),
    ) -> EngineResult<SurfaceSample> {
        let resolution = self.config.plot.surface_resolution;
        let surface = plot::sample_surface(&self.evaluator, expression, x_range, y_range, resolution)?;
        let output = json!({
            "kind": "surface",
            "x_range": [x_range.0, x_range.1],
            "y_range": [y_range.0, y_range.1],
            "resolution": resolution,
        });
        self.record(Tab::Plot, expression.to_string(), output)?;
        Ok(surface)
    }

    /// Captures tab inputs and history for saving or sharing.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot::new(self.inputs.clone(), &self.history)
    }

    /// Replaces tab inputs and history with the snapshot's contents.
    pub fn restore(&mut self, snapshot: &ProjectSnapshot) {
        self.inputs = snapshot.inputs.clone();
        self.history = snapshot.history(self.config.history.capacity);
        tracing::debug!(records = self.history.len(), "restored project snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_e2e_evaluate_records_history() {
        let mut engine = MathEngine::new();
        let value = engine.evaluate("2 × 3 + x", &Scope::new().with("x", 1.0)).unwrap();
        assert_eq!(value, 7.0);

        let record = engine.history().latest().unwrap();
        assert_eq!(record.tab, Tab::Evaluate);
        assert_eq!(record.input, "2 × 3 + x");
        assert_eq!(record.output["display"], "7");
        assert_eq!(engine.input(Tab::Evaluate), Some("2 × 3 + x"));
    }

    #[test]
    fn test_e2e_failures_leave_history_untouched() {
        let mut engine = MathEngine::new();
        assert!(matches!(
            engine.evaluate("5/0", &Scope::new()).unwrap_err(),
            EngineError::Evaluation(EvalError::DivisionByZero)
        ));
        assert!(engine.determinant("1 2 3").is_err());
        assert!(engine.inverse("1 2; 2 4").is_err());
        assert!(engine.history().is_empty());
        assert_eq!(engine.input(Tab::Evaluate), None);
    }

    #[test]
    fn test_e2e_calculus() {
        let mut engine = MathEngine::new();
        let slope = engine.derivative("x^2", 3.0).unwrap();
        assert!((slope - 6.0).abs() < 1e-3);
        let area = engine.integral("1", 0.0, 5.0).unwrap();
        assert!((area - 5.0).abs() < 1e-9);
        assert_eq!(engine.history().latest().unwrap().output["intervals"], 200);
    }

    #[test]
    fn test_e2e_configured_intervals_are_used() {
        let config = EngineConfig::from_toml("[calculus]\nintegral_intervals = 7\n").unwrap();
        let mut engine = MathEngine::with_config(config);
        engine.integral("x", 0.0, 1.0).unwrap();
        assert_eq!(engine.history().latest().unwrap().output["intervals"], 8);
    }

    #[test]
    fn test_e2e_matrix_operations() {
        let mut engine = MathEngine::new();
        let sum = engine.matrix_add("1 2; 3 4", "1 1; 1 1").unwrap();
        assert_eq!(kernel::to_rows(&sum), vec![vec![2.0, 3.0], vec![4.0, 5.0]]);

        let product = engine.matrix_multiply("1 2; 3 4", "1 0; 0 1").unwrap();
        assert_eq!(kernel::to_rows(&product), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let det = engine.determinant("1 2\n3 4").unwrap();
        assert!((det + 2.0).abs() < 1e-12);

        let inv = engine.inverse("4 7; 2 6").unwrap();
        assert!((inv[(0, 0)] - 0.6).abs() < 1e-12);
        assert_eq!(engine.history().latest().unwrap().output["display"], "0.6 -0.7\n-0.2 0.4");

        let trace = engine.rref("1 2; 2 4").unwrap();
        assert_eq!(trace.rank(), 1);
        assert_eq!(engine.history().latest().unwrap().output["rank"], 1);

        let traced = engine.inverse_with_steps("2 0; 0 4").unwrap();
        assert!((traced.inverse[(1, 1)] - 0.25).abs() < 1e-12);

        assert_eq!(engine.history().len(), 6);
        assert!(engine.history().verify_links().unwrap());
    }

    #[test]
    fn test_e2e_graph_metrics() {
        let mut engine = MathEngine::new();
        let mut g = Graph::new();
        for id in ["1", "2", "3", "4"] {
            g.add_node(id).unwrap();
        }
        g.add_edge("1", "2").unwrap();
        g.add_edge("2", "3").unwrap();
        g.add_edge("3", "4").unwrap();

        let metrics = engine.graph_metrics(&g).unwrap();
        assert_eq!(metrics.diameter, 3);
        assert_eq!(metrics.radius, 2);
        assert!((metrics.average_distance - 10.0 / 6.0).abs() < 1e-9);

        let record = engine.history().latest().unwrap();
        assert_eq!(record.tab, Tab::Graph);
        assert_eq!(record.output["diameter"], 3);
        let restored: Graph = serde_json::from_str(&record.input).unwrap();
        assert_eq!(restored, g);
    }

    #[test]
    fn test_e2e_plotting() {
        let config = EngineConfig::from_toml("[plot]\ncurve_points = 11\nsurface_resolution = 4\n").unwrap();
        let mut engine = MathEngine::with_config(config);
        let curve = engine.plot_curve("x^2", -1.0, 1.0).unwrap();
        assert_eq!(curve.x.len(), 11);
        let surface = engine.plot_surface("x*y", (0.0, 1.0), (0.0, 1.0)).unwrap();
        assert_eq!(surface.z.dim(), (4, 4));
        assert_eq!(engine.history().by_tab(Tab::Plot).count(), 2);
    }

    #[test]
    fn test_e2e_snapshot_round_trip() {
        let mut engine = MathEngine::new().with_evaluator(Evaluator::new().with_constant("k", 4.0));
        engine.evaluate("k * 2", &Scope::new()).unwrap();
        engine.set_input(Tab::Matrix, "1 2; 3 4");

        let mut storage = MemoryStorage::new();
        engine.snapshot().save(&mut storage, "project").unwrap();

        let mut fresh = MathEngine::new();
        let snapshot = ProjectSnapshot::load(&storage, "project").unwrap().unwrap();
        fresh.restore(&snapshot);
        assert_eq!(fresh.input(Tab::Matrix), Some("1 2; 3 4"));
        assert_eq!(fresh.input(Tab::Evaluate), Some("k * 2"));
        assert_eq!(fresh.history().len(), 1);
        assert_eq!(fresh.history().latest().unwrap().output["value"], 8.0);
    }

    #[test]
    fn test_e2e_restored_history_keeps_valid_links() {
        let mut engine = MathEngine::new();
        for i in 1..300 {
            let k = i % 30 - 15;
            engine
                .evaluate(&format!("sin({}) * 10^({})", i, k), &Scope::new())
                .unwrap();
        }

        let json = engine.snapshot().to_json().unwrap();
        let mut fresh = MathEngine::new();
        fresh.restore(&ProjectSnapshot::from_json(&json).unwrap());
        assert_eq!(fresh.history().len(), 100);
        assert!(fresh.history().verify_links().unwrap());
    }

    #[test]
    fn test_history_capacity_from_config() {
        let config = EngineConfig::from_toml("[history]\ncapacity = 2\n").unwrap();
        let mut engine = MathEngine::with_config(config);
        for i in 0..4 {
            engine.evaluate(&format!("{} + 1", i), &Scope::new()).unwrap();
        }
        assert_eq!(engine.history().len(), 2);
        engine.clear_history();
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::DimensionMismatch {
            op: "addition",
            left: (2, 2),
            right: (1, 3),
        };
        assert_eq!(err.to_string(), "Dimension mismatch for addition: (2, 2) vs (1, 3)");
        assert_eq!(
            EngineError::from(EvalError::UnknownVariable("y".into())).to_string(),
            "Unknown variable: y"
        );
        assert_eq!(
            EngineError::NotSquare { rows: 2, cols: 3 }.to_string(),
            "Matrix must be square, got 2x3"
        );
    }
}
