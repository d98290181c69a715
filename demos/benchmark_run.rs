//! Benchmark Run Example
//!
//! Runs a toy fitting package through the full pipeline: adapter registry,
//! configuration enumerator, checkpoint ledger and aggregated report.
//!
//! Run with: cargo run --example benchmark_run

use std::collections::BTreeMap;

use trueno_fit::aggregate::Report;
use trueno_fit::config::BenchmarkOptions;
use trueno_fit::controller::{
    AdapterRegistry, Controller, CostFunction, DerivativeKind, FitSetup, FitStatus, NoDerivative,
};
use trueno_fit::engine::{ConfigurationEnumerator, RuntimeBudget};
use trueno_fit::ledger::LedgerWriter;
use trueno_fit::problem::{Dataset, FittingProblem};

/// Straight-line fitter: closed-form least squares or plain gradient descent.
struct LineFit {
    compatibility: BTreeMap<String, Vec<String>>,
    no_bounds: Vec<String>,
    minimizer: String,
    data: Vec<(f64, f64, f64)>,
    start: Vec<f64>,
    central: bool,
    params: Option<Vec<Vec<f64>>>,
    status: FitStatus,
}

impl LineFit {
    fn new() -> Self {
        Self {
            compatibility: BTreeMap::from([
                ("all".to_string(), vec!["normal-eq".to_string(), "descent".to_string()]),
                ("ls".to_string(), vec!["normal-eq".to_string()]),
                ("general".to_string(), vec!["descent".to_string()]),
            ]),
            no_bounds: vec!["normal-eq".to_string()],
            minimizer: String::new(),
            data: Vec::new(),
            start: Vec::new(),
            central: false,
            params: None,
            status: FitStatus::NotConverged,
        }
    }

    fn objective(&self, p: &[f64]) -> f64 {
        self.data
            .iter()
            .map(|(x, y, e)| ((y - p[0] - p[1] * x) / e).powi(2))
            .sum()
    }

    fn gradient(&self, p: &[f64]) -> [f64; 2] {
        let h = 1e-6;
        let mut g = [0.0; 2];
        for (i, slot) in g.iter_mut().enumerate() {
            let mut up = p.to_vec();
            up[i] += h;
            *slot = if self.central {
                let mut down = p.to_vec();
                down[i] -= h;
                (self.objective(&up) - self.objective(&down)) / (2.0 * h)
            } else {
                (self.objective(&up) - self.objective(p)) / h
            };
        }
        g
    }
}

impl Controller for LineFit {
    fn software(&self) -> &str {
        "linefit"
    }

    fn algorithm_compatibility(&self) -> &BTreeMap<String, Vec<String>> {
        &self.compatibility
    }

    fn no_bounds_minimizers(&self) -> &[String] {
        &self.no_bounds
    }

    fn jacobian_enabled(&self, minimizer: &str) -> bool {
        minimizer == "descent"
    }

    fn supports_derivative(
        &self,
        kind: DerivativeKind,
        method: &str,
        _problem: &FittingProblem,
    ) -> anyhow::Result<()> {
        if method == "analytic" {
            return Err(NoDerivative {
                kind,
                method: method.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn configure(&mut self, setup: &FitSetup<'_>) -> anyhow::Result<()> {
        let dataset = &setup.problem.datasets[0];
        self.minimizer = setup.minimizer.to_string();
        self.data = dataset
            .x
            .iter()
            .zip(&dataset.y)
            .zip(&dataset.e)
            .map(|((x, y), e)| (*x, *y, *e))
            .collect();
        self.start = setup.initial_params().to_vec();
        self.central = setup.jacobian.variant() == "3-point";
        self.params = None;
        Ok(())
    }

    fn prepare(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn fit(&mut self, budget: &RuntimeBudget) -> anyhow::Result<()> {
        if self.minimizer == "normal-eq" {
            let (mut s, mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for (x, y, e) in &self.data {
                let w = 1.0 / (e * e);
                s += w;
                sx += w * x;
                sy += w * y;
                sxx += w * x * x;
                sxy += w * x * y;
            }
            let det = s * sxx - sx * sx;
            anyhow::ensure!(det.abs() > f64::EPSILON, "Singular matrix encountered");
            self.params = Some(vec![vec![(sxx * sy - sx * sxy) / det, (s * sxy - sx * sy) / det]]);
            self.status = FitStatus::Converged;
            return Ok(());
        }

        let mut p = self.start.clone();
        self.status = FitStatus::MaxIterations;
        for iteration in 0..5_000 {
            let g = self.gradient(&p);
            if g[0].hypot(g[1]) < 1e-6 {
                self.status = FitStatus::Converged;
                break;
            }
            p[0] -= 1.5e-3 * g[0];
            p[1] -= 1.5e-3 * g[1];
            if iteration % 500 == 0 {
                tracing::debug!(iteration, cost = self.objective(&p), "descent step");
                budget.check()?;
            }
        }
        self.params = Some(vec![p]);
        Ok(())
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn final_params(&self) -> Option<&[Vec<f64>]> {
        self.params.as_deref()
    }

    fn status(&self) -> FitStatus {
        self.status
    }
}

/// Chi-squared of a straight line.
struct WeightedNlls;

impl CostFunction for WeightedNlls {
    fn name(&self) -> &str {
        "weighted_nlls"
    }

    fn evaluate(&self, problem: &FittingProblem, dataset: usize, params: &[f64]) -> f64 {
        let data = &problem.datasets[dataset];
        data.x
            .iter()
            .zip(&data.y)
            .zip(&data.e)
            .map(|((x, y), e)| ((y - params[0] - params[1] * x) / e).powi(2))
            .sum()
    }
}

fn line(name: &str, intercept: f64, slope: f64) -> anyhow::Result<FittingProblem> {
    let x: Vec<f64> = (0..12).map(f64::from).collect();
    // deterministic wobble in place of noise
    let y = x
        .iter()
        .map(|x| intercept + slope * x + 0.05 * (x * 1.7).sin())
        .collect();
    Ok(FittingProblem::new(
        name,
        vec!["a".to_string(), "b".to_string()],
        vec![vec![0.0, 0.0], vec![intercept * 2.0, slope / 2.0]],
        Dataset::new(x, y, None)?,
    ))
}

fn main() -> anyhow::Result<()> {
    trueno_fit::logging::init("info");
    println!("=== Trueno-Fit Benchmark Run ===\n");

    let results_dir = std::env::temp_dir().join("trueno-fit-demo");
    let options = BenchmarkOptions {
        label: "demo".to_string(),
        software: vec!["linefit".to_string()],
        minimizers: BTreeMap::from([(
            "linefit".to_string(),
            vec!["normal-eq".to_string(), "descent".to_string()],
        )]),
        cost_functions: vec!["weighted_nlls".to_string()],
        jacobian: vec!["analytic".to_string()],
        jacobian_variants: BTreeMap::from([(
            "scipy".to_string(),
            vec!["2-point".to_string(), "3-point".to_string()],
        )]),
        num_runs: 3,
        results_dir,
        ..BenchmarkOptions::default()
    };
    options.validate()?;

    let mut registry = AdapterRegistry::new();
    registry.register_controller("linefit", || Box::new(LineFit::new()));
    registry.register_cost_function("weighted_nlls", || Box::new(WeightedNlls));

    let problems = vec![
        line("gentle", 1.0, 0.5)?,
        line("steep", -2.0, 3.0)?,
        line("boxed", 0.5, 0.25)?.with_bounds(vec![(0.0, 1.0), (0.0, 1.0)]),
    ];

    let mut ledger = LedgerWriter::from_options(&options)?;
    let outcome = ConfigurationEnumerator::new(&options, &registry)
        .with_ledger(&mut ledger)
        .run(problems)?;
    ledger.finalize()?;
    println!("Checkpoint written to {}\n", ledger.path().display());

    let report = Report::from_outcome(&options.label, outcome);
    for category in report.grid.categories() {
        println!("Cost function: {category}");
        let columns = report.grid.columns(category);
        for row in report.grid.rows() {
            println!("  {row}");
            for (column, cell) in columns.iter().zip(report.grid.cells(row, category)) {
                let Some(record) = cell else { continue };
                println!(
                    "    {column:<45} acc={:>9.3e} norm={:>7.3} code={}{}",
                    record.accuracy(),
                    record.norm_accuracy().unwrap_or(f64::INFINITY),
                    record.error_code().code(),
                    if record.is_best() { "  *" } else { "" },
                );
            }
        }
    }
    if !report.failed_problems.is_empty() {
        println!("\nFailed problems: {}", report.failed_problems.join(", "));
    }
    for (software, minimizers) in &report.unselected_minimizers {
        if !minimizers.is_empty() {
            println!("Unselected for {software}: {}", minimizers.join(", "));
        }
    }

    println!("\n=== Run complete ===");
    Ok(())
}
