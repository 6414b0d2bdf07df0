#![deny(warnings)]

//! Run orchestration for the stock-scenario engine.
//!
//! A run validates its inputs up front, fans per-product computation out
//! across a bounded worker pool, and aggregates the results into a report
//! that preserves the caller's product-selection order. Per-product
//! computation is stateless, so workers share nothing mutable; cancellation
//! is cooperative and checked at product boundaries only, keeping every
//! product's result atomic.

use serde::{Deserialize, Serialize};
use sim_advisor::Thresholds;
use sim_core::{
    validate_config, validate_scenario, Product, ProductId, Scenario, SimulationConfig,
    SimulationResult, ValidationError,
};
use sim_engine::EngineError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle of a simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Products and scenario selected, computation not started.
    Pending,
    /// The engine is computing.
    Running,
    /// Every selected product has an outcome.
    Completed,
    /// Validation failed or the run was cancelled.
    Failed { reason: String },
}

/// Which products were processed before a run was cut short.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartialManifest {
    pub completed: Vec<ProductId>,
    pub abandoned: Vec<ProductId>,
}

/// A product excluded from the aggregate because its data failed the
/// per-product guards. The rest of the run is unaffected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedProduct {
    pub product_id: ProductId,
    pub reason: String,
}

/// Run-level failures.
#[derive(Debug, Error, PartialEq)]
pub enum RunError {
    /// A structural precondition failed; the run never started.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The run was cancelled (or ran out of wall-clock budget) mid-flight.
    #[error("run cancelled: {} completed, {} abandoned",
            .0.completed.len(), .0.abandoned.len())]
    Cancelled(PartialManifest),
    /// The queried product was not part of the run.
    #[error("product `{0}` was not part of the run")]
    NotFound(String),
}

/// Cooperative cancellation flag, checked at product boundaries.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a run needs: an immutable catalog snapshot, the scenario
/// (already snapshotted by value), and the caller's configuration.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub products: Vec<Product>,
    pub scenario: Scenario,
    pub config: SimulationConfig,
}

/// Caller-tunable execution options.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub thresholds: Thresholds,
    /// Optional budget for the whole run; exceeding it cancels at the next
    /// product boundary.
    pub wall_clock_budget: Option<Duration>,
    pub cancel: CancelToken,
}

/// Aggregate totals over the completed results of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_revenue_impact: f64,
    pub total_cost_saving: f64,
    /// Arithmetic mean of projected stockout risk; 0 when nothing completed.
    pub mean_stockout_risk: f64,
    pub products_evaluated: usize,
    pub products_rejected: usize,
}

/// The ordered, queryable output of a completed run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario_id: sim_core::ScenarioId,
    pub status: RunStatus,
    /// One result per completed product, in caller-selection order.
    pub results: Vec<SimulationResult>,
    /// Products rejected by the per-product guards, in caller-selection order.
    pub rejected: Vec<RejectedProduct>,
}

impl RunReport {
    /// Look up a single product's result.
    pub fn get_result(&self, id: &ProductId) -> Result<&SimulationResult, RunError> {
        self.results
            .iter()
            .find(|r| &r.product_id == id)
            .ok_or_else(|| RunError::NotFound(id.0.clone()))
    }

    /// Aggregate totals across completed results.
    pub fn summary(&self) -> RunSummary {
        let total_revenue_impact = self.results.iter().map(|r| r.projected.revenue_impact).sum();
        let total_cost_saving = self.results.iter().map(|r| r.projected.cost_saving).sum();
        let mean_stockout_risk = if self.results.is_empty() {
            0.0
        } else {
            self.results
                .iter()
                .map(|r| r.projected.stockout_risk)
                .sum::<f64>()
                / self.results.len() as f64
        };
        RunSummary {
            total_revenue_impact,
            total_cost_saving,
            mean_stockout_risk,
            products_evaluated: self.results.len(),
            products_rejected: self.rejected.len(),
        }
    }
}

/// Resolve the caller's selection against the catalog snapshot, preserving
/// selection order. Structural problems are fatal; numeric row problems are
/// left for the per-product guards.
fn resolve_selection<'a>(
    products: &'a [Product],
    config: &SimulationConfig,
) -> Result<Vec<&'a Product>, ValidationError> {
    config
        .selected_products
        .iter()
        .map(|id| {
            products
                .iter()
                .find(|p| &p.id == id)
                .ok_or_else(|| ValidationError::UnknownProduct(id.0.clone()))
        })
        .collect()
}

/// Full per-product computation: baseline, projection, optional sampling,
/// advice. Pure with respect to its inputs.
fn evaluate_product(
    product: &Product,
    scenario: &Scenario,
    config: &SimulationConfig,
    thresholds: &Thresholds,
) -> Result<SimulationResult, EngineError> {
    let base = sim_engine::baseline(product)?;
    let projected = sim_engine::project(product, &scenario.parameters, &base);
    let sampling = (config.iterations > 1).then(|| {
        sim_engine::sample(product, &scenario.id, &scenario.parameters, config, &base)
    });
    let advice = sim_advisor::recommend(product, &base, &projected, scenario, config, thresholds);
    Ok(SimulationResult {
        product_id: product.id.clone(),
        current: base,
        projected,
        sampling,
        recommendations: advice.recommendations,
        risk_factors: advice.risk_factors,
        optimal_actions: advice.optimal_actions,
    })
}

fn worker_count(products: usize) -> usize {
    let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    products.clamp(1, hw)
}

/// Execute a run to completion on the calling thread's worker pool.
///
/// Validation failures surface before any computation starts. Cancellation
/// and budget exhaustion return [`RunError::Cancelled`] with a manifest of
/// completed versus abandoned product ids.
pub fn run(request: &RunRequest, options: &RunOptions) -> Result<RunReport, RunError> {
    validate_scenario(&request.scenario)?;
    validate_config(&request.config)?;
    let selection = resolve_selection(&request.products, &request.config)?;

    let n = selection.len();
    let workers = worker_count(n);
    let deadline = options.wall_clock_budget.map(|d| Instant::now() + d);
    info!(
        scenario = %request.scenario.id.0,
        products = n,
        workers,
        iterations = request.config.iterations,
        "simulation run started"
    );

    let next = AtomicUsize::new(0);
    let (result_tx, result_rx) = mpsc::channel::<(usize, Result<SimulationResult, EngineError>)>();

    let mut outcomes: Vec<Option<Result<SimulationResult, EngineError>>> = Vec::new();
    outcomes.resize_with(n, || None);

    thread::scope(|s| {
        for _ in 0..workers {
            let tx = result_tx.clone();
            let next = &next;
            let selection = &selection;
            let scenario = &request.scenario;
            let config = &request.config;
            let thresholds = &options.thresholds;
            let cancel = &options.cancel;
            s.spawn(move || loop {
                if cancel.is_cancelled() {
                    break;
                }
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        break;
                    }
                }
                let i = next.fetch_add(1, Ordering::SeqCst);
                if i >= n {
                    break;
                }
                let product = selection[i];
                debug!(product = %product.id.0, "evaluating product");
                let outcome = evaluate_product(product, scenario, config, thresholds);
                if tx.send((i, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(result_tx);
        for (i, outcome) in result_rx {
            outcomes[i] = Some(outcome);
        }
    });

    let processed = outcomes.iter().filter(|o| o.is_some()).count();
    if processed < n {
        let mut completed = Vec::new();
        let mut abandoned = Vec::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            let id = selection[i].id.clone();
            match outcome {
                Some(_) => completed.push(id),
                None => abandoned.push(id),
            }
        }
        let manifest = PartialManifest {
            completed,
            abandoned,
        };
        warn!(
            scenario = %request.scenario.id.0,
            completed = manifest.completed.len(),
            abandoned = manifest.abandoned.len(),
            "simulation run cancelled"
        );
        return Err(RunError::Cancelled(manifest));
    }

    let mut results = Vec::with_capacity(n);
    let mut rejected = Vec::new();
    for (i, outcome) in outcomes.into_iter().enumerate() {
        match outcome.expect("every selection index was processed") {
            Ok(result) => results.push(result),
            Err(err) => {
                let product_id = selection[i].id.clone();
                warn!(product = %product_id.0, error = %err, "product rejected by guards");
                rejected.push(RejectedProduct {
                    product_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    let report = RunReport {
        scenario_id: request.scenario.id.clone(),
        status: RunStatus::Completed,
        results,
        rejected,
    };
    let summary = report.summary();
    info!(
        scenario = %request.scenario.id.0,
        evaluated = summary.products_evaluated,
        rejected = summary.products_rejected,
        "simulation run completed"
    );
    Ok(report)
}

/// Handle to a run executing on a background thread.
pub struct RunHandle {
    cancel: CancelToken,
    status: Arc<Mutex<RunStatus>>,
    join: Option<thread::JoinHandle<Result<RunReport, RunError>>>,
}

impl RunHandle {
    /// Request cooperative cancellation at the next product boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Observe the run's current lifecycle state.
    pub fn status(&self) -> RunStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Wait for the run to finish and take its outcome.
    pub fn join(mut self) -> Result<RunReport, RunError> {
        let handle = self.join.take().expect("join called twice");
        handle.join().expect("run thread panicked")
    }
}

/// Start a run on a background thread, returning a cancellable handle.
///
/// The status observable through the handle follows the run state machine:
/// `Pending` until validation passes, `Running` while computing, then
/// `Completed` or `Failed`.
pub fn spawn_run(request: RunRequest, options: RunOptions) -> RunHandle {
    let cancel = options.cancel.clone();
    let status = Arc::new(Mutex::new(RunStatus::Pending));
    let status_slot = status.clone();
    let join = thread::spawn(move || {
        // Validate before flipping to Running so a bad request never "starts".
        if let Err(e) = validate_scenario(&request.scenario)
            .and_then(|()| validate_config(&request.config))
            .and_then(|()| resolve_selection(&request.products, &request.config).map(|_| ()))
        {
            *status_slot.lock().expect("status lock poisoned") = RunStatus::Failed {
                reason: e.to_string(),
            };
            return Err(RunError::Validation(e));
        }
        *status_slot.lock().expect("status lock poisoned") = RunStatus::Running;
        let outcome = run(&request, &options);
        *status_slot.lock().expect("status lock poisoned") = match &outcome {
            Ok(_) => RunStatus::Completed,
            Err(e) => RunStatus::Failed {
                reason: e.to_string(),
            },
        };
        outcome
    });
    RunHandle {
        cancel,
        status,
        join: Some(join),
    }
}
