#![deny(warnings)]

//! Projection math for the stock-scenario engine.
//!
//! This crate provides the pure per-product computation:
//! - baseline metrics from the catalog record alone
//! - closed-form projected metrics under a scenario
//! - an optional seeded Monte Carlo refinement around the projected demand
//!
//! Everything here is deterministic: the sampling loop draws each trial from
//! a private `ChaCha8Rng` seeded from `(product id, scenario id, trial)`, so
//! identical inputs always produce identical output.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sim_core::{
    BaselineMetrics, Product, ProductId, ProjectedMetrics, SamplingSummary, ScenarioId,
    ScenarioParameters, SimulationConfig,
};
use thiserror::Error;

/// Per-product computation failures.
///
/// These reject a single product's result; they never abort a whole run.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// A stock-count field is negative.
    #[error("negative stock count in field `{0}`")]
    NegativeStock(&'static str),
    /// A numeric field is NaN or infinite.
    #[error("non-finite value in field `{0}`")]
    NonFinite(&'static str),
    /// A price failed to convert to a positive finite float.
    #[error("invalid price in field `{0}`")]
    InvalidPrice(&'static str),
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn price_to_f64(price: Decimal, field: &'static str) -> Result<f64, EngineError> {
    let v = price.to_f64().ok_or(EngineError::NonFinite(field))?;
    if !v.is_finite() || v <= 0.0 {
        return Err(EngineError::InvalidPrice(field));
    }
    Ok(v)
}

/// Scenario-independent metrics for a product as it stands today.
///
/// Guards:
/// - zero stock yields zero turnover (no divide-by-zero)
/// - negative stock counts and non-finite demand are rejected per product
///
/// Example:
/// a product with stock 1000, demand 25/day turns over 25*365/1000 ≈ 9.1x.
pub fn baseline(product: &Product) -> Result<BaselineMetrics, EngineError> {
    if product.current_stock < 0 {
        return Err(EngineError::NegativeStock("current_stock"));
    }
    if product.reorder_point < 0 {
        return Err(EngineError::NegativeStock("reorder_point"));
    }
    if !product.daily_demand.is_finite() || product.daily_demand < 0.0 {
        return Err(EngineError::NonFinite("daily_demand"));
    }
    if !product.seasonality_factor.is_finite() || product.seasonality_factor <= 0.0 {
        return Err(EngineError::NonFinite("seasonality_factor"));
    }
    let cost = price_to_f64(product.cost_price, "cost_price")?;
    let selling = price_to_f64(product.selling_price, "selling_price")?;

    let stock = product.current_stock as f64;
    let turnover = if product.current_stock > 0 && product.daily_demand > 0.0 {
        product.daily_demand * 365.0 / stock
    } else {
        0.0
    };
    let margin = (selling - cost) / selling;
    let stockout_risk = if product.current_stock <= product.reorder_point {
        0.8
    } else {
        0.2
    };

    Ok(BaselineMetrics {
        stock,
        turnover,
        margin,
        stockout_risk,
    })
}

/// Closed-form projected metrics under a scenario.
///
/// This is the deterministic fast path; `iterations == 1` runs return these
/// values directly with no sampling.
pub fn project(
    product: &Product,
    params: &ScenarioParameters,
    baseline: &BaselineMetrics,
) -> ProjectedMetrics {
    let stock = baseline.stock;
    let projected_stock = (stock * (1.0 + params.demand_multiplier * 0.1)).max(0.0);
    let projected_turnover = if product.current_stock > 0 {
        product.daily_demand * params.demand_multiplier * 365.0 / stock
    } else {
        0.0
    };
    let projected_margin = baseline.margin * (1.0 + params.price_impact);
    let projected_risk = clamp01(baseline.stockout_risk + params.supply_disruption);

    // Prices were vetted by `baseline`; the fallback is unreachable for any
    // product that produced the baseline passed in here.
    let selling_price = product.selling_price.to_f64().unwrap_or(0.0);
    let cost_price = product.cost_price.to_f64().unwrap_or(0.0);
    let revenue_impact = stock * selling_price * params.demand_multiplier * 0.1;
    let cost_saving = stock * cost_price * 0.05;

    ProjectedMetrics {
        stock: projected_stock,
        turnover: projected_turnover,
        margin: projected_margin,
        stockout_risk: projected_risk,
        revenue_impact,
        cost_saving,
    }
}

/// Deterministic seed for one Monte Carlo trial.
///
/// FNV-1a over the product id, scenario id, and trial index. A stable fold is
/// used instead of `DefaultHasher` because reproducibility must hold across
/// builds, not just within one process.
pub fn trial_seed(product: &ProductId, scenario: &ScenarioId, trial: u32) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut h = OFFSET;
    for b in product.0.bytes() {
        h = (h ^ b as u64).wrapping_mul(PRIME);
    }
    h = (h ^ 0xff).wrapping_mul(PRIME);
    for b in scenario.0.bytes() {
        h = (h ^ b as u64).wrapping_mul(PRIME);
    }
    for b in trial.to_le_bytes() {
        h = (h ^ b as u64).wrapping_mul(PRIME);
    }
    h
}

/// Relative half-width of the per-trial demand noise.
///
/// Derived from the product's seasonality (amplified by the scenario's
/// seasonal boost) and the supply disruption fraction, with the config
/// toggles gating each contribution. Clamped below 1 so a sampled demand
/// can never go negative.
pub fn noise_spread(
    product: &Product,
    params: &ScenarioParameters,
    config: &SimulationConfig,
) -> f64 {
    let seasonal = if config.include_seasonality {
        0.15 * product.seasonality_factor * (1.0 + params.seasonal_boost)
    } else {
        0.15
    };
    let supply = if config.include_supply_chain {
        params.supply_disruption
    } else {
        0.0
    };
    (seasonal + supply).clamp(0.0, 0.95)
}

// Nearest-rank percentile over a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Monte Carlo refinement of the projected stock and stockout risk.
///
/// Draws `config.iterations` independent demand samples around
/// `daily_demand * demand_multiplier` using multiplicative uniform noise,
/// each trial on its own seeded stream, and reports the mean alongside the
/// central `confidence_level` percentile band. Callers skip this entirely
/// when `iterations == 1`.
pub fn sample(
    product: &Product,
    scenario: &ScenarioId,
    params: &ScenarioParameters,
    config: &SimulationConfig,
    baseline: &BaselineMetrics,
) -> SamplingSummary {
    let trials = config.iterations;
    let spread = noise_spread(product, params, config);
    let stock = baseline.stock;

    let mut stocks: Vec<f64> = Vec::with_capacity(trials as usize);
    let mut risks: Vec<f64> = Vec::with_capacity(trials as usize);
    for trial in 0..trials {
        let mut rng = ChaCha8Rng::seed_from_u64(trial_seed(&product.id, scenario, trial));
        let factor = if spread > 0.0 {
            1.0 + rng.gen_range(-spread..=spread)
        } else {
            1.0
        };
        // Effective demand multiplier for this trial.
        let multiplier = params.demand_multiplier * factor;
        let trial_stock = (stock * (1.0 + multiplier * 0.1)).max(0.0);
        let trial_risk = clamp01(baseline.stockout_risk + params.supply_disruption * factor.max(0.0));
        stocks.push(trial_stock);
        risks.push(trial_risk);
    }

    let mean_stock = mean(&stocks);
    let mean_stockout_risk = mean(&risks);
    stocks.sort_by(|a, b| a.total_cmp(b));
    risks.sort_by(|a, b| a.total_cmp(b));

    let alpha = (100.0 - config.confidence_level as f64) / 2.0;
    let stock_band = (percentile(&stocks, alpha), percentile(&stocks, 100.0 - alpha));
    let risk_band = (percentile(&risks, alpha), percentile(&risks, 100.0 - alpha));

    SamplingSummary {
        trials,
        confidence_level: config.confidence_level,
        mean_stock,
        mean_stockout_risk,
        stock_band,
        risk_band,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn product(stock: i64, demand: f64) -> Product {
        Product {
            id: ProductId("rice-5kg".to_string()),
            name: "Basmati Rice 5kg".to_string(),
            category: "staples".to_string(),
            current_stock: stock,
            reorder_point: 200,
            max_stock: 2000,
            daily_demand: demand,
            cost_price: Decimal::new(80, 0),
            selling_price: Decimal::new(100, 0),
            lead_time_days: 7,
            seasonality_factor: 1.0,
        }
    }

    fn surge_params() -> ScenarioParameters {
        ScenarioParameters {
            demand_multiplier: 2.5,
            supply_disruption: 0.1,
            price_impact: 0.15,
            duration_days: 21,
            seasonal_boost: 0.0,
        }
    }

    fn config(iterations: u32) -> SimulationConfig {
        let mut cfg = SimulationConfig::fast(vec![ProductId("rice-5kg".into())]);
        cfg.iterations = iterations;
        cfg
    }

    #[test]
    fn worked_example_matches_documented_values() {
        let p = product(1000, 25.0);
        let base = baseline(&p).unwrap();
        assert_eq!(base.stockout_risk, 0.2); // 1000 > 200
        assert!((base.margin - 0.2).abs() < 1e-12);

        let proj = project(&p, &surge_params(), &base);
        assert!((proj.stock - 1250.0).abs() < 1e-9);
        assert!((proj.revenue_impact - 25_000.0).abs() < 1e-9);
        assert!((proj.stockout_risk - 0.3).abs() < 1e-12);
        assert!((proj.margin - 0.23).abs() < 1e-12);
        assert!((proj.cost_saving - 4_000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_stock_yields_zero_turnover() {
        let p = product(0, 25.0);
        let base = baseline(&p).unwrap();
        assert_eq!(base.turnover, 0.0);
        let proj = project(&p, &surge_params(), &base);
        assert_eq!(proj.turnover, 0.0);
        assert!(proj.stock >= 0.0);
    }

    #[test]
    fn at_or_below_reorder_point_is_high_baseline_risk() {
        let p = product(200, 25.0);
        assert_eq!(baseline(&p).unwrap().stockout_risk, 0.8);
        let p = product(150, 25.0);
        assert_eq!(baseline(&p).unwrap().stockout_risk, 0.8);
        let p = product(201, 25.0);
        assert_eq!(baseline(&p).unwrap().stockout_risk, 0.2);
    }

    #[test]
    fn neutral_scenario_leaves_demand_metrics_unchanged() {
        let p = product(1000, 25.0);
        let base = baseline(&p).unwrap();
        let proj = project(&p, &ScenarioParameters::neutral(30), &base);
        assert_eq!(proj.turnover, base.turnover);
        assert_eq!(proj.margin, base.margin);
        assert_eq!(proj.stockout_risk, base.stockout_risk);
    }

    #[test]
    fn negative_stock_is_rejected_per_product() {
        let p = product(-5, 25.0);
        assert_eq!(baseline(&p), Err(EngineError::NegativeStock("current_stock")));
    }

    #[test]
    fn nan_demand_is_rejected() {
        let p = product(100, f64::NAN);
        assert_eq!(baseline(&p), Err(EngineError::NonFinite("daily_demand")));
    }

    #[test]
    fn trial_seeds_are_stable_and_distinct() {
        let pid = ProductId("rice-5kg".into());
        let sid = ScenarioId("festival-surge".into());
        assert_eq!(trial_seed(&pid, &sid, 0), trial_seed(&pid, &sid, 0));
        assert_ne!(trial_seed(&pid, &sid, 0), trial_seed(&pid, &sid, 1));
        assert_ne!(
            trial_seed(&pid, &sid, 0),
            trial_seed(&ProductId("atta-10kg".into()), &sid, 0)
        );
        assert_ne!(
            trial_seed(&pid, &sid, 0),
            trial_seed(&pid, &ScenarioId("price-war".into()), 0)
        );
    }

    #[test]
    fn sampling_is_reproducible() {
        let p = product(1000, 25.0);
        let base = baseline(&p).unwrap();
        let sid = ScenarioId("festival-surge".into());
        let cfg = config(1000);
        let a = sample(&p, &sid, &surge_params(), &cfg, &base);
        let b = sample(&p, &sid, &surge_params(), &cfg, &base);
        assert_eq!(a, b);
        assert_eq!(a.trials, 1000);
        assert_eq!(a.confidence_level, 95);
    }

    #[test]
    fn sampling_band_brackets_the_mean() {
        let p = product(1000, 25.0);
        let base = baseline(&p).unwrap();
        let sid = ScenarioId("festival-surge".into());
        let s = sample(&p, &sid, &surge_params(), &config(1000), &base);
        assert!(s.stock_band.0 <= s.mean_stock);
        assert!(s.mean_stock <= s.stock_band.1);
        assert!(s.risk_band.0 <= s.mean_stockout_risk);
        assert!(s.mean_stockout_risk <= s.risk_band.1);
        assert!(s.risk_band.0 >= 0.0 && s.risk_band.1 <= 1.0);
    }

    #[test]
    fn wider_confidence_widens_the_band() {
        let p = product(1000, 25.0);
        let base = baseline(&p).unwrap();
        let sid = ScenarioId("festival-surge".into());
        let mut narrow = config(1000);
        narrow.confidence_level = 90;
        let mut wide = config(1000);
        wide.confidence_level = 99;
        let n = sample(&p, &sid, &surge_params(), &narrow, &base);
        let w = sample(&p, &sid, &surge_params(), &wide, &base);
        assert!(w.stock_band.1 - w.stock_band.0 >= n.stock_band.1 - n.stock_band.0);
    }

    #[test]
    fn no_disruption_keeps_sampled_risk_at_the_closed_form() {
        let p = product(1000, 25.0);
        let base = baseline(&p).unwrap();
        let mut params = surge_params();
        params.supply_disruption = 0.0;
        let s = sample(&p, &ScenarioId("x".into()), &params, &config(100), &base);
        let proj = project(&p, &params, &base);
        // With no supply disruption every trial risk equals the closed form.
        assert_eq!(s.risk_band.0, proj.stockout_risk);
        assert_eq!(s.risk_band.1, proj.stockout_risk);
        assert_eq!(s.mean_stockout_risk, proj.stockout_risk);
    }

    proptest! {
        #[test]
        fn projected_stock_never_negative(stock in 0i64..1_000_000,
                                          demand in 0.0f64..500.0,
                                          dm in 0.0f64..10.0,
                                          sd in 0.0f64..=1.0) {
            let p = product(stock, demand);
            let params = ScenarioParameters {
                demand_multiplier: dm,
                supply_disruption: sd,
                price_impact: 0.0,
                duration_days: 30,
                seasonal_boost: 0.0,
            };
            let base = baseline(&p).unwrap();
            let proj = project(&p, &params, &base);
            prop_assert!(proj.stock >= 0.0);
            prop_assert!(proj.stock.is_finite());
        }

        #[test]
        fn risks_stay_in_unit_interval(stock in 0i64..1_000_000,
                                       reorder in 0i64..1_000_000,
                                       sd in 0.0f64..=1.0) {
            let mut p = product(stock, 10.0);
            p.reorder_point = reorder;
            p.max_stock = reorder.max(p.max_stock);
            let mut params = surge_params();
            params.supply_disruption = sd;
            let base = baseline(&p).unwrap();
            prop_assert!((0.0..=1.0).contains(&base.stockout_risk));
            let proj = project(&p, &params, &base);
            prop_assert!((0.0..=1.0).contains(&proj.stockout_risk));
        }

        #[test]
        fn all_outputs_finite(stock in 0i64..10_000_000,
                              demand in 0.0f64..10_000.0,
                              dm in 0.0f64..20.0,
                              pi in -1.0f64..=1.0) {
            let p = product(stock, demand);
            let params = ScenarioParameters {
                demand_multiplier: dm,
                supply_disruption: 0.5,
                price_impact: pi,
                duration_days: 30,
                seasonal_boost: 0.0,
            };
            let base = baseline(&p).unwrap();
            let proj = project(&p, &params, &base);
            for v in [proj.stock, proj.turnover, proj.margin,
                      proj.stockout_risk, proj.revenue_impact, proj.cost_saving] {
                prop_assert!(v.is_finite());
            }
        }
    }
}
