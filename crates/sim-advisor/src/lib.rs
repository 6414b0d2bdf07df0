#![deny(warnings)]

//! Deterministic recommendation rules over projected inventory metrics.
//!
//! `recommend` is referentially transparent: identical inputs always yield
//! identical advice. Monte Carlo variance is reported by the engine as data
//! and never folded into the text produced here.

use serde::{Deserialize, Serialize};
use sim_core::{
    BaselineMetrics, OptimalAction, Priority, Product, ProjectedMetrics, Scenario,
    ScenarioCategory, SimulationConfig,
};
use std::collections::BTreeSet;

/// Tunable decision thresholds for the rule set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thresholds {
    /// Projected stockout risk at or above which an action is high priority.
    pub high_risk: f64,
    /// Projected stockout risk at or above which an action is medium priority.
    pub medium_risk: f64,
    /// Revenue impact at or above which an action is high priority.
    pub revenue_impact_high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            high_risk: 0.6,
            medium_risk: 0.35,
            revenue_impact_high: 10_000.0,
        }
    }
}

/// The advisory output for one product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub recommendations: Vec<String>,
    pub risk_factors: BTreeSet<String>,
    pub optimal_actions: Vec<OptimalAction>,
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Safety stock target: reorder point padded by 20%, rounded up.
pub fn safety_stock_target(reorder_point: i64) -> i64 {
    (reorder_point as f64 * 1.2).ceil() as i64
}

fn tier(risk: f64, revenue_impact: f64, t: &Thresholds) -> Priority {
    if risk >= t.high_risk || revenue_impact >= t.revenue_impact_high {
        Priority::High
    } else if risk >= t.medium_risk || revenue_impact >= t.revenue_impact_high * 0.5 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn recommendations(
    product: &Product,
    baseline: &BaselineMetrics,
    projected: &ProjectedMetrics,
    scenario: &Scenario,
    t: &Thresholds,
) -> Vec<String> {
    let mut out = Vec::new();
    if projected.stockout_risk >= t.medium_risk {
        out.push(format!(
            "Raise safety stock for {} to {} units ahead of '{}'",
            product.name,
            safety_stock_target(product.reorder_point),
            scenario.name
        ));
    }
    if projected.stock <= product.reorder_point as f64 {
        out.push(format!(
            "Expedite replenishment: projected stock {:.0} is at or below the reorder point {}",
            projected.stock, product.reorder_point
        ));
    }
    if product.current_stock > 0 && projected.turnover < 2.0 {
        out.push(format!(
            "Trim incoming purchase orders: projected turnover {:.1}x marks {} as slow-moving",
            projected.turnover, product.name
        ));
    }
    if projected.margin < baseline.margin {
        out.push(format!(
            "Review pricing: margin shifts from {:.1}% to {:.1}% under '{}'",
            baseline.margin * 100.0,
            projected.margin * 100.0,
            scenario.name
        ));
    }
    if out.is_empty() {
        out.push(format!(
            "Hold current policy for {}; projections stay within normal bands",
            product.name
        ));
    }
    out
}

fn risk_factors(
    projected: &ProjectedMetrics,
    scenario: &Scenario,
    config: &SimulationConfig,
    t: &Thresholds,
) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    match scenario.category {
        ScenarioCategory::Demand => {
            out.insert("demand surge volatility".to_string());
        }
        ScenarioCategory::Supply => {
            out.insert("supplier concentration exposure".to_string());
        }
        ScenarioCategory::Seasonal => {
            out.insert("seasonal demand swing".to_string());
        }
        ScenarioCategory::Competitive => {
            if config.include_competition {
                out.insert("competitor price pressure".to_string());
            }
        }
        ScenarioCategory::Economic => {
            out.insert("macro demand softness".to_string());
        }
    }
    if scenario.parameters.supply_disruption > 0.0 {
        out.insert("replenishment orders at risk".to_string());
    }
    if projected.stockout_risk >= t.high_risk {
        out.insert("elevated stockout likelihood".to_string());
    }
    if projected.margin < 0.0 {
        out.insert("negative projected margin".to_string());
    }
    out
}

fn optimal_actions(
    product: &Product,
    projected: &ProjectedMetrics,
    t: &Thresholds,
) -> Vec<OptimalAction> {
    let risk = projected.stockout_risk;
    let revenue_score = clamp01(projected.revenue_impact / t.revenue_impact_high);
    let urgency = risk.max(revenue_score);

    let mut actions = vec![
        OptimalAction {
            action: format!(
                "Adjust inventory position toward {} safety units",
                safety_stock_target(product.reorder_point)
            ),
            priority: tier(risk, projected.revenue_impact, t),
            timeline_days: product.lead_time_days.max(7),
            impact_fraction: clamp01(0.4 + 0.4 * risk + 0.2 * revenue_score),
        },
        OptimalAction {
            action: format!("Negotiate backup supply terms for {}", product.category),
            priority: tier(
                (risk + revenue_score) / 2.0,
                projected.revenue_impact * 0.5,
                t,
            ),
            timeline_days: 30,
            impact_fraction: clamp01(0.2 + 0.3 * risk + 0.3 * revenue_score),
        },
        OptimalAction {
            action: "Automate replenishment triggers for this SKU".to_string(),
            priority: if urgency >= 0.9 {
                Priority::Medium
            } else {
                Priority::Low
            },
            timeline_days: 90,
            impact_fraction: clamp01(0.1 + 0.2 * urgency),
        },
    ];
    // Priority descending; stable sort keeps the fixed action order on ties.
    actions.sort_by_key(|a| a.priority);
    actions
}

/// Produce the full advisory block for one product's projections.
pub fn recommend(
    product: &Product,
    baseline: &BaselineMetrics,
    projected: &ProjectedMetrics,
    scenario: &Scenario,
    config: &SimulationConfig,
    thresholds: &Thresholds,
) -> Advice {
    Advice {
        recommendations: recommendations(product, baseline, projected, scenario, thresholds),
        risk_factors: risk_factors(projected, scenario, config, thresholds),
        optimal_actions: optimal_actions(product, projected, thresholds),
    }
}
