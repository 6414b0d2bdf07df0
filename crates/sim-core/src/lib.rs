#![deny(warnings)]

//! Core domain models and invariants for the stock-scenario engine.
//!
//! This crate defines the catalog, scenario, and configuration records the
//! simulation consumes, together with validation helpers that guarantee the
//! documented ranges before a run is allowed to start.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Unique identifier for a catalog product, e.g. "basmati-5kg".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// Unique identifier for a scenario, e.g. "festival-surge".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScenarioId(pub String);

/// A sellable catalog item with its stock economics.
///
/// Stock fields are signed so that pathological upstream records (negative
/// stock) can be detected and rejected per product instead of wrapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier.
    pub id: ProductId,
    /// Human-readable name.
    pub name: String,
    /// Catalog category, e.g. "staples".
    pub category: String,
    /// Units currently on hand (>= 0).
    pub current_stock: i64,
    /// Reorder trigger level in units (>= 0).
    pub reorder_point: i64,
    /// Warehouse ceiling in units (>= reorder_point).
    pub max_stock: i64,
    /// Average units sold per day (>= 0).
    pub daily_demand: f64,
    /// Unit procurement cost (> 0).
    pub cost_price: Decimal,
    /// Unit selling price (> 0; >= cost recommended but not enforced).
    pub selling_price: Decimal,
    /// Replenishment lead time in days.
    pub lead_time_days: u32,
    /// Seasonal demand modulation index (> 0, 1.0 = flat).
    pub seasonality_factor: f64,
}

/// Perturbation family a scenario belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCategory {
    Demand,
    Supply,
    Seasonal,
    Competitive,
    Economic,
}

/// The shared parameter shape for predefined and custom scenarios.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    /// Demand scaling factor (>= 0, 1.0 = neutral).
    pub demand_multiplier: f64,
    /// Fraction of replenishment orders at risk (0..=1).
    pub supply_disruption: f64,
    /// Relative margin shift (typically -1..=1).
    pub price_impact: f64,
    /// How long the perturbation lasts (> 0).
    pub duration_days: u32,
    /// Additional seasonal amplification (>= 0).
    pub seasonal_boost: f64,
}

impl ScenarioParameters {
    /// Parameters that leave every projection unchanged.
    pub fn neutral(duration_days: u32) -> Self {
        Self {
            demand_multiplier: 1.0,
            supply_disruption: 0.0,
            price_impact: 0.0,
            duration_days,
            seasonal_boost: 0.0,
        }
    }
}

/// Provenance of a scenario record.
///
/// Predefined scenarios are immutable constants; custom scenarios carry
/// authorship and are frozen by snapshot at run start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioOrigin {
    Predefined,
    Custom {
        author: String,
        created_at: DateTime<Utc>,
    },
}

/// A named perturbation applied uniformly across the selected products.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    pub description: String,
    pub category: ScenarioCategory,
    pub parameters: ScenarioParameters,
    pub origin: ScenarioOrigin,
}

impl Scenario {
    pub fn is_custom(&self) -> bool {
        matches!(self.origin, ScenarioOrigin::Custom { .. })
    }
}

/// Iteration counts the sampling loop supports. 1 is the closed-form path.
pub const SUPPORTED_ITERATIONS: [u32; 4] = [1, 100, 1_000, 10_000];

/// Confidence levels (percent) the percentile band supports.
pub const SUPPORTED_CONFIDENCE_LEVELS: [u8; 3] = [90, 95, 99];

/// Per-run settings supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Products to evaluate, in the caller's presentation order.
    pub selected_products: Vec<ProductId>,
    /// Projection horizon in days (1..=365).
    pub time_horizon_days: u32,
    /// Monte Carlo trial count; must be a member of [`SUPPORTED_ITERATIONS`].
    pub iterations: u32,
    /// Percentile band width; must be a member of [`SUPPORTED_CONFIDENCE_LEVELS`].
    pub confidence_level: u8,
    pub include_seasonality: bool,
    pub include_competition: bool,
    pub include_supply_chain: bool,
}

impl SimulationConfig {
    /// Closed-form single-pass config over the given selection.
    pub fn fast(selected_products: Vec<ProductId>) -> Self {
        Self {
            selected_products,
            time_horizon_days: 30,
            iterations: 1,
            confidence_level: 95,
            include_seasonality: true,
            include_competition: true,
            include_supply_chain: true,
        }
    }
}

/// Scenario-independent metrics for a product as it stands today.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineMetrics {
    /// Units on hand.
    pub stock: f64,
    /// Annualized demand / stock ratio.
    pub turnover: f64,
    /// (selling - cost) / selling.
    pub margin: f64,
    /// Likelihood of running out within the horizon, in [0,1].
    pub stockout_risk: f64,
}

/// Metrics after the scenario perturbation is applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedMetrics {
    pub stock: f64,
    pub turnover: f64,
    pub margin: f64,
    pub stockout_risk: f64,
    /// Scenario-attributable projected revenue change.
    pub revenue_impact: f64,
    /// Projected procurement saving.
    pub cost_saving: f64,
}

/// Aggregated Monte Carlo output, reported alongside the closed-form values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingSummary {
    pub trials: u32,
    pub confidence_level: u8,
    pub mean_stock: f64,
    pub mean_stockout_risk: f64,
    /// Central percentile band over sampled projected stock (lower, upper).
    pub stock_band: (f64, f64),
    /// Central percentile band over sampled stockout risk (lower, upper).
    pub risk_band: (f64, f64),
}

/// Urgency tier of a recommended action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A ranked recommended intervention.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimalAction {
    pub action: String,
    pub priority: Priority,
    pub timeline_days: u32,
    /// Estimated fraction of the projected impact addressed, in [0,1].
    pub impact_fraction: f64,
}

/// The per-product output of a run. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub product_id: ProductId,
    pub current: BaselineMetrics,
    pub projected: ProjectedMetrics,
    /// Present only when the run sampled (`iterations > 1`).
    pub sampling: Option<SamplingSummary>,
    pub recommendations: Vec<String>,
    pub risk_factors: BTreeSet<String>,
    pub optimal_actions: Vec<OptimalAction>,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Scenario name is empty or whitespace.
    #[error("scenario name must not be empty")]
    EmptyName,
    /// Scenario description is empty or whitespace.
    #[error("scenario description must not be empty")]
    EmptyDescription,
    /// Demand multiplier must be >= 0.
    #[error("demand multiplier {0} is negative")]
    NegativeDemandMultiplier(f64),
    /// Supply disruption must be within [0, 1].
    #[error("supply disruption {0} is outside [0, 1]")]
    SupplyDisruptionOutOfRange(f64),
    /// Scenario duration must be strictly positive.
    #[error("scenario duration must be > 0 days")]
    ZeroDuration,
    /// Numeric field must be finite.
    #[error("non-finite value in field `{0}`")]
    NonFinite(&'static str),
    /// Stock-count field must be non-negative.
    #[error("field `{0}` must not be negative")]
    NegativeStockField(&'static str),
    /// Max stock must be at least the reorder point.
    #[error("max stock is below the reorder point")]
    MaxBelowReorder,
    /// Prices must be strictly positive.
    #[error("field `{0}` must be > 0")]
    NonPositivePrice(&'static str),
    /// Daily demand must be non-negative.
    #[error("daily demand {0} is negative")]
    NegativeDailyDemand(f64),
    /// Seasonality factor must be strictly positive.
    #[error("seasonality factor {0} must be > 0")]
    NonPositiveSeasonality(f64),
    /// A run needs at least one selected product.
    #[error("no products selected")]
    NoProductsSelected,
    /// Selected product ids must be unique.
    #[error("product `{0}` selected more than once")]
    DuplicateProduct(String),
    /// Time horizon must lie in 1..=365 days.
    #[error("time horizon {0} is outside 1..=365 days")]
    HorizonOutOfRange(u32),
    /// Iteration count must be one of the supported values.
    #[error("unsupported iteration count {0}")]
    UnsupportedIterations(u32),
    /// Confidence level must be one of the supported values.
    #[error("unsupported confidence level {0}")]
    UnsupportedConfidence(u8),
    /// A selected product id was not found in the catalog snapshot.
    #[error("product `{0}` not present in catalog snapshot")]
    UnknownProduct(String),
}

/// Validate a catalog product record.
pub fn validate_product(p: &Product) -> Result<(), ValidationError> {
    if p.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if p.current_stock < 0 {
        return Err(ValidationError::NegativeStockField("current_stock"));
    }
    if p.reorder_point < 0 {
        return Err(ValidationError::NegativeStockField("reorder_point"));
    }
    if p.max_stock < p.reorder_point {
        return Err(ValidationError::MaxBelowReorder);
    }
    if !p.daily_demand.is_finite() {
        return Err(ValidationError::NonFinite("daily_demand"));
    }
    if p.daily_demand < 0.0 {
        return Err(ValidationError::NegativeDailyDemand(p.daily_demand));
    }
    if p.cost_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice("cost_price"));
    }
    if p.selling_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice("selling_price"));
    }
    if !p.seasonality_factor.is_finite() {
        return Err(ValidationError::NonFinite("seasonality_factor"));
    }
    if p.seasonality_factor <= 0.0 {
        return Err(ValidationError::NonPositiveSeasonality(p.seasonality_factor));
    }
    Ok(())
}

/// Validate scenario parameters against their documented ranges.
pub fn validate_parameters(p: &ScenarioParameters) -> Result<(), ValidationError> {
    if !p.demand_multiplier.is_finite() {
        return Err(ValidationError::NonFinite("demand_multiplier"));
    }
    if p.demand_multiplier < 0.0 {
        return Err(ValidationError::NegativeDemandMultiplier(p.demand_multiplier));
    }
    if !p.supply_disruption.is_finite() {
        return Err(ValidationError::NonFinite("supply_disruption"));
    }
    if !(0.0..=1.0).contains(&p.supply_disruption) {
        return Err(ValidationError::SupplyDisruptionOutOfRange(p.supply_disruption));
    }
    if !p.price_impact.is_finite() {
        return Err(ValidationError::NonFinite("price_impact"));
    }
    if p.duration_days == 0 {
        return Err(ValidationError::ZeroDuration);
    }
    if !p.seasonal_boost.is_finite() {
        return Err(ValidationError::NonFinite("seasonal_boost"));
    }
    if p.seasonal_boost < 0.0 {
        return Err(ValidationError::NonFinite("seasonal_boost"));
    }
    Ok(())
}

/// Validate a scenario record (name, description, parameters).
pub fn validate_scenario(s: &Scenario) -> Result<(), ValidationError> {
    if s.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if s.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    validate_parameters(&s.parameters)
}

/// Validate a per-run configuration.
pub fn validate_config(c: &SimulationConfig) -> Result<(), ValidationError> {
    if c.selected_products.is_empty() {
        return Err(ValidationError::NoProductsSelected);
    }
    let mut seen: BTreeSet<&ProductId> = BTreeSet::new();
    for id in &c.selected_products {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateProduct(id.0.clone()));
        }
    }
    if !(1..=365).contains(&c.time_horizon_days) {
        return Err(ValidationError::HorizonOutOfRange(c.time_horizon_days));
    }
    if !SUPPORTED_ITERATIONS.contains(&c.iterations) {
        return Err(ValidationError::UnsupportedIterations(c.iterations));
    }
    if !SUPPORTED_CONFIDENCE_LEVELS.contains(&c.confidence_level) {
        return Err(ValidationError::UnsupportedConfidence(c.confidence_level));
    }
    Ok(())
}

/// Build a user-authored scenario.
///
/// Validates name, description, and parameter ranges, stamps authorship, and
/// generates an id. The caller owns storage; nothing is registered globally.
pub fn create_custom_scenario(
    name: &str,
    description: &str,
    category: ScenarioCategory,
    parameters: ScenarioParameters,
    author: &str,
) -> Result<Scenario, ValidationError> {
    let name = name.trim();
    let description = description.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if description.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    validate_parameters(&parameters)?;
    let created_at = Utc::now();
    let id = ScenarioId(format!(
        "custom-{}-{:08x}",
        created_at.timestamp_millis(),
        fold_name(name)
    ));
    Ok(Scenario {
        id,
        name: name.to_string(),
        description: description.to_string(),
        category,
        parameters,
        origin: ScenarioOrigin::Custom {
            author: author.trim().to_string(),
            created_at,
        },
    })
}

// FNV-1a over the name bytes, truncated for the id suffix.
fn fold_name(name: &str) -> u32 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in name.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (h & 0xffff_ffff) as u32
}

fn predefined(
    id: &str,
    name: &str,
    description: &str,
    category: ScenarioCategory,
    parameters: ScenarioParameters,
) -> Scenario {
    Scenario {
        id: ScenarioId(id.to_string()),
        name: name.to_string(),
        description: description.to_string(),
        category,
        parameters,
        origin: ScenarioOrigin::Predefined,
    }
}

/// The built-in scenario set, one per category.
///
/// These are constant data; a malformed entry here is a programming error
/// caught by the unit tests, not a runtime validation failure.
pub fn predefined_scenarios() -> Vec<Scenario> {
    vec![
        predefined(
            "festival-surge",
            "Festival Demand Surge",
            "Short festive window with demand well above trend and mild logistics strain.",
            ScenarioCategory::Demand,
            ScenarioParameters {
                demand_multiplier: 2.5,
                supply_disruption: 0.1,
                price_impact: 0.15,
                duration_days: 21,
                seasonal_boost: 0.3,
            },
        ),
        predefined(
            "supply-disruption",
            "Supply Chain Disruption",
            "A major upstream supplier halts shipments; replenishment is unreliable.",
            ScenarioCategory::Supply,
            ScenarioParameters {
                demand_multiplier: 0.9,
                supply_disruption: 0.6,
                price_impact: 0.05,
                duration_days: 30,
                seasonal_boost: 0.0,
            },
        ),
        predefined(
            "monsoon-season",
            "Monsoon Season",
            "Sustained seasonal demand shift with weather-delayed deliveries.",
            ScenarioCategory::Seasonal,
            ScenarioParameters {
                demand_multiplier: 1.4,
                supply_disruption: 0.2,
                price_impact: 0.0,
                duration_days: 90,
                seasonal_boost: 0.8,
            },
        ),
        predefined(
            "price-war",
            "Competitor Price War",
            "An aggressive competitor discounts across overlapping categories.",
            ScenarioCategory::Competitive,
            ScenarioParameters {
                demand_multiplier: 1.2,
                supply_disruption: 0.0,
                price_impact: -0.25,
                duration_days: 45,
                seasonal_boost: 0.0,
            },
        ),
        predefined(
            "economic-slowdown",
            "Economic Slowdown",
            "Broad demand softness with customers trading down on discretionary items.",
            ScenarioCategory::Economic,
            ScenarioParameters {
                demand_multiplier: 0.7,
                supply_disruption: 0.05,
                price_impact: -0.1,
                duration_days: 120,
                seasonal_boost: 0.0,
            },
        ),
    ]
}

/// Look up a predefined scenario by id.
pub fn predefined_scenario(id: &str) -> Option<Scenario> {
    predefined_scenarios().into_iter().find(|s| s.id.0 == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn product(id: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: format!("Product {id}"),
            category: "staples".to_string(),
            current_stock: 1000,
            reorder_point: 200,
            max_stock: 2000,
            daily_demand: 25.0,
            cost_price: Decimal::new(80, 0),
            selling_price: Decimal::new(100, 0),
            lead_time_days: 7,
            seasonality_factor: 1.0,
        }
    }

    #[test]
    fn serde_roundtrip_product() {
        let p = product("rice-5kg");
        let s = serde_json::to_string(&p).unwrap();
        let back: Product = serde_json::from_str(&s).unwrap();
        assert_eq!(back.id.0, "rice-5kg");
        assert_eq!(back.current_stock, 1000);
    }

    #[test]
    fn serde_roundtrip_scenario() {
        let s = predefined_scenario("festival-surge").unwrap();
        let text = serde_json::to_string_pretty(&s).unwrap();
        let back: Scenario = serde_json::from_str(&text).unwrap();
        assert_eq!(back, s);
        assert!(!back.is_custom());
    }

    #[test]
    fn predefined_constants_are_valid() {
        let all = predefined_scenarios();
        assert_eq!(all.len(), 5);
        for s in &all {
            validate_scenario(s).unwrap();
            assert_eq!(s.origin, ScenarioOrigin::Predefined);
        }
        // One per category.
        let categories: BTreeSet<_> = all.iter().map(|s| format!("{:?}", s.category)).collect();
        assert_eq!(categories.len(), 5);
    }

    #[test]
    fn custom_scenario_rejects_empty_name() {
        let err = create_custom_scenario(
            "",
            "desc",
            ScenarioCategory::Demand,
            ScenarioParameters::neutral(7),
            "ops",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);

        let err = create_custom_scenario(
            "   ",
            "desc",
            ScenarioCategory::Demand,
            ScenarioParameters::neutral(7),
            "ops",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);
    }

    #[test]
    fn custom_scenario_rejects_empty_description() {
        let err = create_custom_scenario(
            "Flash sale",
            " ",
            ScenarioCategory::Demand,
            ScenarioParameters::neutral(7),
            "ops",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyDescription);
    }

    #[test]
    fn custom_scenario_rejects_bad_parameters() {
        let mut params = ScenarioParameters::neutral(7);
        params.demand_multiplier = -0.5;
        let err = create_custom_scenario(
            "Flash sale",
            "desc",
            ScenarioCategory::Demand,
            params,
            "ops",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::NegativeDemandMultiplier(-0.5));

        let mut params = ScenarioParameters::neutral(7);
        params.duration_days = 0;
        let err = create_custom_scenario(
            "Flash sale",
            "desc",
            ScenarioCategory::Demand,
            params,
            "ops",
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::ZeroDuration);
    }

    #[test]
    fn custom_scenario_is_tagged_with_author() {
        let s = create_custom_scenario(
            "Flash sale",
            "48h doorbuster event",
            ScenarioCategory::Demand,
            ScenarioParameters::neutral(2),
            "ops-team",
        )
        .unwrap();
        assert!(s.is_custom());
        assert!(s.id.0.starts_with("custom-"));
        match s.origin {
            ScenarioOrigin::Custom { ref author, .. } => assert_eq!(author, "ops-team"),
            ScenarioOrigin::Predefined => panic!("expected custom origin"),
        }
    }

    #[test]
    fn config_requires_products() {
        let cfg = SimulationConfig::fast(vec![]);
        assert_eq!(validate_config(&cfg), Err(ValidationError::NoProductsSelected));
    }

    #[test]
    fn config_rejects_duplicates_and_bad_ranges() {
        let dup = SimulationConfig::fast(vec![
            ProductId("a".into()),
            ProductId("a".into()),
        ]);
        assert_eq!(
            validate_config(&dup),
            Err(ValidationError::DuplicateProduct("a".into()))
        );

        let mut cfg = SimulationConfig::fast(vec![ProductId("a".into())]);
        cfg.time_horizon_days = 0;
        assert_eq!(validate_config(&cfg), Err(ValidationError::HorizonOutOfRange(0)));

        let mut cfg = SimulationConfig::fast(vec![ProductId("a".into())]);
        cfg.time_horizon_days = 366;
        assert_eq!(validate_config(&cfg), Err(ValidationError::HorizonOutOfRange(366)));

        let mut cfg = SimulationConfig::fast(vec![ProductId("a".into())]);
        cfg.iterations = 37;
        assert_eq!(validate_config(&cfg), Err(ValidationError::UnsupportedIterations(37)));

        let mut cfg = SimulationConfig::fast(vec![ProductId("a".into())]);
        cfg.confidence_level = 80;
        assert_eq!(validate_config(&cfg), Err(ValidationError::UnsupportedConfidence(80)));
    }

    #[test]
    fn product_validation_catches_bad_rows() {
        let mut p = product("a");
        p.current_stock = -1;
        assert_eq!(
            validate_product(&p),
            Err(ValidationError::NegativeStockField("current_stock"))
        );

        let mut p = product("a");
        p.max_stock = 100; // below reorder_point of 200
        assert_eq!(validate_product(&p), Err(ValidationError::MaxBelowReorder));

        let mut p = product("a");
        p.cost_price = Decimal::ZERO;
        assert_eq!(
            validate_product(&p),
            Err(ValidationError::NonPositivePrice("cost_price"))
        );

        let mut p = product("a");
        p.daily_demand = f64::NAN;
        assert_eq!(validate_product(&p), Err(ValidationError::NonFinite("daily_demand")));
    }

    proptest! {
        #[test]
        fn parameters_in_range_validate(dm in 0.0f64..10.0,
                                        sd in 0.0f64..=1.0,
                                        pi in -1.0f64..=1.0,
                                        days in 1u32..365,
                                        boost in 0.0f64..3.0) {
            let p = ScenarioParameters {
                demand_multiplier: dm,
                supply_disruption: sd,
                price_impact: pi,
                duration_days: days,
                seasonal_boost: boost,
            };
            prop_assert!(validate_parameters(&p).is_ok());
        }

        #[test]
        fn negative_multiplier_always_rejected(dm in -10.0f64..-0.0001) {
            let mut p = ScenarioParameters::neutral(7);
            p.demand_multiplier = dm;
            prop_assert!(validate_parameters(&p).is_err());
        }
    }
}
