#![deny(warnings)]

//! Headless CLI: runs one scenario over a demo catalog and prints the
//! aggregate summary.

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use sim_core::{predefined_scenario, Product, ProductId, SimulationConfig};
use sim_runtime::{run, RunOptions, RunRequest};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    scenario: String,
    iterations: u32,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        scenario: "festival-surge".to_string(),
        iterations: 1,
        json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => {
                if let Some(s) = it.next() {
                    args.scenario = s;
                }
            }
            "--iterations" => {
                if let Some(n) = it.next().and_then(|s| s.parse().ok()) {
                    args.iterations = n;
                }
            }
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn demo_catalog() -> Vec<Product> {
    let item = |id: &str, name: &str, stock, reorder, max, demand| Product {
        id: ProductId(id.to_string()),
        name: name.to_string(),
        category: "staples".to_string(),
        current_stock: stock,
        reorder_point: reorder,
        max_stock: max,
        daily_demand: demand,
        cost_price: Decimal::new(80, 0),
        selling_price: Decimal::new(100, 0),
        lead_time_days: 7,
        seasonality_factor: 1.2,
    };
    vec![
        item("rice-5kg", "Basmati Rice 5kg", 1000, 200, 4000, 25.0),
        item("atta-10kg", "Whole Wheat Atta 10kg", 350, 150, 2000, 12.0),
        item("oil-1l", "Sunflower Oil 1L", 180, 200, 1500, 30.0),
        item("sugar-1kg", "Sugar 1kg", 620, 100, 2500, 18.0),
    ]
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(scenario = %args.scenario, iterations = args.iterations, "starting CLI");

    let scenario = predefined_scenario(&args.scenario)
        .ok_or_else(|| anyhow!("unknown scenario `{}`", args.scenario))?;
    let products = demo_catalog();
    let mut config = SimulationConfig::fast(products.iter().map(|p| p.id.clone()).collect());
    config.iterations = args.iterations;

    let request = RunRequest {
        products,
        scenario,
        config,
    };
    let report = run(&request, &RunOptions::default())?;
    let summary = report.summary();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Run OK | scenario: {} | products: {} | rejected: {}",
            report.scenario_id.0, summary.products_evaluated, summary.products_rejected
        );
        println!(
            "Totals | revenue impact: ${:.2} | cost saving: ${:.2} | mean stockout risk: {:.1}%",
            summary.total_revenue_impact,
            summary.total_cost_saving,
            summary.mean_stockout_risk * 100.0
        );
        for r in &report.results {
            println!(
                "{:12} | stock {:>7.0} -> {:>7.0} | risk {:.2} -> {:.2} | {}",
                r.product_id.0,
                r.current.stock,
                r.projected.stock,
                r.current.stockout_risk,
                r.projected.stockout_risk,
                r.recommendations.first().map(String::as_str).unwrap_or("-")
            );
        }
    }

    Ok(())
}
