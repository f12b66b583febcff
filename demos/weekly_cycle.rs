//! Prints the weekly cycle chart for every commune of one region as JSON.
//!
//! Expects a directory holding `concentrations`, `emissions` and `population`
//! tables (parquet or CSV):
//!
//! ```sh
//! RUST_LOG=info cargo run --example weekly_cycle -- data "Región del Maule"
//! ```

use calidad_aire::{
    AirQualityError, CachePolicy, Dashboard, LocalWarehouse, Metric, Resolution,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), AirQualityError> {
    env_logger::init();
    let mut args = env::args().skip(1);
    let data_dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));
    let resolution: Resolution = args
        .next()
        .map(|name| name.parse().unwrap())
        .unwrap_or_default();

    let warehouse = LocalWarehouse::from_dir(&data_dir).await?;
    let policy = CachePolicy::builder()
        .time_to_live(Duration::from_secs(24 * 3600))
        .build();
    let dashboard = Dashboard::with_default_cache_folder(warehouse, policy).await?;

    let chart = dashboard
        .weekly_cycle()
        .resolution(resolution.clone())
        .metric(Metric::Concentration)
        .call()
        .await?;
    for series in &chart.data.series {
        println!("{}: {:?}", series.entity, series.mean);
    }

    let emission = dashboard
        .weekly_cycle()
        .resolution(resolution)
        .legend_above(false)
        .call()
        .await?;
    println!("{}", emission.to_json().unwrap());

    Ok(())
}
