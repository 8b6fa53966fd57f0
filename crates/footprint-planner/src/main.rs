//! Footprint Planning CLI
//!
//! Runs one planning pass against a footprint engine.
//!
//! Usage:
//!   plan-footprints --tree data/sensor_tree.json \
//!                   --elements data/elements.txt \
//!                   --feed https://celestrak.org/NORAD/elements/stations.txt \
//!                   --select sat-25544 --select sensor-7 \
//!                   --area 100,20,120,40 --days 3 \
//!                   --output plan.json --geojson

use anyhow::{Context, Result};
use clap::Parser;
use footprint_planner::{
    aggregate, export, fetch_feeds, HttpFootprintEngine, PlannerConfig, PlanningArea,
    PlanningSession,
};
use orbital_elements::parse_bulk;
use sensor_tree::loader;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "plan-footprints",
    about = "Compute sensor footprint regions over a planning area"
)]
struct Args {
    /// Sensor tree JSON (flat node list or satellite catalog)
    #[arg(short, long, default_value = "data/sensor_tree.json")]
    tree: PathBuf,

    /// 3-line element text to apply to the tree before planning
    #[arg(short, long)]
    elements: Option<PathBuf>,

    /// Element feed URL to fetch and apply (repeatable)
    #[arg(long = "feed")]
    feeds: Vec<String>,

    /// Node id to check (repeatable; satellites select all their sensors)
    #[arg(short, long = "select")]
    select: Vec<String>,

    /// Planning area as minLon,minLat,maxLon,maxLat
    #[arg(short, long, value_parser = parse_area, allow_hyphen_values = true)]
    area: Option<PlanningArea>,

    /// Horizon in days (overrides the config file)
    #[arg(short, long)]
    days: Option<u32>,

    /// Footprint engine base URL
    #[arg(long, default_value = "http://localhost:8090", env = "FOOTPRINT_ENGINE_URL")]
    engine_url: String,

    /// Planner config JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long, default_value = "plan.json")]
    output: PathBuf,

    /// Also output GeoJSON
    #[arg(long)]
    geojson: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_area(s: &str) -> std::result::Result<PlanningArea, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid coordinate: {}", e))?;

    let &[min_lon, min_lat, max_lon, max_lat] = values.as_slice() else {
        return Err(format!("expected 4 values, got {}", values.len()));
    };

    let area = PlanningArea::new(min_lon, min_lat, max_lon, max_lat);
    if !area.is_well_formed() {
        return Err("area must satisfy minLon < maxLon and minLat < maxLat within range".into());
    }
    Ok(area)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Footprint Planner");
    info!("{}", "=".repeat(60));

    let config = match &args.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };

    let mut tree = loader::load_tree(&args.tree)?;
    info!(
        "Loaded {} nodes ({} satellites)",
        tree.len(),
        tree.satellites().count()
    );

    if let Some(path) = &args.elements {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading elements from {:?}", path))?;
        let batch = parse_bulk(&text)?;
        for record in &batch.records {
            match record.element_epoch() {
                Ok(epoch) => debug!("{}: element epoch {}", record.catalog_id, epoch),
                Err(e) => debug!("{}: {}", record.catalog_id, e),
            }
        }
        let update = tree.apply_elements(&batch.records);
        info!(
            "Elements applied: {} updated, {} skipped, {} unmatched",
            update.updated,
            update.skipped,
            update.not_found.len()
        );
    }

    if !args.feeds.is_empty() {
        let fetch = fetch_feeds(&reqwest::Client::new(), &args.feeds).await;
        for site in &fetch.failed_sites {
            warn!("  feed failed: {}", site);
        }
        let update = tree.apply_elements(&fetch.records);
        info!(
            "Feeds applied: {} of {} sites, {} updated, {} skipped, {} unmatched",
            fetch.sites_fetched,
            args.feeds.len(),
            update.updated,
            update.skipped,
            update.not_found.len()
        );
    }

    for id in &args.select {
        tree.toggle(id, true)?;
    }
    info!("{} sensors selected", tree.selected_sensor_ids().len());

    let engine = HttpFootprintEngine::new(&args.engine_url);
    if !engine.probe().await {
        warn!("Footprint engine at {} did not answer", engine.base_url());
    }

    let mut session = PlanningSession::new(engine, config);
    if let Some(area) = args.area {
        session.set_area(area);
    }

    let outcome = session.run(&tree, args.days).await?;

    info!("\nWriting output to {:?}", args.output);
    let file = File::create(&args.output)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &outcome)?;

    if args.geojson {
        let geojson_path = args.output.with_extension("geojson");
        info!("Writing GeoJSON to {:?}", geojson_path);
        let geojson = export::to_geojson(&outcome);
        let file = File::create(&geojson_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &geojson)?;
    }

    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    for row in export::table_rows(&outcome, &tree).iter().take(20) {
        info!(
            "  {:20} | {:20} | {} -> {}",
            row.satellite, row.sensor, row.start, row.end
        );
    }
    info!("Regions: {}", outcome.regions.len());
    for group in aggregate::group_by_satellite(&outcome.regions) {
        info!(
            "  {:20} | {} regions",
            group.satellite_name,
            group.regions.len()
        );
    }
    for sat in &outcome.skipped_satellites {
        warn!("  skipped (no elements): {}", sat);
    }
    for sensor in &outcome.unresolved_sensors {
        warn!("  unresolved sensor: {}", sensor);
    }

    Ok(())
}
