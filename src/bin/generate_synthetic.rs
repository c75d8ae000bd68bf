//! Synthetic shipment export generator
//!
//! Writes a container-level CSV with the same column names as the carrier
//! tracking export, so the report binary and tests can run without real data.
//! Carriers and lanes carry their own delay profiles, which gives clustering
//! something to find.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --shipments <N>      Number of Bills of Lading to generate (default: 5000)
//!   --start <DATE>       First departure date (default: 2023-11-01)
//!   --months <N>         Departure window length in months (default: 24)
//!   --severe-rate <F>    Extra probability of a 7+ day delay (default: 0.05)
//!   --seed <N>           Random seed for reproducibility (optional)
//!   --output <PATH>      Output CSV path (default: data/shipments.csv)

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::Parser;
use csv::WriterBuilder;
use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::path::PathBuf;

/// Synthetic data generator for the shipment export
#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate a synthetic container-level shipment export")]
struct Args {
    /// Number of shipments (Bills of Lading)
    #[arg(long, default_value = "5000")]
    shipments: usize,

    /// First departure date
    #[arg(long, default_value = "2023-11-01")]
    start: NaiveDate,

    /// Length of the departure window in months
    #[arg(long, default_value = "24")]
    months: u32,

    /// Extra probability of a severe (7+ day) delay per shipment
    #[arg(long, default_value = "0.05")]
    severe_rate: f64,

    /// Share of rows written with a blank departure date
    #[arg(long, default_value = "0.01")]
    missing_date_rate: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Output CSV path
    #[arg(long, default_value = "data/shipments.csv")]
    output: PathBuf,
}

/// One row of the export, headers as the tracking platform names them
#[derive(Debug, Clone, Serialize)]
struct ExportRow {
    #[serde(rename = "Shipment ID")]
    shipment_id: String,
    #[serde(rename = "Bill of Lading")]
    bill_of_lading: String,
    #[serde(rename = "Container Number")]
    container_number: String,
    #[serde(rename = "Carrier Name")]
    carrier_name: String,
    #[serde(rename = "Origin Country")]
    origin_country: String,
    #[serde(rename = "POL LOCODE")]
    pol: String,
    #[serde(rename = "POD LOCODE")]
    pod: String,
    #[serde(rename = "Departure POL Date")]
    departure: String,
    #[serde(rename = "Arrival POD Date")]
    arrival: String,
    #[serde(rename = "Transit (Days)")]
    transit_days: f64,
    #[serde(rename = "Departure Delay (Days)")]
    departure_delay: f64,
    /// Blank while the shipment is still at sea
    #[serde(rename = "Arrival Delay (Days)")]
    arrival_delay: Option<f64>,
    #[serde(rename = "Roll Count - POL")]
    roll_count: u32,
    #[serde(rename = "Shipment Completed")]
    completed: String,
}

/// Carrier profile: (name, volume weight, delay bias in days, delay spread)
const CARRIERS: &[(&str, u32, f64, f64)] = &[
    ("MSC", 22, 1.5, 2.5),
    ("Maersk", 20, 0.5, 2.0),
    ("CMA CGM", 16, 1.0, 2.5),
    ("COSCO", 12, 2.5, 3.5),
    ("Hapag-Lloyd", 12, 0.0, 1.5),
    ("ONE", 8, 1.0, 2.0),
    ("Evergreen", 6, 3.0, 4.0),
    ("ZIM", 4, 4.0, 5.0),
];

/// Lane profile: (POL, POD, volume weight, scheduled transit days, delay bias)
const LANES: &[(&str, &str, u32, f64, f64)] = &[
    ("CNSHA", "NLRTM", 18, 32.0, 1.0),
    ("CNNBO", "DEHAM", 14, 34.0, 1.5),
    ("SGSIN", "ITGOA", 10, 24.0, 0.5),
    ("HKHKG", "BEANR", 8, 30.0, 1.0),
    ("CNSHA", "USLAX", 10, 16.0, 2.0),
    ("AEJEA", "FRLEH", 5, 20.0, 0.0),
    ("BRSSZ", "ESBCN", 6, 18.0, 3.0),
    ("CLSAI", "NLRTM", 5, 28.0, 6.0),
    ("COCTG", "GBSOU", 4, 15.0, 4.0),
    ("CRPMN", "DEHAM", 4, 17.0, 7.0),
    ("AUSYD", "SGSIN", 5, 12.0, -0.5),
    ("NZAKL", "CNSHA", 3, 18.0, 0.5),
    ("USHOU", "SEGOT", 4, 19.0, 2.5),
    ("OMSOH", "ROCND", 4, 14.0, 5.0),
];

/// Containers per Bill of Lading: (count, weight)
const CONTAINERS_PER_SHIPMENT: &[(usize, u32)] = &[(1, 60), (2, 25), (3, 10), (4, 5)];

/// Format datetime for CSV output
fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Generate an ISO 6346 style container number (owner code, serial, check digit)
fn generate_container_number(rng: &mut impl Rng) -> String {
    let owner: String = (0..3).map(|_| rng.gen_range(b'A'..=b'Z') as char).collect();
    format!("{}U{:06}{}", owner, rng.gen_range(0..1_000_000), rng.gen_range(0..10))
}

/// Roughly bell-shaped noise in [-3, 3] scaled by `spread`
fn delay_noise(spread: f64, rng: &mut impl Rng) -> f64 {
    let sum: f64 = (0..3).map(|_| rng.gen_range(-1.0..=1.0)).sum();
    sum * spread
}

fn roll_count(rng: &mut impl Rng) -> u32 {
    match rng.gen::<f64>() {
        p if p < 0.02 => 2,
        p if p < 0.10 => 1,
        _ => 0,
    }
}

/// Rows for one Bill of Lading
fn generate_shipment(index: usize, args: &Args, start: NaiveDateTime, window_days: i64, rng: &mut StdRng, dists: &Dists) -> Vec<ExportRow> {
    let (carrier, _, carrier_bias, spread) = CARRIERS[dists.carrier.sample(rng)];
    let (pol, pod, _, transit, lane_bias) = LANES[dists.lane.sample(rng)];
    let containers = CONTAINERS_PER_SHIPMENT[dists.containers.sample(rng)].0;

    let departure_offset = rng.gen_range(0..window_days.max(1));
    let departure = start + Duration::days(departure_offset) + Duration::hours(rng.gen_range(0..24));

    let mut delay = carrier_bias + lane_bias + delay_noise(spread, rng);
    if rng.gen::<f64>() < args.severe_rate {
        delay += rng.gen_range(7.0..21.0);
    }
    let departure_delay = (delay * rng.gen_range(0.0..0.5)).max(0.0);
    let completed = departure_offset < window_days - 30;
    let at_sea = !completed && rng.gen_bool(0.5);

    let bill_of_lading = format!("{}{:08}", carrier[..3].to_uppercase(), 10_000_000 + index);
    let shipment_id = format!("SHP-{:07}", index + 1);

    (0..containers)
        .map(|_| {
            // containers on one BL mostly travel together
            let container_delay = if rng.gen_bool(0.8) { delay } else { delay + rng.gen_range(-1.0..2.0) };
            let container_delay = (container_delay * 10.0).round() / 10.0;
            let arrival = departure + Duration::hours(((transit + container_delay) * 24.0).round() as i64);
            let blank_date = rng.gen::<f64>() < args.missing_date_rate;

            ExportRow {
                shipment_id: shipment_id.clone(),
                bill_of_lading: bill_of_lading.clone(),
                container_number: generate_container_number(rng),
                carrier_name: carrier.to_string(),
                origin_country: pol[..2].to_string(),
                pol: pol.to_string(),
                pod: pod.to_string(),
                departure: if blank_date { String::new() } else { format_datetime(&departure) },
                arrival: if at_sea { String::new() } else { format_datetime(&arrival) },
                transit_days: transit,
                departure_delay: (departure_delay * 10.0).round() / 10.0,
                arrival_delay: (!at_sea).then_some(container_delay),
                roll_count: roll_count(rng),
                completed: if completed { "Yes" } else { "No" }.to_string(),
            }
        })
        .collect()
}

struct Dists {
    carrier: WeightedIndex<u32>,
    lane: WeightedIndex<u32>,
    containers: WeightedIndex<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();

    println!("🔧 Synthetic Shipment Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Shipments:        {}", args.shipments);
    println!("Departures from:  {} ({} months)", args.start, args.months);
    println!("Severe rate:      {:.1}%", args.severe_rate * 100.0);
    println!("Missing dates:    {:.1}%", args.missing_date_rate * 100.0);
    println!("Output:           {}", args.output.display());
    if let Some(seed) = args.seed {
        println!("Random seed:      {}", seed);
    }
    println!();

    // Initialize RNG
    let mut rng: StdRng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let dists = Dists {
        carrier: WeightedIndex::new(CARRIERS.iter().map(|c| c.1))?,
        lane: WeightedIndex::new(LANES.iter().map(|l| l.2))?,
        containers: WeightedIndex::new(CONTAINERS_PER_SHIPMENT.iter().map(|c| c.1))?,
    };
    let window_days = (args.months as i64 * 365) / 12;
    let start = args.start.and_hms_opt(0, 0, 0).context("invalid start date")?;

    // Ensure output directory exists
    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    println!("🏭 Generating shipments...");
    let mut writer = WriterBuilder::new().has_headers(true).from_path(&args.output)?;

    let mut rows_written = 0;
    for i in 0..args.shipments {
        for row in generate_shipment(i, &args, start, window_days, &mut rng, &dists) {
            writer.serialize(&row)?;
            rows_written += 1;
        }

        // Progress indicator
        if (i + 1) % 10000 == 0 {
            println!("   Generated {}/{} shipments...", i + 1, args.shipments);
        }
    }

    writer.flush()?;

    println!("\n✅ Generation complete!");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Shipments:         {:>8}", args.shipments);
    println!("Container rows:    {:>8}", rows_written);
    println!("Output file:       {}", args.output.display());

    Ok(())
}
