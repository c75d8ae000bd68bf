//! Freight Analytics Report
//! KPIs, carrier and route performance, risk selections and clustering
//!
//! Run: ./target/release/freight_analytics --input data/shipments.csv [section]
//! Sections: all, kpis, carriers, routes, monthly, countries, distribution,
//!           seasonality, risk, clusters, matrix

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use freight_analytics::aggregate::{
    calculate_kpis, carrier_delay_distribution, carrier_stats, delay_distribution, destination_country_stats,
    monthly_delay_distribution, monthly_trends, origin_country_stats, route_stats, seasonality_by_month,
    seasonality_by_quarter, shipment_moving_average, trend_overview, CarrierStats, CountryStats, PerformanceStats,
    MOVING_AVERAGE_MONTHS,
};
use freight_analytics::clustering::{cluster_routes, has_enough_rows_for_clustering, RiskLevel, MIN_CLUSTERING_ROWS};
use freight_analytics::filter::date_bounds;
use freight_analytics::query::{
    best_performers, carrier_route_matrix, high_risk_routes, severe_delay_carriers, MatrixMetric,
};
use freight_analytics::{load_shipments, AnalyticsConfig, DatasetFilter, ShipmentRecord};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SECTIONS: &[&str] = &[
    "all", "kpis", "carriers", "routes", "monthly", "countries", "distribution", "seasonality", "risk",
    "clusters", "matrix",
];

/// Ocean freight shipment analytics report
#[derive(Parser, Debug)]
#[command(name = "freight_analytics")]
#[command(about = "Print shipment performance, risk and clustering tables")]
struct Args {
    /// Section to print
    #[arg(default_value = "all")]
    section: String,

    /// Shipment export (.csv, .tsv or a workbook)
    #[arg(long, default_value = "data/shipments.csv")]
    input: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of risk clusters (overrides config)
    #[arg(long)]
    clusters: Option<usize>,

    /// High-risk route delay threshold in days (overrides config)
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum shipments for best performers (overrides config)
    #[arg(long)]
    min_volume: Option<usize>,

    /// Matrix metric: count, delay, on_time, severe
    #[arg(long, default_value = "count")]
    metric: MatrixMetric,

    /// Only shipments departing on or after this date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Only shipments departing on or before this date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Restrict to these carriers (repeatable)
    #[arg(long = "carrier")]
    carriers: Vec<String>,

    /// Restrict to these origin countries (repeatable)
    #[arg(long = "origin")]
    origins: Vec<String>,

    /// Emit JSON instead of text tables
    #[arg(long)]
    json: bool,
}

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> Result<()> {
    let mut object = serde_json::Map::new();
    object.insert(label.to_string(), serde_json::to_value(value)?);
    println!("{}", serde_json::Value::Object(object));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if !SECTIONS.contains(&args.section.as_str()) {
        println!("Unknown section: {}", args.section);
        println!("Available: {}", SECTIONS.join(", "));
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => AnalyticsConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AnalyticsConfig::default(),
    };
    if let Some(k) = args.clusters {
        config.n_clusters = k;
    }
    if let Some(t) = args.threshold {
        config.risk_threshold_days = t;
    }
    if let Some(v) = args.min_volume {
        config.best_performer_min_volume = v;
    }

    let loaded = load_shipments(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    info!(
        "Loaded {} of {} rows ({} rejected, {} without arrival delay)",
        loaded.report.loaded_rows, loaded.report.total_rows, loaded.report.rejected_rows, loaded.report.missing_delays
    );

    let filter = build_filter(&args, &loaded.records);
    let records = if filter.is_unrestricted() {
        loaded.records
    } else {
        let rows = filter.apply(&loaded.records);
        info!("Filter kept {} of {} rows", rows.len(), loaded.records.len());
        rows
    };

    let report = Report {
        records: &records,
        config: &config,
        metric: args.metric,
        json: args.json,
    };

    if !args.json {
        println!("\n{}", "█".repeat(80));
        println!("{}  OCEAN FREIGHT ANALYTICS  {}", "█".repeat(26), "█".repeat(27));
        println!("{}\n", "█".repeat(80));
    }

    match args.section.as_str() {
        "all" => {
            report.kpis()?;
            report.carriers()?;
            report.routes()?;
            report.monthly()?;
            report.countries()?;
            report.distribution()?;
            report.seasonality()?;
            report.risk()?;
            report.clusters()?;
            report.matrix()?;
        }
        "kpis" => report.kpis()?,
        "carriers" => report.carriers()?,
        "routes" => report.routes()?,
        "monthly" => report.monthly()?,
        "countries" => report.countries()?,
        "distribution" => report.distribution()?,
        "seasonality" => report.seasonality()?,
        "risk" => report.risk()?,
        "clusters" => report.clusters()?,
        _ => report.matrix()?,
    }

    if !args.json {
        println!("\n{}", "█".repeat(80));
    }
    Ok(())
}

/// Date range defaults to the dataset's own bounds when only one end is given
fn build_filter(args: &Args, records: &[ShipmentRecord]) -> DatasetFilter {
    let mut filter = DatasetFilter::new()
        .with_carriers(args.carriers.iter().cloned())
        .with_origin_countries(args.origins.iter().cloned());

    if args.from.is_some() || args.to.is_some() {
        if let Some((lo, hi)) = date_bounds(records) {
            filter = filter.with_departure_range(args.from.unwrap_or(lo), args.to.unwrap_or(hi));
        }
    }
    filter
}

struct Report<'a> {
    records: &'a [ShipmentRecord],
    config: &'a AnalyticsConfig,
    metric: MatrixMetric,
    json: bool,
}

fn print_performance_header(label: &str) {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        label, "Ships", "Ctrs", "AvgDly", "StdDly", "OnTime%", "Severe%"
    );
    println!("  {}", "─".repeat(88));
}

fn print_performance_row(label: &str, s: &PerformanceStats) {
    println!(
        "  {:<34} {:>8} {:>8} {:>8.2} {:>8.2} {:>7.1}% {:>7.1}%",
        truncate(label, 34),
        s.shipments,
        s.containers,
        s.avg_delay,
        s.std_delay,
        s.on_time_rate,
        s.severe_late_rate
    );
}

fn print_country_table(rows: &[CountryStats]) {
    println!("  {:<28} {:>10} {:>10} {:>10}", "Country", "Ships", "AvgDly", "Late%");
    println!("  {}", "─".repeat(62));
    for c in rows.iter().take(10) {
        println!(
            "  {:<28} {:>10} {:>10.2} {:>9.1}%",
            truncate(&c.country, 28),
            c.shipments,
            c.avg_delay,
            c.late_rate
        );
    }
}

fn print_carrier_table(rows: &[CarrierStats]) {
    print_performance_header("Carrier");
    for c in rows {
        print_performance_row(&c.carrier_name, &c.stats);
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let cut: String = s.chars().take(width - 1).collect();
        format!("{}…", cut)
    }
}

fn no_data() {
    println!("  No data available for the current selection.");
}

impl Report<'_> {
    fn kpis(&self) -> Result<()> {
        let kpis = calculate_kpis(self.records);
        if self.json {
            return print_json("kpis", &kpis);
        }

        print_section_header("1. KEY PERFORMANCE INDICATORS");
        let Some(k) = kpis else {
            no_data();
            return Ok(());
        };

        println!("  Total Shipments:      {:>12}", k.total_shipments);
        println!("  Total Containers:     {:>12}", k.total_containers);
        println!("  With Arrival Delay:   {:>12}", k.measured_containers);
        println!("  Carriers:             {:>12}", k.total_carriers);
        println!("  Routes:               {:>12}", k.total_routes);
        println!("  Avg Arrival Delay:    {:>11.2}d", k.avg_delay);
        println!("  Median Arrival Delay: {:>11.2}d", k.median_delay);
        println!("  Delay Std Dev:        {:>11.2}d", k.std_delay);
        println!("  On-Time Rate:         {:>11.1}%", k.on_time_rate);
        println!("  Late Rate:            {:>11.1}%", k.late_rate);
        println!("  Severe Late Rate:     {:>11.1}%", k.severe_late_rate);
        match k.avg_transit_time {
            Some(t) => println!("  Avg Transit Time:     {:>11.2}d", t),
            None => println!("  Avg Transit Time:     {:>12}", "n/a"),
        }
        println!("  Total Rolls:          {:>12}", k.total_rolls);
        println!("  Roll Rate:            {:>11.1}%", k.roll_rate);
        Ok(())
    }

    fn carriers(&self) -> Result<()> {
        let carriers = carrier_stats(self.records);
        if self.json {
            return print_json("carriers", &carriers);
        }

        print_section_header("2. CARRIER PERFORMANCE");
        if carriers.is_empty() {
            no_data();
            return Ok(());
        }
        print_carrier_table(&carriers);

        print_subsection("Market Share");
        for c in &carriers {
            let bar = "▇".repeat((c.market_share / 2.0).round() as usize);
            println!("  {:<30} {:>6.1}% {}", truncate(&c.carrier_name, 30), c.market_share, bar);
        }
        Ok(())
    }

    fn routes(&self) -> Result<()> {
        let routes = route_stats(self.records);
        if self.json {
            return print_json("routes", &routes);
        }

        print_section_header("3. ROUTE PERFORMANCE (top 20 by volume)");
        if routes.is_empty() {
            no_data();
            return Ok(());
        }
        print_performance_header("Route");
        for r in routes.iter().take(20) {
            print_performance_row(&r.route, &r.stats);
        }
        Ok(())
    }

    fn monthly(&self) -> Result<()> {
        let months = monthly_trends(self.records);
        let overview = trend_overview(&months);
        let moving_average = shipment_moving_average(&months, MOVING_AVERAGE_MONTHS);
        if self.json {
            return print_json(
                "monthly",
                &serde_json::json!({ "months": months, "moving_average": moving_average, "overview": overview }),
            );
        }

        print_section_header("4. MONTHLY TRENDS");
        if months.is_empty() {
            no_data();
            return Ok(());
        }
        print_performance_header("Month");
        for m in &months {
            print_performance_row(&m.month_year, &m.stats);
        }

        print_subsection(&format!("Shipments, {}-month moving average", MOVING_AVERAGE_MONTHS));
        for (m, avg) in months.iter().zip(&moving_average) {
            println!("  {:<10} {:>8} {:>10.1}", m.month_year, m.stats.shipments, avg);
        }

        if let Some(o) = overview {
            print_subsection("Trend Overview");
            println!("  Shipment growth:      {:>+11.1}% ({:+} shipments)", o.growth_pct, o.shipment_change);
            println!("  Recent avg delay:     {:>11.2}d ({:+.2}d)", o.recent_avg_delay, o.delay_change);
            println!("  Peak month:           {:>12} ({} shipments)", o.peak_month, o.peak_shipments);
            println!("  Best month:           {:>12} ({:.2}d avg delay)", o.best_month, o.best_avg_delay);
        }
        Ok(())
    }

    fn countries(&self) -> Result<()> {
        let origins = origin_country_stats(self.records);
        let destinations = destination_country_stats(self.records);
        if self.json {
            return print_json("countries", &serde_json::json!({ "origin": origins, "destination": destinations }));
        }

        print_section_header("5. GEOGRAPHIC BREAKDOWN");
        if origins.is_empty() {
            no_data();
            return Ok(());
        }
        print_subsection("Top Origin Countries");
        print_country_table(&origins);
        print_subsection("Top Destination Countries");
        print_country_table(&destinations);
        Ok(())
    }

    fn distribution(&self) -> Result<()> {
        let overall = delay_distribution(self.records);
        let per_carrier = carrier_delay_distribution(self.records);
        let per_month = monthly_delay_distribution(self.records);
        if self.json {
            return print_json(
                "distribution",
                &serde_json::json!({ "overall": overall, "carriers": per_carrier, "months": per_month }),
            );
        }

        print_section_header("6. DELAY DISTRIBUTION");
        if self.records.is_empty() {
            no_data();
            return Ok(());
        }
        for b in &overall {
            let bar = "▇".repeat((b.share / 2.0).round() as usize);
            println!("  {:<16} {:>8} {:>6.1}% {}", b.category.label(), b.containers, b.share, bar);
        }

        print_subsection("By Carrier (% of containers)");
        println!(
            "  {:<30} {:>10} {:>10} {:>10} {:>10}",
            "Carrier", "On Time", "1-3d", "4-7d", "7d+"
        );
        for c in &per_carrier {
            let shares: Vec<String> = c.buckets.iter().map(|b| format!("{:>9.1}%", b.share)).collect();
            println!("  {:<30} {}", truncate(&c.carrier_name, 30), shares.join(" "));
        }

        print_subsection("By Month (containers)");
        println!("  {:<10} {:>10} {:>10} {:>10} {:>10}", "Month", "On Time", "1-3d", "4-7d", "7d+");
        for m in &per_month {
            let counts: Vec<String> = m.buckets.iter().map(|b| format!("{:>10}", b.containers)).collect();
            println!("  {:<10} {}", m.month_year, counts.join(" "));
        }
        Ok(())
    }

    fn seasonality(&self) -> Result<()> {
        let by_month = seasonality_by_month(self.records);
        let by_quarter = seasonality_by_quarter(self.records);
        if self.json {
            return print_json("seasonality", &serde_json::json!({ "month": by_month, "quarter": by_quarter }));
        }

        print_section_header("7. SEASONALITY");
        if by_month.is_empty() {
            no_data();
            return Ok(());
        }
        println!("  {:<8} {:>10} {:>10}", "Period", "Ships", "AvgDly");
        println!("  {}", "─".repeat(30));
        for s in by_quarter.iter().chain(by_month.iter()) {
            println!("  {:<8} {:>10} {:>10.2}", s.label, s.shipments, s.avg_delay);
        }
        Ok(())
    }

    fn risk(&self) -> Result<()> {
        let high_risk = high_risk_routes(self.records, self.config.risk_threshold_days);
        let best = best_performers(self.records, self.config.best_performer_min_volume);
        let watchlist = severe_delay_carriers(self.records, self.config.watchlist_min_volume);
        if self.json {
            return print_json(
                "risk",
                &serde_json::json!({ "high_risk_routes": high_risk, "best_performers": best, "severe_delay_carriers": watchlist }),
            );
        }

        print_section_header("8. RISK ASSESSMENT");

        print_subsection(&format!("High-Risk Routes (avg delay ≥ {:.1}d)", self.config.risk_threshold_days));
        if high_risk.is_empty() {
            no_data();
        } else {
            println!("  {:<34} {:>8} {:>8} {:>8} {:>6} {:>10}", "Route", "Ships", "AvgDly", "Late%", "Score", "Band");
            for r in high_risk.iter().take(15) {
                println!(
                    "  {:<34} {:>8} {:>8.2} {:>7.1}% {:>6} {:>10}",
                    truncate(&r.route.route, 34),
                    r.route.stats.shipments,
                    r.route.stats.avg_delay,
                    r.route.stats.late_rate,
                    r.risk_score,
                    r.band().as_str()
                );
            }
        }

        print_subsection(&format!("Best Performers (≥ {} shipments)", self.config.best_performer_min_volume));
        if best.is_empty() {
            no_data();
        } else {
            print_carrier_table(&best);
        }

        print_subsection(&format!("Severe Delay Watchlist (≥ {} shipments)", self.config.watchlist_min_volume));
        if watchlist.is_empty() {
            no_data();
        } else {
            print_carrier_table(&watchlist[..watchlist.len().min(5)]);
        }
        Ok(())
    }

    fn clusters(&self) -> Result<()> {
        if !has_enough_rows_for_clustering(self.records) {
            if self.json {
                return print_json("clusters", &serde_json::Value::Null);
            }
            print_section_header("9. ROUTE RISK CLUSTERS");
            println!("  Clustering needs more than {} shipment rows.", MIN_CLUSTERING_ROWS);
            return Ok(());
        }

        let clustering = match cluster_routes(self.records, self.config.n_clusters, &self.config.clustering) {
            Ok(c) => Some(c),
            Err(e) if e.is_insufficient_data() => {
                info!("Skipping clustering: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        };
        if self.json {
            return print_json("clusters", &clustering);
        }

        print_section_header(&format!("9. ROUTE RISK CLUSTERS (k = {})", self.config.n_clusters));
        let Some(clustering) = clustering else {
            no_data();
            return Ok(());
        };

        println!("  {:<14} {:>8} {:>10} {:>10} {:>10} {:>10}", "Tier", "Routes", "Ships", "AvgDly", "Late%", "Severe%");
        println!("  {}", "─".repeat(66));
        for s in &clustering.summary {
            println!(
                "  {:<14} {:>8} {:>10} {:>10.2} {:>9.1}% {:>9.1}%",
                s.risk_level.label(),
                s.routes,
                s.shipments,
                s.avg_delay,
                s.late_rate * 100.0,
                s.severe_late_rate * 100.0
            );
        }

        for level in RiskLevel::ALL.iter().rev() {
            let mut routes: Vec<_> = clustering.routes_at(*level).collect();
            if routes.is_empty() {
                continue;
            }
            routes.sort_by(|a, b| b.volume.cmp(&a.volume));
            print_subsection(&format!("{} routes", level.label()));
            for r in routes.iter().take(10) {
                println!(
                    "  {:<40} {:>6} ships {:>8.2}d avg {:>6.1}% late",
                    truncate(&r.route, 40),
                    r.volume,
                    r.avg_delay,
                    r.late_rate * 100.0
                );
            }
        }
        Ok(())
    }

    fn matrix(&self) -> Result<()> {
        let matrix = carrier_route_matrix(self.records, self.metric);
        if self.json {
            return print_json("matrix", &matrix);
        }

        print_section_header(&format!("10. CARRIER × ROUTE MATRIX ({:?})", self.metric));
        if matrix.carriers.is_empty() {
            no_data();
            return Ok(());
        }

        // top routes by volume keep the table readable
        let top_routes: Vec<String> = route_stats(self.records).into_iter().take(8).map(|r| r.route).collect();
        print!("  {:<20}", "Carrier");
        for route in &top_routes {
            print!(" {:>14}", truncate(route, 14));
        }
        println!();
        for carrier in &matrix.carriers {
            print!("  {:<20}", truncate(carrier, 20));
            for route in &top_routes {
                match matrix.get(carrier, route) {
                    Some(v) => print!(" {:>14.1}", v),
                    None => print!(" {:>14}", "-"),
                }
            }
            println!();
        }
        Ok(())
    }
}
