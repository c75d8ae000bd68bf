//! Ocean freight shipment analytics
//!
//! Loads container-level shipment exports, normalizes them into
//! [`ShipmentRecord`]s and derives KPI, carrier, route and monthly tables,
//! composite risk scores and clustered route risk tiers.

pub mod aggregate;
pub mod cache;
pub mod clustering;
pub mod config;
pub mod country_names;
pub mod error;
pub mod filter;
pub mod location_names;
pub mod models;
pub mod normalize;
pub mod query;
pub mod risk;
pub mod stats;

pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use filter::DatasetFilter;
pub use models::ShipmentRecord;
pub use normalize::{load_shipments, normalize, LoadedDataset, RawTable};
