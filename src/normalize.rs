//! Schema normalization
//!
//! Turns a raw table with source column names, read from delimited text or
//! from the named sheet of a spreadsheet workbook, into canonical
//! [`ShipmentRecord`]s. Column renaming is a static one-to-one mapping; codes
//! are resolved through the static country and port tables.

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::country_names::get_country_name;
use crate::error::{AnalyticsError, Result};
use crate::location_names::{format_route, get_port_info};
use crate::models::{month_bucket, ShipmentRecord, ShipmentStatus};

/// Canonical column names
pub mod columns {
    pub const ARRIVAL_DELAY: &str = "Arrival_Delay";
    pub const DEPARTURE_DELAY: &str = "Departure_Delay";
    pub const TRANSIT_DAYS: &str = "Transit_Days";
    pub const ROLL_COUNT: &str = "Roll_Count";
    pub const COMPLETED: &str = "Completed";
    pub const ORIGIN_COUNTRY_CODE: &str = "Origin_Country_Code";
    pub const ORIGIN_COUNTRY_NAME: &str = "Origin_Country_Name";
    pub const POL_CODE: &str = "POL_Code";
    pub const POL_CITY: &str = "POL_City";
    pub const POD_CODE: &str = "POD_Code";
    pub const POD_CITY: &str = "POD_City";
    pub const POD_COUNTRY_NAME: &str = "POD_Country_Name";
    pub const DEPARTURE_DATE: &str = "Departure_Date";
    pub const ARRIVAL_DATE: &str = "Arrival_Date";
    pub const CARRIER_NAME: &str = "Carrier_Name";
    pub const SHIPMENT_ID: &str = "Shipment_ID";
    pub const BILL_OF_LADING: &str = "Bill_of_Lading";
    pub const CONTAINER_NUMBER: &str = "Container_Number";
    pub const ROUTE: &str = "Route";
    pub const MONTH_YEAR: &str = "Month_Year";
    pub const STATUS: &str = "Status";
}

/// Source column name → canonical column name
pub const COLUMN_MAPPING: &[(&str, &str)] = &[
    ("Arrival Delay (Days)", columns::ARRIVAL_DELAY),
    ("Departure Delay (Days)", columns::DEPARTURE_DELAY),
    ("Transit (Days)", columns::TRANSIT_DAYS),
    ("Roll Count - POL", columns::ROLL_COUNT),
    ("Shipment Completed", columns::COMPLETED),
    ("Origin Country", columns::ORIGIN_COUNTRY_CODE),
    ("POL LOCODE", columns::POL_CODE),
    ("POD LOCODE", columns::POD_CODE),
    ("Departure POL Date", columns::DEPARTURE_DATE),
    ("Arrival POD Date", columns::ARRIVAL_DATE),
    ("Carrier Name", columns::CARRIER_NAME),
    ("Shipment ID", columns::SHIPMENT_ID),
    ("Bill of Lading", columns::BILL_OF_LADING),
    ("Container Number", columns::CONTAINER_NUMBER),
];

/// Columns without which no statistic can be computed. Only their absence
/// from the header is fatal; blank cells are handled per row.
pub const MANDATORY_COLUMNS: [&str; 3] = [
    columns::ARRIVAL_DELAY,
    columns::CARRIER_NAME,
    columns::BILL_OF_LADING,
];

/// Sheet read from workbook exports
pub const SOURCE_SHEET_NAME: &str = "nov23 to oct25 POLIMI";

/// How many rejected rows are logged individually
const MAX_LOGGED_REJECTIONS: usize = 5;

/// Header row plus string cells, as read from the source
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a delimited table with a header row
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Read the named sheet of a spreadsheet workbook (`.xlsx`, `.xls`,
    /// `.xlsb`, `.ods`). The first row is the header.
    pub fn from_workbook(path: &Path, sheet: &'static str) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        if !workbook.sheet_names().iter().any(|name| name.as_str() == sheet) {
            return Err(AnalyticsError::MissingSheet {
                path: path.display().to_string(),
                sheet,
            });
        }

        let range = workbook.worksheet_range(sheet)?;
        Ok(Self::from_range(&range))
    }

    /// Stringify a worksheet range; the first row becomes the header
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
        let headers = rows.next().unwrap_or_default();
        Self {
            headers,
            rows: rows.collect(),
        }
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
    }
}

/// Counts collected while normalizing a table
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    /// Rows without a carrier
    pub rejected_rows: usize,
    /// Loaded rows whose arrival delay is blank or not a number
    pub missing_delays: usize,
    pub unparseable_dates: usize,
}

/// Canonical records plus the load report
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub records: Vec<ShipmentRecord>,
    pub report: LoadReport,
}

/// Load and normalize a shipment file.
///
/// Workbooks are read from the [`SOURCE_SHEET_NAME`] sheet. `.tsv` files are
/// tab separated; anything else is read as comma-separated text.
pub fn load_shipments(path: impl AsRef<Path>) -> Result<LoadedDataset> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    info!("Reading shipments from {:?}", path);
    let table = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => RawTable::from_workbook(path, SOURCE_SHEET_NAME)?,
        "tsv" => RawTable::from_reader(std::fs::File::open(path)?, b'\t')?,
        _ => RawTable::from_reader(std::fs::File::open(path)?, b',')?,
    };
    normalize(&table)
}

/// Resolved column positions for a table
struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    fn resolve(headers: &[String]) -> Self {
        let canonical: HashMap<&str, &'static str> = COLUMN_MAPPING
            .iter()
            .flat_map(|(source, target)| [(*source, *target), (*target, *target)])
            .chain(
                [
                    columns::ORIGIN_COUNTRY_NAME,
                    columns::POL_CITY,
                    columns::POD_CITY,
                    columns::POD_COUNTRY_NAME,
                    columns::ROUTE,
                    columns::MONTH_YEAR,
                    columns::STATUS,
                ]
                .into_iter()
                .map(|c| (c, c)),
            )
            .collect();

        let mut positions = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            match canonical.get(header.trim()) {
                Some(name) => {
                    positions.entry(*name).or_insert(i);
                }
                None => debug!("Ignoring unmapped column {:?}", header),
            }
        }
        Self { positions }
    }

    fn has(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let idx = *self.positions.get(column)?;
        row.get(idx).map(|s| s.trim()).filter(|s| !s.is_empty())
    }
}

/// Why a row was rejected
#[derive(Debug)]
enum RowError {
    Missing(&'static str),
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowError::Missing(col) => write!(f, "empty {}", col),
        }
    }
}

/// Normalize a raw table into canonical shipment records.
///
/// Fails only when a mandatory column is entirely absent. A row without a
/// carrier is skipped and counted in the report. A blank Bill of Lading or
/// arrival delay keeps the row: it still counts as a container, and its
/// delay is simply unknown.
pub fn normalize(table: &RawTable) -> Result<LoadedDataset> {
    let index = ColumnIndex::resolve(&table.headers);

    for column in MANDATORY_COLUMNS {
        if !index.has(column) {
            return Err(AnalyticsError::MissingColumn(column));
        }
    }

    let mut report = LoadReport {
        total_rows: table.rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());

    for (i, row) in table.rows.iter().enumerate() {
        match normalize_row(&index, row, &mut report) {
            Ok(record) => records.push(record),
            Err(e) => {
                if report.rejected_rows < MAX_LOGGED_REJECTIONS {
                    warn!("Skipping row {}: {}", i + 1, e);
                }
                report.rejected_rows += 1;
            }
        }
    }

    report.loaded_rows = records.len();
    info!(
        "Normalized {} of {} rows ({} rejected, {} without arrival delay, {} unparseable dates)",
        report.loaded_rows, report.total_rows, report.rejected_rows, report.missing_delays, report.unparseable_dates
    );

    Ok(LoadedDataset { records, report })
}

fn normalize_row(
    index: &ColumnIndex,
    row: &[String],
    report: &mut LoadReport,
) -> std::result::Result<ShipmentRecord, RowError> {
    let carrier_name = index
        .cell(row, columns::CARRIER_NAME)
        .ok_or(RowError::Missing(columns::CARRIER_NAME))?;

    let raw_delay = index.cell(row, columns::ARRIVAL_DELAY);
    let arrival_delay = raw_delay.and_then(parse_number);
    if arrival_delay.is_none() {
        if let Some(raw) = raw_delay {
            debug!("Unparseable arrival delay {:?}", raw);
        }
        report.missing_delays += 1;
    }

    let origin_country_code = index.cell(row, columns::ORIGIN_COUNTRY_CODE).map(str::to_string);
    let origin_country = match index.cell(row, columns::ORIGIN_COUNTRY_NAME) {
        Some(name) => name.to_string(),
        None => get_country_name(origin_country_code.as_deref()),
    };

    let pol_code = index.cell(row, columns::POL_CODE).map(str::to_string);
    let pol_city = match index.cell(row, columns::POL_CITY) {
        Some(city) => city.to_string(),
        None => get_port_info(pol_code.as_deref()).0,
    };

    let pod_code = index.cell(row, columns::POD_CODE).map(str::to_string);
    let (derived_pod_city, derived_pod_country) = get_port_info(pod_code.as_deref());
    let pod_city = index
        .cell(row, columns::POD_CITY)
        .map(str::to_string)
        .unwrap_or(derived_pod_city);
    let destination_country = index
        .cell(row, columns::POD_COUNTRY_NAME)
        .map(str::to_string)
        .unwrap_or(derived_pod_country);

    let route = index
        .cell(row, columns::ROUTE)
        .map(str::to_string)
        .unwrap_or_else(|| format_route(&origin_country, &destination_country));

    let departure_date = parse_date_cell(index.cell(row, columns::DEPARTURE_DATE), report);
    let arrival_date = parse_date_cell(index.cell(row, columns::ARRIVAL_DATE), report);

    let month_year = if index.has(columns::MONTH_YEAR) {
        index.cell(row, columns::MONTH_YEAR).map(str::to_string)
    } else {
        departure_date.as_ref().map(month_bucket)
    };

    let status = match (index.cell(row, columns::STATUS), index.cell(row, columns::COMPLETED)) {
        (Some(status), _) => ShipmentStatus::from(status),
        (None, Some(completed)) => ShipmentStatus::from(completed),
        (None, None) => ShipmentStatus::Unknown,
    };

    let record = ShipmentRecord {
        bill_of_lading: index.cell(row, columns::BILL_OF_LADING).map(str::to_string),
        container_number: index.cell(row, columns::CONTAINER_NUMBER).map(str::to_string),
        shipment_id: index.cell(row, columns::SHIPMENT_ID).map(str::to_string),
        carrier_name: carrier_name.to_string(),
        origin_country_code,
        origin_country,
        pol_code,
        pol_city,
        pod_code,
        pod_city,
        destination_country,
        departure_date,
        arrival_date,
        transit_days: index.cell(row, columns::TRANSIT_DAYS).and_then(parse_number),
        departure_delay: index.cell(row, columns::DEPARTURE_DELAY).and_then(parse_number),
        arrival_delay: None,
        roll_count: index
            .cell(row, columns::ROLL_COUNT)
            .and_then(parse_number)
            .filter(|r| *r >= 0.0)
            .map(|r| r.round() as u32)
            .unwrap_or(0),
        status,
        route,
        month_year,
        is_late: false,
        is_severely_late: false,
        delay_category: None,
    };

    Ok(record.with_arrival_delay(arrival_delay))
}

/// Parse a finite number; anything else is treated as missing
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse a timestamp in any of the supported layouts.
///
/// Slash dates are read month-first; day-first only matches when the first
/// field cannot be a month.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn parse_date_cell(value: Option<&str>, report: &mut LoadReport) -> Option<NaiveDateTime> {
    let value = value?;
    let parsed = parse_date(value);
    if parsed.is_none() {
        report.unparseable_dates += 1;
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DelayCategory;

    fn source_table(rows: &[&[&str]]) -> RawTable {
        let headers = [
            "Bill of Lading",
            "Container Number",
            "Carrier Name",
            "Origin Country",
            "POL LOCODE",
            "POD LOCODE",
            "Departure POL Date",
            "Arrival POD Date",
            "Transit (Days)",
            "Arrival Delay (Days)",
            "Roll Count - POL",
            "Shipment Completed",
        ];
        RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_normalize_maps_source_columns() {
        let table = source_table(&[&[
            "BL001", "MSCU1234567", "MSC", "CN", "CNSHA", "DEHAM", "2024-01-15", "2024-02-20",
            "36", "2.5", "1", "true",
        ]]);

        let loaded = normalize(&table).unwrap();
        assert_eq!(loaded.records.len(), 1);

        let rec = &loaded.records[0];
        assert_eq!(rec.bill_of_lading.as_deref(), Some("BL001"));
        assert_eq!(rec.carrier_name, "MSC");
        assert_eq!(rec.origin_country, "China");
        assert_eq!(rec.pol_city, "Shanghai");
        assert_eq!(rec.pod_city, "Hamburg");
        assert_eq!(rec.destination_country, "Germany");
        assert_eq!(rec.route, "China → Germany");
        assert_eq!(rec.month_year.as_deref(), Some("2024-01"));
        assert_eq!(rec.transit_days, Some(36.0));
        assert_eq!(rec.roll_count, 1);
        assert_eq!(rec.status, ShipmentStatus::Completed);
        assert_eq!(rec.delay_category, Some(DelayCategory::OneToThreeDays));
        assert!(rec.is_late);
    }

    #[test]
    fn test_missing_mandatory_column_is_fatal() {
        let table = RawTable::new(
            vec!["Carrier Name".into(), "Arrival Delay (Days)".into()],
            vec![vec!["MSC".into(), "1".into()]],
        );
        let err = normalize(&table).unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingColumn("Bill_of_Lading")));
    }

    #[test]
    fn test_canonical_columns_accepted() {
        let table = RawTable::new(
            vec!["Bill_of_Lading".into(), "Carrier_Name".into(), "Arrival_Delay".into()],
            vec![vec!["BL1".into(), "CMA CGM".into(), "-2".into()]],
        );
        let loaded = normalize(&table).unwrap();
        let rec = &loaded.records[0];
        assert_eq!(rec.origin_country, "Unknown");
        assert_eq!(rec.destination_country, "Unknown");
        assert_eq!(rec.route, "Unknown → Unknown");
        assert_eq!(rec.month_year, None);
    }

    #[test]
    fn test_unparseable_date_becomes_null() {
        let table = source_table(&[&[
            "BL001", "C1", "MSC", "IT", "ITGOA", "CLSAI", "not a date", "", "30", "0", "", "",
        ]]);
        let loaded = normalize(&table).unwrap();
        let rec = &loaded.records[0];
        assert_eq!(rec.departure_date, None);
        assert_eq!(rec.month_year, None);
        assert_eq!(rec.roll_count, 0);
        assert_eq!(loaded.report.unparseable_dates, 1);
    }

    #[test]
    fn test_only_rows_without_carrier_are_rejected() {
        let table = source_table(&[
            &["BL001", "C1", "MSC", "CN", "CNSHA", "DEHAM", "", "", "", "1", "", ""],
            &["", "C2", "MSC", "CN", "CNSHA", "DEHAM", "", "", "", "1", "", ""],
            &["BL003", "C3", "MSC", "CN", "CNSHA", "DEHAM", "", "", "", "n/a", "", ""],
            &["BL004", "C4", "", "CN", "CNSHA", "DEHAM", "", "", "", "2", "", ""],
        ]);
        let loaded = normalize(&table).unwrap();
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(
            loaded.report,
            LoadReport {
                total_rows: 4,
                loaded_rows: 3,
                rejected_rows: 1,
                missing_delays: 1,
                unparseable_dates: 0,
            }
        );
        assert_eq!(loaded.records[1].bill_of_lading, None);
        assert_eq!(loaded.records[2].arrival_delay, None);
        assert_eq!(loaded.records[2].delay_category, None);
    }

    #[test]
    fn test_blank_delays_keep_shipments_and_containers() {
        let table = RawTable::from_reader(
            "Bill of Lading,Container Number,Carrier Name,Arrival Delay (Days)\n\
             BL1,C1,MSC,2\nBL1,C2,MSC,\nBL2,C3,MSC,\n"
                .as_bytes(),
            b',',
        )
        .unwrap();
        let loaded = normalize(&table).unwrap();
        assert_eq!(loaded.report.missing_delays, 2);

        let kpis = crate::aggregate::calculate_kpis(&loaded.records).unwrap();
        assert_eq!(kpis.total_shipments, 2);
        assert_eq!(kpis.total_containers, 3);
        assert_eq!(kpis.measured_containers, 1);
        assert_eq!(kpis.avg_delay, 2.0);
    }

    #[test]
    fn test_precomputed_route_is_kept() {
        let table = RawTable::new(
            vec![
                "Bill of Lading".into(),
                "Carrier Name".into(),
                "Arrival Delay (Days)".into(),
                "Route".into(),
            ],
            vec![vec!["BL1".into(), "ONE".into(), "3".into(), "Asia → Europe".into()]],
        );
        let loaded = normalize(&table).unwrap();
        assert_eq!(loaded.records[0].route, "Asia → Europe");
    }

    #[test]
    fn test_parse_date_layouts() {
        assert!(parse_date("2024-05-01").is_some());
        assert!(parse_date("2024-05-01 13:45:00").is_some());
        assert!(parse_date("2024-05-01T13:45:00").is_some());
        assert!(parse_date("2024-05-01T13:45:00Z").is_some());
        let day = |v: &str| parse_date(v).map(|d| d.format("%Y-%m-%d").to_string());
        assert_eq!(day("02/03/2024"), Some("2024-02-03".to_string()));
        assert_eq!(day("01/15/2024"), Some("2024-01-15".to_string()));
        assert_eq!(day("15/01/2024"), Some("2024-01-15".to_string()));
        assert_eq!(day("02/03/2024 14:30"), Some("2024-02-03".to_string()));
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_from_reader_csv() {
        let data = "Bill of Lading,Carrier Name,Arrival Delay (Days)\nBL1,Maersk,4\nBL2,Maersk,-1\n";
        let table = RawTable::from_reader(data.as_bytes(), b',').unwrap();
        assert_eq!(table.headers.len(), 3);
        assert_eq!(table.rows.len(), 2);

        let loaded = normalize(&table).unwrap();
        assert_eq!(loaded.records[0].delay_category, Some(DelayCategory::FourToSevenDays));
    }

    #[test]
    fn test_from_range_stringifies_cells() {
        let mut range = Range::new((0, 0), (1, 3));
        range.set_value((0, 0), Data::String("Bill of Lading".into()));
        range.set_value((0, 1), Data::String("Carrier Name".into()));
        range.set_value((0, 2), Data::String("Arrival Delay (Days)".into()));
        range.set_value((0, 3), Data::String("Shipment Completed".into()));
        range.set_value((1, 0), Data::String(" BL1 ".into()));
        range.set_value((1, 1), Data::String("MSC".into()));
        range.set_value((1, 2), Data::Float(2.5));
        range.set_value((1, 3), Data::Bool(true));

        let table = RawTable::from_range(&range);
        assert_eq!(table.headers[2], "Arrival Delay (Days)");
        assert_eq!(table.rows, vec![vec!["BL1", "MSC", "2.5", "true"]]);

        let rec = &normalize(&table).unwrap().records[0];
        assert_eq!(rec.arrival_delay, Some(2.5));
        assert_eq!(rec.status, ShipmentStatus::Completed);
    }

    #[test]
    fn test_empty_range_has_no_columns() {
        let table = RawTable::from_range(&Range::<Data>::empty());
        assert!(table.headers.is_empty());
        assert!(matches!(normalize(&table), Err(AnalyticsError::MissingColumn(_))));
    }

    #[test]
    fn test_missing_workbook_is_an_error() {
        assert!(load_shipments("no/such/shipments.xlsx").is_err());
    }
}
