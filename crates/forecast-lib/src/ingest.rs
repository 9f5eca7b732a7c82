//! Delimited-text ingestion of monthly aggregate records
//!
//! Reads a header-row CSV into typed records. Columns are matched by header
//! name, so column order in the file is free. Rows that would break the
//! complete-record guarantee are rejected here, not in the pipeline.

use crate::error::{ForecastError, Result};
use crate::models::Observation;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Read every record from a CSV file with a header row
///
/// The label column may be absent; such records carry a zero label and are
/// only fit for scoring.
pub fn read_records<R>(path: impl AsRef<Path>) -> Result<Vec<R>>
where
    R: Observation + DeserializeOwned,
{
    read_file(path.as_ref(), false)
}

/// Read records for training; the file must carry the label column
pub fn read_training_records<R>(path: impl AsRef<Path>) -> Result<Vec<R>>
where
    R: Observation + DeserializeOwned,
{
    read_file(path.as_ref(), true)
}

/// Read records from any reader; `origin` is only used in error messages
pub fn read_from<R, T>(reader: T, origin: &Path) -> Result<Vec<R>>
where
    R: Observation + DeserializeOwned,
    T: Read,
{
    parse(reader, origin, false)
}

/// Like [`read_from`], but rejects input without the label column
pub fn read_training_from<R, T>(reader: T, origin: &Path) -> Result<Vec<R>>
where
    R: Observation + DeserializeOwned,
    T: Read,
{
    parse(reader, origin, true)
}

fn read_file<R>(path: &Path, require_label: bool) -> Result<Vec<R>>
where
    R: Observation + DeserializeOwned,
{
    if !path.exists() {
        return Err(ForecastError::ingestion(path, "file not found"));
    }
    let file =
        std::fs::File::open(path).map_err(|e| ForecastError::ingestion(path, e.to_string()))?;
    let records = parse(file, path, require_label)?;
    info!(
        path = %path.display(),
        schema = R::SCHEMA,
        rows = records.len(),
        "Loaded records"
    );
    Ok(records)
}

fn parse<R, T>(reader: T, origin: &Path, require_label: bool) -> Result<Vec<R>>
where
    R: Observation + DeserializeOwned,
    T: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_reader(reader);

    if require_label {
        let headers = csv_reader
            .headers()
            .map_err(|e| ForecastError::ingestion(origin, format!("header: {e}")))?;
        if !headers.iter().any(|h| h == R::LABEL_FIELD) {
            return Err(ForecastError::ingestion(
                origin,
                format!("missing label column {:?}", R::LABEL_FIELD),
            ));
        }
    }

    let mut records = Vec::new();
    for (idx, row) in csv_reader.deserialize::<R>().enumerate() {
        // header is line 1
        let line = idx + 2;
        let record =
            row.map_err(|e| ForecastError::ingestion(origin, format!("line {line}: {e}")))?;
        validate(&record)
            .map_err(|msg| ForecastError::ingestion(origin, format!("line {line}: {msg}")))?;
        records.push(record);
    }

    debug!(rows = records.len(), "Parsed CSV rows");
    Ok(records)
}

fn validate<R: Observation>(record: &R) -> std::result::Result<(), String> {
    if record.unit_key().is_empty() {
        return Err(format!("empty {}", R::KEY_FIELD));
    }
    if !record.label().is_finite() {
        return Err("non-finite label".to_string());
    }
    for field in R::NUMERIC_FIELDS {
        let value = (field.value)(record);
        if !value.is_finite() {
            return Err(format!("non-finite value in {}", field.name));
        }
    }
    if let Some(month) = record.month() {
        if !(1.0..=12.0).contains(&month) {
            return Err(format!("month {month} outside 1..=12"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CountryRecord, ProductRecord};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const COUNTRY_CSV: &str = "\
next,country,year,month,max,min,std,count,sales,med,prev
1019647.67,United Kingdom,2017,10,587.902,135.640,1063.932092,1724,873612.9,309.945,856548.78
6393.96,United States,2017,10,573.63,340.395,340.3959,10,5322.56,400.17,4264.94
";

    #[test]
    fn test_read_country_records() {
        let records: Vec<CountryRecord> =
            read_from(COUNTRY_CSV.as_bytes(), Path::new("inline")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].country, "United Kingdom");
        assert_eq!(records[0].units_sold, 873612.9);
        assert_eq!(records[1].median, 400.17);
        assert_eq!(records[1].avg, 0.0);
    }

    #[test]
    fn test_columns_matched_by_header() {
        let csv = "\
country,next,month,year,prev,med,sales,count,std,min,max
Germany,10.0,3,2016,7.0,1.0,8.0,4,0.5,0.1,2.0
";
        let records: Vec<CountryRecord> = read_from(csv.as_bytes(), Path::new("inline")).unwrap();
        assert_eq!(records[0].country, "Germany");
        assert_eq!(records[0].month, 3.0);
        assert_eq!(records[0].max, 2.0);
    }

    #[test]
    fn test_read_product_records() {
        let csv = "\
next,productId,year,month,units,avg,count,max,min,prev
263.0,988,2017,11,291.0,3.64,80,12.0,1.0,263.0
";
        let records: Vec<ProductRecord> = read_from(csv.as_bytes(), Path::new("inline")).unwrap();
        assert_eq!(records[0].product_id, "988");
        assert_eq!(records[0].units, 291.0);
    }

    #[test]
    fn test_missing_column_is_ingestion_error() {
        let csv = "next,country,year\n1.0,UK,2017\n";
        let err = read_from::<CountryRecord, _>(csv.as_bytes(), Path::new("inline")).unwrap_err();
        assert!(matches!(err, ForecastError::Ingestion { .. }));
    }

    #[test]
    fn test_training_requires_label_column() {
        let csv = "\
country,year,month,max,min,std,count,sales,med,prev
United Kingdom,2017,10,587.902,135.640,1063.932092,1724,873612.9,309.945,856548.78
";
        let scored: Vec<CountryRecord> = read_from(csv.as_bytes(), Path::new("inline")).unwrap();
        assert_eq!(scored[0].next, 0.0);

        let err = read_training_from::<CountryRecord, _>(csv.as_bytes(), Path::new("inline"))
            .unwrap_err();
        match err {
            ForecastError::Ingestion { message, .. } => {
                assert!(message.contains("next"), "{message}")
            }
            other => panic!("expected ingestion error, got {other:?}"),
        }
    }

    #[test]
    fn test_training_reads_labeled_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(COUNTRY_CSV.as_bytes()).unwrap();
        let records: Vec<CountryRecord> = read_training_records(file.path()).unwrap();
        assert_eq!(records[0].next, 1019647.67);

        let csv = "\
productId,year,month,units,avg,count,max,min,prev
988,2017,11,291,3.6,80,12,1,263
";
        let err = read_training_from::<ProductRecord, _>(csv.as_bytes(), Path::new("inline"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::Ingestion { .. }));
    }

    #[test]
    fn test_bad_month_rejected() {
        let csv = "\
next,country,year,month,max,min,std,count,sales,med,prev
1.0,UK,2017,13,1,1,1,1,1,1,1
";
        let err = read_from::<CountryRecord, _>(csv.as_bytes(), Path::new("inline")).unwrap_err();
        assert!(err.to_string().contains("month"), "{err}");
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let csv = "\
next,country,year,month,max,min,std,count,sales,med,prev
1.0,UK,2017,1,abc,1,1,1,1,1,1
";
        assert!(read_from::<CountryRecord, _>(csv.as_bytes(), Path::new("inline")).is_err());
    }

    #[test]
    fn test_read_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(COUNTRY_CSV.as_bytes()).unwrap();
        let records: Vec<CountryRecord> = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let err = read_records::<CountryRecord>("/nonexistent/country.stats.csv").unwrap_err();
        assert!(matches!(err, ForecastError::Ingestion { .. }));
    }
}
