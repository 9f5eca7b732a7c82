//! Core data models for the forecasting pipeline
//!
//! A record schema is an [`Observation`]: a categorical unit key, a label and
//! an explicit ordered list of numeric fields. The same list drives feature
//! construction at fit time, at transform time and the artifact schema check.

use serde::{Deserialize, Serialize};

/// One numeric model input, bound by accessor rather than by column name
pub struct NumericField<R> {
    pub name: &'static str,
    pub value: fn(&R) -> f64,
}

/// Record schema understood by the feature pipeline
pub trait Observation: Sized + Send + Sync + 'static {
    /// Schema identifier stored in model artifacts
    const SCHEMA: &'static str;

    /// Name of the categorical identity column
    const KEY_FIELD: &'static str;

    /// Name of the label column
    const LABEL_FIELD: &'static str = "next";

    /// Numeric features, in model input order
    const NUMERIC_FIELDS: &'static [NumericField<Self>];

    fn unit_key(&self) -> &str;

    /// Training target (next month's value)
    fn label(&self) -> f64;

    fn field_names() -> Vec<String> {
        Self::NUMERIC_FIELDS
            .iter()
            .map(|f| f.name.to_string())
            .collect()
    }

    /// Numeric feature values in model input order
    fn numeric_values(&self) -> impl Iterator<Item = f64> + '_ {
        Self::NUMERIC_FIELDS.iter().map(move |f| (f.value)(self))
    }

    /// Calendar month of the record, when the schema has one
    fn month(&self) -> Option<f64> {
        None
    }
}

/// Monthly aggregate statistics for one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// Next month's sales; absent for records that are only scored
    #[serde(default)]
    pub next: f64,
    #[serde(alias = "unit_key")]
    pub country: String,
    pub year: f64,
    pub month: f64,
    pub max: f64,
    pub min: f64,
    pub std: f64,
    pub count: f64,
    #[serde(rename = "sales", alias = "units_sold")]
    pub units_sold: f64,
    #[serde(rename = "med", alias = "median")]
    pub median: f64,
    pub prev: f64,
    /// Not a model input
    #[serde(default)]
    pub avg: f64,
}

impl Observation for CountryRecord {
    const SCHEMA: &'static str = "country";
    const KEY_FIELD: &'static str = "country";
    const NUMERIC_FIELDS: &'static [NumericField<Self>] = &[
        NumericField {
            name: "year",
            value: |r| r.year,
        },
        NumericField {
            name: "month",
            value: |r| r.month,
        },
        NumericField {
            name: "max",
            value: |r| r.max,
        },
        NumericField {
            name: "min",
            value: |r| r.min,
        },
        NumericField {
            name: "std",
            value: |r| r.std,
        },
        NumericField {
            name: "count",
            value: |r| r.count,
        },
        NumericField {
            name: "sales",
            value: |r| r.units_sold,
        },
        NumericField {
            name: "med",
            value: |r| r.median,
        },
        NumericField {
            name: "prev",
            value: |r| r.prev,
        },
    ];

    fn unit_key(&self) -> &str {
        &self.country
    }

    fn label(&self) -> f64 {
        self.next
    }

    fn month(&self) -> Option<f64> {
        Some(self.month)
    }
}

/// Monthly aggregate statistics for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default)]
    pub next: f64,
    #[serde(rename = "productId", alias = "product_id")]
    pub product_id: String,
    pub year: f64,
    pub month: f64,
    pub units: f64,
    pub avg: f64,
    pub count: f64,
    pub max: f64,
    pub min: f64,
    pub prev: f64,
}

impl Observation for ProductRecord {
    const SCHEMA: &'static str = "product";
    const KEY_FIELD: &'static str = "productId";
    const NUMERIC_FIELDS: &'static [NumericField<Self>] = &[
        NumericField {
            name: "year",
            value: |r| r.year,
        },
        NumericField {
            name: "month",
            value: |r| r.month,
        },
        NumericField {
            name: "units",
            value: |r| r.units,
        },
        NumericField {
            name: "avg",
            value: |r| r.avg,
        },
        NumericField {
            name: "count",
            value: |r| r.count,
        },
        NumericField {
            name: "max",
            value: |r| r.max,
        },
        NumericField {
            name: "min",
            value: |r| r.min,
        },
        NumericField {
            name: "prev",
            value: |r| r.prev,
        },
    ];

    fn unit_key(&self) -> &str {
        &self.product_id
    }

    fn label(&self) -> f64 {
        self.next
    }

    fn month(&self) -> Option<f64> {
        Some(self.month)
    }
}

/// Model input: numeric fields followed by the one-hot unit key
///
/// Only produced by a fitted encoding, so its length always matches the
/// model it is scored against.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    numeric_len: usize,
}

impl FeatureVector {
    pub(crate) fn new(values: Vec<f64>, numeric_len: usize) -> Self {
        Self {
            values,
            numeric_len,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn numeric(&self) -> &[f64] {
        &self.values[..self.numeric_len]
    }

    /// One-hot sub-vector; all zeros for a key outside the vocabulary
    pub fn categorical(&self) -> &[f64] {
        &self.values[self.numeric_len..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uk_record() -> CountryRecord {
        CountryRecord {
            next: 1_019_647.67,
            country: "United Kingdom".to_string(),
            year: 2017.0,
            month: 10.0,
            max: 587.902,
            min: 135.640,
            std: 1063.932092,
            count: 1724.0,
            units_sold: 873_612.9,
            median: 309.945,
            prev: 856_548.78,
            avg: 0.0,
        }
    }

    #[test]
    fn test_country_field_order() {
        assert_eq!(
            CountryRecord::field_names(),
            vec!["year", "month", "max", "min", "std", "count", "sales", "med", "prev"]
        );
    }

    #[test]
    fn test_country_numeric_values_follow_field_order() {
        let values: Vec<f64> = uk_record().numeric_values().collect();
        assert_eq!(
            values,
            vec![
                2017.0,
                10.0,
                587.902,
                135.640,
                1063.932092,
                1724.0,
                873_612.9,
                309.945,
                856_548.78
            ]
        );
    }

    #[test]
    fn test_avg_is_not_a_country_feature() {
        let mut record = uk_record();
        let before: Vec<f64> = record.numeric_values().collect();
        record.avg = 42.0;
        let after: Vec<f64> = record.numeric_values().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_product_field_order() {
        assert_eq!(
            ProductRecord::field_names(),
            vec!["year", "month", "units", "avg", "count", "max", "min", "prev"]
        );
        assert_eq!(ProductRecord::KEY_FIELD, "productId");
    }

    #[test]
    fn test_country_record_json_uses_source_headers() {
        let json = serde_json::to_value(uk_record()).unwrap();
        assert!(json.get("sales").is_some());
        assert!(json.get("med").is_some());
        assert!(json.get("units_sold").is_none());
    }

    #[test]
    fn test_feature_vector_split() {
        let v = FeatureVector::new(vec![1.0, 2.0, 0.0, 1.0], 2);
        assert_eq!(v.numeric(), &[1.0, 2.0]);
        assert_eq!(v.categorical(), &[0.0, 1.0]);
        assert_eq!(v.len(), 4);
    }
}
