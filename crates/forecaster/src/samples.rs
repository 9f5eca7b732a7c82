//! Built-in records scored by `predict` when no input file is given

use forecast_lib::CountryRecord;

/// A record to forecast, with the known outcome when there is one
#[derive(Debug, Clone)]
pub struct Sample<R> {
    pub record: R,
    pub actual: Option<f64>,
}

impl<R> Sample<R> {
    pub fn new(record: R) -> Self {
        Self {
            record,
            actual: None,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn country(
    country: &str,
    month: f64,
    median: f64,
    max: f64,
    min: f64,
    std: f64,
    prev: f64,
    count: f64,
    units_sold: f64,
) -> CountryRecord {
    CountryRecord {
        next: 0.0,
        country: country.to_string(),
        year: 2017.0,
        month,
        max,
        min,
        std,
        count,
        units_sold,
        median,
        prev,
        avg: 0.0,
    }
}

/// October and November 2017 for the United Kingdom and the United States.
///
/// Known outcomes are on the compressed label scale of the reference data
/// set (10th root of sales); display them with `--label-transform power:10`.
pub fn country_samples() -> Vec<Sample<CountryRecord>> {
    vec![
        Sample {
            record: country(
                "United Kingdom", 10.0, 309.945, 587.902, 135.640, 1063.932092, 856548.78,
                1724.0, 873612.9,
            ),
            actual: Some(6.0084501),
        },
        Sample::new(country(
            "United Kingdom", 11.0, 288.72, 501.488, 134.536, 707.5642, 873612.9, 2387.0,
            1019647.67,
        )),
        Sample {
            record: country(
                "United States", 10.0, 400.17, 573.63, 340.395, 340.3959, 4264.94, 10.0, 5322.56,
            ),
            actual: Some(3.805769),
        },
        Sample::new(country(
            "United States", 11.0, 317.9, 1135.99, 249.44, 409.75528, 5322.56, 11.0, 6393.96,
        )),
    ]
}
