//! Terminal and JSON reporting

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use forecast_lib::CrossValidationReport;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tabled::{settings::Style, Table, Tabled};

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Inverse label transform applied to values before display
///
/// Models return values on the scale they were trained on. When the training
/// label was compressed upstream (e.g. with a 10th root), `power:10` restores
/// the currency scale.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LabelTransform {
    #[default]
    Identity,
    Power(f64),
}

impl LabelTransform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            LabelTransform::Identity => value,
            LabelTransform::Power(exponent) => value.powf(exponent),
        }
    }
}

impl FromStr for LabelTransform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("identity") {
            return Ok(LabelTransform::Identity);
        }
        match s.split_once(':') {
            Some((kind, exponent)) if kind.eq_ignore_ascii_case("power") => {
                let exponent: f64 = exponent
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid exponent in label transform {s:?}"))?;
                if !exponent.is_finite() {
                    bail!("Label transform exponent must be finite, got {exponent}");
                }
                Ok(LabelTransform::Power(exponent))
            }
            _ => bail!("Unknown label transform {s:?} (expected identity or power:<exponent>)"),
        }
    }
}

impl fmt::Display for LabelTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelTransform::Identity => write!(f, "identity"),
            LabelTransform::Power(exponent) => write!(f, "power:{exponent}"),
        }
    }
}

/// One forecast ready for display
#[derive(Debug, Clone, Serialize)]
pub struct PredictionLine {
    pub unit_key: String,
    pub year: f64,
    /// Month being forecast (one after the record's month)
    pub target_month: f64,
    pub predicted: f64,
    pub actual: Option<f64>,
}

#[derive(Tabled)]
struct FoldRow {
    #[tabled(rename = "Fold")]
    fold: usize,
    #[tabled(rename = "Train")]
    n_train: usize,
    #[tabled(rename = "Test")]
    n_test: usize,
    #[tabled(rename = "RMSE")]
    rmse: String,
    #[tabled(rename = "MAE")]
    mae: String,
    #[tabled(rename = "Deviance")]
    loss: String,
    #[tabled(rename = "R²")]
    r_squared: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std dev")]
    std_dev: String,
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Unit")]
    unit_key: String,
    #[tabled(rename = "Year")]
    year: String,
    #[tabled(rename = "Month")]
    month: String,
    #[tabled(rename = "Forecast")]
    predicted: String,
    #[tabled(rename = "Actual")]
    actual: String,
}

/// Print per-fold and aggregate cross-validation metrics
pub fn print_cross_validation(report: &CrossValidationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            print_info(&format!("Cross-validation over {} folds", report.n_folds()));
            let folds: Vec<FoldRow> = report
                .folds
                .iter()
                .map(|f| FoldRow {
                    fold: f.fold + 1,
                    n_train: f.n_train,
                    n_test: f.n_test,
                    rmse: format_value(f.metrics.rmse),
                    mae: format_value(f.metrics.mae),
                    loss: format_value(f.metrics.loss),
                    r_squared: color_r_squared(f.metrics.r_squared),
                })
                .collect();
            println!("{}", Table::new(folds).with(Style::rounded()).to_string());

            let summary = vec![
                summary_row("RMSE", report.rmse.mean, report.rmse.std_dev),
                summary_row("MAE", report.mae.mean, report.mae.std_dev),
                summary_row("Deviance", report.loss.mean, report.loss.std_dev),
                summary_row("R²", report.r_squared.mean, report.r_squared.std_dev),
            ];
            println!("{}", Table::new(summary).with(Style::rounded()).to_string());
        }
    }
    Ok(())
}

/// Print forecasts, applying the label transform to forecast and actual
pub fn print_predictions(
    lines: &[PredictionLine],
    transform: LabelTransform,
    format: OutputFormat,
) -> Result<()> {
    let shown: Vec<PredictionLine> = lines
        .iter()
        .map(|line| PredictionLine {
            predicted: transform.apply(line.predicted),
            actual: line.actual.map(|a| transform.apply(a)),
            ..line.clone()
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        OutputFormat::Table => {
            if shown.is_empty() {
                print_warning("No records to forecast");
                return Ok(());
            }
            let rows: Vec<PredictionRow> = shown
                .iter()
                .map(|line| PredictionRow {
                    unit_key: line.unit_key.clone(),
                    year: format!("{:.0}", line.year),
                    month: format!("{:.0}", line.target_month),
                    predicted: format_value(line.predicted).bold().to_string(),
                    actual: line
                        .actual
                        .map(format_value)
                        .unwrap_or_else(|| "-".dimmed().to_string()),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
        }
    }
    Ok(())
}

fn summary_row(metric: &'static str, mean: f64, std_dev: f64) -> SummaryRow {
    SummaryRow {
        metric,
        mean: format_value(mean),
        std_dev: format_value(std_dev),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a metric or forecast with precision suited to its magnitude
pub fn format_value(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 1000.0 {
        format!("{value:.0}")
    } else if magnitude >= 1.0 {
        format!("{value:.3}")
    } else {
        format!("{value:.5}")
    }
}

/// Color R² based on value
pub fn color_r_squared(r_squared: f64) -> String {
    let formatted = format!("{r_squared:.3}");
    if r_squared >= 0.8 {
        formatted.green().to_string()
    } else if r_squared >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
