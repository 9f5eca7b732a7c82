//! Integration tests for the trainer
//!
//! These tests verify:
//! - Seeded fits are reproducible
//! - Row order does not change the fitted pipeline's behaviour
//! - Unseen keys and invalid inputs

use super::*;
use crate::models::{CountryRecord, ProductRecord};

fn country(name: &str, year: f64, month: usize, sales: f64) -> CountryRecord {
    CountryRecord {
        next: sales * (1.0 + 0.02 * month as f64),
        country: name.to_string(),
        year,
        month: month as f64,
        max: sales / 120.0,
        min: 0.4,
        std: 5.0 + month as f64,
        count: 25.0,
        units_sold: sales,
        median: sales / 350.0,
        prev: sales * 0.96,
        avg: 0.0,
    }
}

/// UK and US, 24 months each
fn uk_us_dataset() -> Vec<CountryRecord> {
    (0..24)
        .flat_map(|i| {
            let year = 2016.0 + (i / 12) as f64;
            let month = i % 12 + 1;
            [
                country("UK", year, month, 800_000.0 + 9_000.0 * i as f64),
                country("US", year, month, 40_000.0 + 1_500.0 * i as f64),
            ]
        })
        .collect()
}

fn small_params() -> TrainerParams {
    TrainerParams {
        n_trees: 25,
        min_samples_leaf: 4,
        ..Default::default()
    }
}

mod determinism_tests {
    use super::*;

    #[test]
    fn test_same_seed_same_model() {
        let data = uk_us_dataset();
        let a = fit_pipeline(&data, &small_params(), 2).unwrap();
        let b = fit_pipeline(&data, &small_params(), 2).unwrap();
        assert_eq!(a.model(), b.model());
        assert_eq!(a.encoding(), b.encoding());
    }

    #[test]
    fn test_subsampled_fit_depends_only_on_seed() {
        let data = uk_us_dataset();
        let params = TrainerParams {
            subsample: 0.7,
            ..small_params()
        };
        let a = fit_pipeline(&data, &params, 5).unwrap();
        let b = fit_pipeline(&data, &params, 5).unwrap();
        let c = fit_pipeline(&data, &params, 6).unwrap();
        assert_eq!(a.model(), b.model());
        assert_ne!(a.model(), c.model());
    }

    #[test]
    fn test_row_permutation_keeps_predictions() {
        let data = uk_us_dataset();
        let mut permuted = data.clone();
        permuted.reverse();

        let a = fit_pipeline(&data, &small_params(), 2).unwrap();
        let b = fit_pipeline(&permuted, &small_params(), 2).unwrap();
        assert_eq!(a.encoding().vocabulary(), b.encoding().vocabulary());

        for record in &data {
            let (pa, pb) = (a.predict(record), b.predict(record));
            assert!((pa - pb).abs() <= 1e-6 * pa.abs().max(1.0), "{pa} vs {pb}");
        }
    }
}

mod fit_tests {
    use super::*;

    #[test]
    fn test_predictions_track_labels() {
        let data = uk_us_dataset();
        let pipeline = fit_pipeline(&data, &TrainerParams::default(), 2).unwrap();

        let uk = pipeline.predict(&data[20]);
        let us = pipeline.predict(&data[21]);
        assert!(uk > us * 5.0, "UK {uk} should dwarf US {us}");

        let rmse = {
            let sq: f64 = data
                .iter()
                .map(|r| (pipeline.predict(r) - r.label()).powi(2))
                .sum();
            (sq / data.len() as f64).sqrt()
        };
        let mean = data.iter().map(|r| r.label()).sum::<f64>() / data.len() as f64;
        assert!(rmse < mean * 0.5, "training rmse {rmse} vs mean {mean}");
    }

    #[test]
    fn test_unseen_key_gives_finite_prediction() {
        let pipeline = fit_pipeline(&uk_us_dataset(), &small_params(), 2).unwrap();
        let score = pipeline.predict(&country("FR", 2017.0, 4, 60_000.0));
        assert!(score.is_finite());
        assert!(score > 0.0);
    }

    #[test]
    fn test_model_shape() {
        let pipeline = fit_pipeline(&uk_us_dataset(), &small_params(), 2).unwrap();
        let model = pipeline.model();
        assert_eq!(model.trees().len(), 25);
        assert_eq!(model.n_features(), 9 + 2);
        assert!(model.trees().iter().all(|t| t.n_leaves() <= 20));
        assert!(model.validate().is_ok());
        assert_eq!(pipeline.info().trained_rows, 48);
    }

    #[test]
    fn test_product_schema() {
        let data: Vec<ProductRecord> = (0..30)
            .map(|i| ProductRecord {
                next: 10.0 + (i % 7) as f64,
                product_id: format!("P{}", i % 3),
                year: 2017.0,
                month: (i % 12 + 1) as f64,
                units: 9.0 + (i % 5) as f64,
                avg: 2.5,
                count: 4.0,
                max: 5.0,
                min: 1.0,
                prev: 8.0,
            })
            .collect();
        let pipeline = fit_pipeline(&data, &small_params(), 2).unwrap();
        assert_eq!(pipeline.encoding().feature_len(), 8 + 3);
        assert!(pipeline.predict(&data[0]).is_finite());
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_negative_label_is_fit_error() {
        let mut data = uk_us_dataset();
        data[3].next = -1.0;
        let err = fit_pipeline(&data, &small_params(), 2).unwrap_err();
        assert!(matches!(err, ForecastError::Fit(_)));
    }

    #[test]
    fn test_all_zero_labels_is_fit_error() {
        let mut data = uk_us_dataset();
        for record in &mut data {
            record.next = 0.0;
        }
        assert!(matches!(
            fit_pipeline(&data, &small_params(), 2),
            Err(ForecastError::Fit(_))
        ));
    }

    #[test]
    fn test_empty_dataset_is_fit_error() {
        let err = fit_pipeline::<CountryRecord>(&[], &small_params(), 2).unwrap_err();
        assert!(matches!(err, ForecastError::Fit(_)));
    }

    #[test]
    fn test_invalid_params_rejected_at_construction() {
        let params = TrainerParams {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(matches!(Trainer::new(params), Err(ForecastError::Fit(_))));
    }

    #[test]
    fn test_fit_model_with_external_encoding() {
        let data = uk_us_dataset();
        let encoding = crate::predictor::fit_encoding(&data).unwrap();
        let model = fit_model(&data, &encoding, &small_params(), 2).unwrap();
        assert_eq!(model.n_features(), encoding.feature_len());
    }
}
