//! Integration tests for the model store
//!
//! These tests verify:
//! - Save/load round trips predict identically
//! - Concurrent saves to one path leave one complete artifact
//! - Overwrites, missing files, corruption and schema checks

use super::*;
use crate::models::{CountryRecord, ProductRecord};
use crate::training::{fit_pipeline, TrainerParams};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn country(name: &str, month: usize, sales: f64) -> CountryRecord {
    CountryRecord {
        next: sales * 1.08,
        country: name.to_string(),
        year: 2017.0,
        month: month as f64,
        max: sales / 80.0,
        min: 0.5,
        std: 6.0,
        count: 20.0 + month as f64,
        units_sold: sales,
        median: sales / 300.0,
        prev: sales * 0.97,
        avg: 0.0,
    }
}

fn dataset(scale: f64) -> Vec<CountryRecord> {
    (0..40)
        .map(|i| {
            let name = ["UK", "US"][i % 2];
            country(name, i % 12 + 1, scale * (500.0 + 40.0 * i as f64))
        })
        .collect()
}

fn params() -> TrainerParams {
    TrainerParams {
        n_trees: 12,
        min_samples_leaf: 3,
        ..Default::default()
    }
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_load_predicts_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let pipeline = fit_pipeline(&dataset(1.0), &params(), 2).unwrap();

        save(&pipeline, &path).unwrap();
        let restored: FittedPipeline<CountryRecord> = load(&path).unwrap();

        assert_eq!(restored.encoding(), pipeline.encoding());
        assert_eq!(restored.model(), pipeline.model());
        assert_eq!(restored.info(), pipeline.info());
        for probe in [country("UK", 3, 900.0), country("US", 8, 2100.0), country("FR", 1, 700.0)] {
            assert_eq!(restored.predict(&probe), pipeline.predict(&probe));
        }
    }

    #[test]
    fn test_save_replaces_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let first = fit_pipeline(&dataset(1.0), &params(), 2).unwrap();
        let second = fit_pipeline(&dataset(3.0), &params(), 2).unwrap();

        save(&first, &path).unwrap();
        save(&second, &path).unwrap();
        let restored: FittedPipeline<CountryRecord> = load(&path).unwrap();

        let probe = country("UK", 5, 1500.0);
        assert_eq!(restored.predict(&probe), second.predict(&probe));
        assert_ne!(restored.predict(&probe), first.predict(&probe));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_saves_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let pipelines = [
            Arc::new(fit_pipeline(&dataset(1.0), &params(), 2).unwrap()),
            Arc::new(fit_pipeline(&dataset(3.0), &params(), 2).unwrap()),
        ];
        let probe = country("UK", 5, 1500.0);
        let expected: Vec<f64> = pipelines.iter().map(|p| p.predict(&probe)).collect();

        for _ in 0..20 {
            let barrier = Arc::new(Barrier::new(pipelines.len()));
            let handles: Vec<_> = pipelines
                .iter()
                .map(|pipeline| {
                    let pipeline = Arc::clone(pipeline);
                    let barrier = Arc::clone(&barrier);
                    let path = path.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        save(&*pipeline, &path)
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap().unwrap();
            }

            let restored: FittedPipeline<CountryRecord> = load(&path).unwrap();
            assert!(expected.contains(&restored.predict(&probe)));
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        }
    }

    #[test]
    fn test_save_into_missing_directory_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent").join("model.json");
        let pipeline = fit_pipeline(&dataset(1.0), &params(), 2).unwrap();

        let err = save(&pipeline, &path).unwrap_err();
        assert!(matches!(err, ForecastError::Io(_)), "{err:?}");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

mod failure_tests {
    use super::*;

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = load::<CountryRecord>(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactNotFound(_)));
    }

    #[test]
    fn test_unparseable_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = load::<CountryRecord>(&path).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let pipeline = fit_pipeline(&dataset(1.0), &params(), 2).unwrap();
        save(&pipeline, &path).unwrap();

        let mut envelope: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        envelope["payload"]["metadata"]["seed"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        match load::<CountryRecord>(&path).unwrap_err() {
            ForecastError::ArtifactCorrupt { message, .. } => {
                assert!(message.contains("checksum"), "{message}")
            }
            other => panic!("expected corrupt artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let pipeline = fit_pipeline(&dataset(1.0), &params(), 2).unwrap();
        save(&pipeline, &path).unwrap();

        let err = load::<ProductRecord>(&path).unwrap_err();
        match err {
            ForecastError::SchemaMismatch { expected, found } => {
                assert!(expected.starts_with("product"));
                assert!(found.starts_with("country"));
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, br#"{"format":"other","checksum":"","payload":{}}"#).unwrap();

        let err = load::<CountryRecord>(&path).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactCorrupt { .. }));
    }
}
