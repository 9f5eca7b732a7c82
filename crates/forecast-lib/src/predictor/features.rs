//! Feature construction for training and inference
//!
//! Turns a record into the model input: its numeric fields in schema order
//! followed by a one-hot encoding of the unit key. The vocabulary is learned
//! once by [`fit_encoding`] and then closed.

use crate::error::{ForecastError, Result};
use crate::models::{FeatureVector, Observation};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;

/// One-hot vocabulary learned from a training set
///
/// Keys are kept sorted, so the encoding does not depend on the order in
/// which training rows were seen.
pub struct FittedEncoding<R> {
    vocabulary: Vec<String>,
    _schema: PhantomData<fn(&R)>,
}

impl<R: Observation> FittedEncoding<R> {
    /// Learn the vocabulary of unit keys from a dataset
    pub fn fit(records: &[R]) -> Result<Self> {
        if records.is_empty() {
            return Err(ForecastError::Fit(
                "cannot fit an encoding on an empty dataset".to_string(),
            ));
        }
        let keys: BTreeSet<&str> = records.iter().map(|r| r.unit_key()).collect();
        Ok(Self {
            vocabulary: keys.into_iter().map(str::to_string).collect(),
            _schema: PhantomData,
        })
    }

    /// Rebuild an encoding from a stored vocabulary
    pub(crate) fn from_vocabulary(mut vocabulary: Vec<String>) -> Self {
        vocabulary.sort();
        vocabulary.dedup();
        Self {
            vocabulary,
            _schema: PhantomData,
        }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn numeric_len(&self) -> usize {
        R::NUMERIC_FIELDS.len()
    }

    /// Total model input width
    pub fn feature_len(&self) -> usize {
        self.numeric_len() + self.vocabulary.len()
    }

    /// Position of a key in the one-hot block, `None` when unseen
    pub fn category_index(&self, key: &str) -> Option<usize> {
        self.vocabulary
            .binary_search_by(|probe| probe.as_str().cmp(key))
            .ok()
    }

    /// Build the model input for one record
    pub fn transform(&self, record: &R) -> FeatureVector {
        let numeric_len = self.numeric_len();
        let mut values = Vec::with_capacity(self.feature_len());
        values.extend(record.numeric_values());
        values.resize(self.feature_len(), 0.0);
        if let Some(idx) = self.category_index(record.unit_key()) {
            values[numeric_len + idx] = 1.0;
        }
        FeatureVector::new(values, numeric_len)
    }

    /// Column names in model input order, e.g. `country=United Kingdom`
    pub fn feature_names(&self) -> Vec<String> {
        R::field_names()
            .into_iter()
            .chain(
                self.vocabulary
                    .iter()
                    .map(|key| format!("{}={}", R::KEY_FIELD, key)),
            )
            .collect()
    }
}

impl<R> Clone for FittedEncoding<R> {
    fn clone(&self) -> Self {
        Self {
            vocabulary: self.vocabulary.clone(),
            _schema: PhantomData,
        }
    }
}

impl<R> PartialEq for FittedEncoding<R> {
    fn eq(&self, other: &Self) -> bool {
        self.vocabulary == other.vocabulary
    }
}

impl<R> fmt::Debug for FittedEncoding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedEncoding")
            .field("vocabulary", &self.vocabulary)
            .finish()
    }
}

/// Learn the one-hot vocabulary from a dataset
pub fn fit_encoding<R: Observation>(records: &[R]) -> Result<FittedEncoding<R>> {
    FittedEncoding::fit(records)
}

/// Build the feature vector for one record under a fitted encoding
pub fn transform<R: Observation>(record: &R, encoding: &FittedEncoding<R>) -> FeatureVector {
    encoding.transform(record)
}
