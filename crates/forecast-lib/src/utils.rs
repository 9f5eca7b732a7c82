//! Shared helpers

use rayon::prelude::*;

/// Whether independent work items may run on rayon's pool.
///
/// Components never build thread pools themselves; they only respect this
/// flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    #[default]
    Parallel,
}

impl Parallelism {
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map every item and collect in input order
    pub fn maybe_par_map<T, U, F>(self, items: Vec<T>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Sync + Send,
    {
        if self.is_parallel() {
            items.into_par_iter().map(f).collect()
        } else {
            items.into_iter().map(f).collect()
        }
    }
}
