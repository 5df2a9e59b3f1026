//! Clip loader: batching, shuffling and parallel fetching.

use crate::collate::{collate, Batch};
use crate::config::LoaderSettings;
use crate::constants::DEFAULT_BATCH_SIZE;
use crate::dataset::{ClipDataset, ClipWorker, LabeledClip};
use crate::{Error, Result};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};
use rayon::prelude::*;
use std::sync::{Mutex, PoisonError};

/// Configuration for the [`ClipLoader`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Number of clips per batch
    pub batch_size: usize,
    /// Whether to shuffle indices each epoch
    pub shuffle: bool,
    /// Base seed for reproducible shuffling; epoch `e` uses `seed + e`
    pub seed: Option<u64>,
    /// Number of parallel workers for clip fetching (0 = sequential)
    pub num_workers: usize,
    /// Whether to drop the last incomplete batch
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            shuffle: true,
            seed: None,
            num_workers: 0,
            drop_last: false,
        }
    }
}

impl LoaderConfig {
    #[must_use]
    pub fn from_settings(settings: &LoaderSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            shuffle: settings.shuffle,
            seed: None,
            num_workers: settings.num_workers,
            drop_last: settings.drop_last,
        }
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    #[must_use]
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }
}

/// Produces batches from a [`ClipDataset`].
///
/// Workers (private detector sets) are kept in a checkout pool: a fetch takes
/// one out, uses it exclusively and puts it back, so no detector is ever used
/// by two threads at once.
pub struct ClipLoader<'a> {
    dataset: &'a ClipDataset,
    config: LoaderConfig,
    indices: Vec<usize>,
    epoch: u64,
    workers: Mutex<Vec<ClipWorker<'a>>>,
    thread_pool: Option<rayon::ThreadPool>,
}

impl<'a> ClipLoader<'a> {
    /// Create a loader over `dataset`
    ///
    /// # Errors
    ///
    /// Returns an error if the batch size is zero or the worker thread pool
    /// cannot be built.
    pub fn new(dataset: &'a ClipDataset, config: LoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::ConfigError("Batch size must be greater than 0".to_string()));
        }
        let thread_pool = if config.num_workers > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.num_workers)
                    .thread_name(|i| format!("clip-loader-{i}"))
                    .build()
                    .map_err(|e| Error::ConfigError(format!("Failed to build loader thread pool: {e}")))?,
            )
        } else {
            None
        };

        Ok(Self {
            dataset,
            indices: (0..dataset.len()).collect(),
            config,
            epoch: 0,
            workers: Mutex::new(Vec::new()),
            thread_pool,
        })
    }

    /// The number of batches per epoch
    #[must_use]
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.dataset.len() / self.config.batch_size
        } else {
            self.dataset.len().div_ceil(self.config.batch_size)
        }
    }

    /// Total number of clips
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Reshuffle indices for the next epoch
    fn reshuffle(&mut self) {
        if self.config.shuffle {
            match self.config.seed {
                Some(seed) => {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(self.epoch));
                    self.indices.shuffle(&mut rng);
                }
                None => self.indices.shuffle(&mut thread_rng()),
            }
        }
        self.epoch += 1;
    }

    /// Start an epoch and iterate its batches
    ///
    /// Clips that fail with a per-item error are logged and left out of their
    /// batch; a batch left with no clips is skipped. Any other error is
    /// yielded and should end the epoch.
    pub fn iter_batches(&mut self) -> BatchIter<'_, 'a> {
        self.reshuffle();
        BatchIter {
            loader: self,
            position: 0,
        }
    }

    /// Run `f` with exclusive use of a pooled worker
    fn with_worker<T>(&self, f: impl FnOnce(&mut ClipWorker<'a>) -> Result<T>) -> Result<T> {
        let checked_out = self.workers.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let mut worker = match checked_out {
            Some(worker) => worker,
            None => {
                debug!("Creating clip worker");
                self.dataset.worker()?
            }
        };
        let result = f(&mut worker);
        self.workers.lock().unwrap_or_else(PoisonError::into_inner).push(worker);
        result
    }

    /// Fetch clips, in parallel when workers are configured
    fn fetch(&self, indices: &[usize]) -> Vec<Result<LabeledClip>> {
        match &self.thread_pool {
            Some(pool) if indices.len() > 1 => pool.install(|| {
                indices
                    .par_iter()
                    .map(|&i| self.with_worker(|worker| worker.get(i)))
                    .collect()
            }),
            _ => indices
                .iter()
                .map(|&i| self.with_worker(|worker| worker.get(i)))
                .collect(),
        }
    }
}

/// Iterator over one epoch of batches
pub struct BatchIter<'l, 'a> {
    loader: &'l ClipLoader<'a>,
    position: usize,
}

impl Iterator for BatchIter<'_, '_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let loader = self.loader;
        let batch_size = loader.config.batch_size;
        loop {
            let start = self.position;
            let end = (start + batch_size).min(loader.indices.len());
            if start >= end || (loader.config.drop_last && end - start < batch_size) {
                return None;
            }
            self.position = end;

            let mut items = Vec::with_capacity(end - start);
            for (index, result) in loader.indices[start..end].iter().zip(loader.fetch(&loader.indices[start..end])) {
                match result {
                    Ok(item) => items.push(item),
                    Err(e) if e.is_item_recoverable() => warn!("Dropping clip {index} from batch: {e}"),
                    Err(e) => return Some(Err(e)),
                }
            }

            if items.is_empty() {
                warn!("Skipping batch {start}..{end}: no clip could be loaded");
                continue;
            }
            return Some(collate(items));
        }
    }
}
