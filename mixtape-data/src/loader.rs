//! Cache-or-fetch dataset loading

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::datasets::Dataset;
use crate::dta;
use crate::error::{MixtapeError, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::snapshot;
use crate::table::Table;

/// Loads Mixtape datasets from the local cache or the remote origin
#[derive(Debug, Clone)]
pub struct DatasetLoader<F: Fetcher = HttpFetcher> {
    config: LoaderConfig,
    fetcher: F,
}

impl DatasetLoader<HttpFetcher> {
    /// Loader backed by the HTTP fetcher
    pub fn new(config: LoaderConfig) -> Result<Self> {
        Ok(Self::with_fetcher(config, HttpFetcher::new()?))
    }
}

impl<F: Fetcher> DatasetLoader<F> {
    pub fn with_fetcher(config: LoaderConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Path checked for a cached copy of `filename`
    pub fn cache_path(&self, filename: &str) -> PathBuf {
        self.config.cache_path(filename)
    }

    /// Path the snapshot of `filename` is written to after a fetch
    pub fn snapshot_path(&self, filename: &str) -> PathBuf {
        self.config.snapshot_path(filename)
    }

    /// Load `filename`, from the cache when `use_cache` is set and a cached
    /// file exists, otherwise from the remote origin.
    ///
    /// The cache is checked at `cache_dir/<filename>` (parsed as `.dta`), but
    /// a fetched table is written to `cache_dir/<stem>.bin`. A fetch therefore
    /// does not populate the path the next call checks; see [`Self::read_snapshot`].
    pub fn load(&self, filename: &str, use_cache: bool) -> Result<Table> {
        if filename.is_empty() {
            return Err(MixtapeError::InvalidFilename);
        }

        let cache_path = self.cache_path(filename);
        if use_cache && cache_path.exists() {
            info!(path = %cache_path.display(), "Loading dataset from cache");
            let bytes = fs::read(&cache_path).map_err(|e| MixtapeError::io(&cache_path, e))?;
            return dta::from_bytes(&bytes).map_err(|source| MixtapeError::Parse {
                origin: cache_path.display().to_string(),
                source,
            });
        }

        let url = self.config.url_for(filename);
        info!(%url, "Downloading dataset");
        let bytes = self.fetcher.fetch(&url)?;
        let table = dta::from_bytes(&bytes).map_err(|source| MixtapeError::Parse {
            origin: url.clone(),
            source,
        })?;
        debug!(rows = table.nrows(), columns = table.ncols(), "Parsed dataset");

        if use_cache {
            let dir = &self.config.cache_dir;
            fs::create_dir_all(dir).map_err(|e| MixtapeError::io(dir, e))?;
            let path = self.snapshot_path(filename);
            snapshot::write(&path, &table).map_err(|source| MixtapeError::Snapshot {
                path: path.clone(),
                source,
            })?;
            info!(path = %path.display(), "Cached dataset snapshot");
        }

        Ok(table)
    }

    /// Load a registered dataset
    pub fn load_dataset(&self, dataset: Dataset, use_cache: bool) -> Result<Table> {
        self.load(dataset.filename(), use_cache)
    }

    /// Read the snapshot a previous fetch of `filename` wrote
    pub fn read_snapshot(&self, filename: &str) -> Result<Table> {
        if filename.is_empty() {
            return Err(MixtapeError::InvalidFilename);
        }
        let path = self.snapshot_path(filename);
        snapshot::read(&path).map_err(|source| MixtapeError::Snapshot { path, source })
    }

    /// Lee-Moretti-Butler close elections data
    pub fn load_lmb(&self) -> Result<Table> {
        self.load_dataset(Dataset::Lmb, true)
    }

    /// Castle doctrine data
    pub fn load_castle(&self) -> Result<Table> {
        self.load_dataset(Dataset::Castle, true)
    }

    /// Card (1995) returns to schooling data
    pub fn load_card(&self) -> Result<Table> {
        self.load_dataset(Dataset::Card, true)
    }

    /// Texas incarceration data
    pub fn load_texas(&self) -> Result<Table> {
        self.load_dataset(Dataset::Texas, true)
    }

    /// National Supported Work data
    pub fn load_nsw(&self) -> Result<Table> {
        self.load_dataset(Dataset::Nsw, true)
    }

    /// Abortion legalization data
    pub fn load_abortion(&self) -> Result<Table> {
        self.load_dataset(Dataset::Abortion, true)
    }

    /// CPS control group data
    pub fn load_cps(&self) -> Result<Table> {
        self.load_dataset(Dataset::Cps, true)
    }
}
