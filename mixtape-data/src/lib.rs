//! Mixtape Data Library
//!
//! Loaders for the example datasets of *Causal Inference: The Mixtape*.
//! Datasets are Stata `.dta` files fetched from the book's GitHub repository
//! and cached under `~/.cache/mixtape-causalpy/`.
//!
//! # Usage as Library
//!
//! ```rust,no_run
//! use mixtape_data::{load_lmb, load_mixtape_data};
//!
//! let lmb = load_lmb()?;
//! println!("{} rows x {} columns", lmb.nrows(), lmb.ncols());
//!
//! let nsw = load_mixtape_data("nsw_mixtape.dta", false)?;
//! # Ok::<(), mixtape_data::MixtapeError>(())
//! ```
//!
//! Use [`DatasetLoader`] with a custom [`LoaderConfig`] to change the origin
//! or the cache directory.

pub mod config;
pub mod datasets;
pub mod dta;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod snapshot;
pub mod table;

pub use config::{LoaderConfig, MIXTAPE_BASE_URL};
pub use datasets::{Dataset, UnknownDataset};
pub use error::{MixtapeError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use loader::DatasetLoader;
pub use table::{Column, ColumnData, Table, Value, ValueLabels};

fn default_loader() -> Result<DatasetLoader> {
    DatasetLoader::new(LoaderConfig::default())
}

/// Load a dataset by filename from the Mixtape repository, using the local
/// cache when `use_cache` is set.
///
/// Value-labeled columns keep their integer codes rather than becoming label
/// text; decode them with [`Table::labeled`].
pub fn load_mixtape_data(filename: &str, use_cache: bool) -> Result<Table> {
    default_loader()?.load(filename, use_cache)
}

/// Lee-Moretti-Butler close elections data (`lmb-data.dta`)
pub fn load_lmb() -> Result<Table> {
    default_loader()?.load_lmb()
}

/// Castle doctrine data (`castle.dta`)
pub fn load_castle() -> Result<Table> {
    default_loader()?.load_castle()
}

/// Card (1995) returns to schooling data (`card.dta`)
pub fn load_card() -> Result<Table> {
    default_loader()?.load_card()
}

/// Texas incarceration data (`texas.dta`)
pub fn load_texas() -> Result<Table> {
    default_loader()?.load_texas()
}

/// National Supported Work data (`nsw_mixtape.dta`)
pub fn load_nsw() -> Result<Table> {
    default_loader()?.load_nsw()
}

/// Abortion legalization data (`abortion.dta`)
pub fn load_abortion() -> Result<Table> {
    default_loader()?.load_abortion()
}

/// CPS control group data (`cps_mixtape.dta`)
pub fn load_cps() -> Result<Table> {
    default_loader()?.load_cps()
}
