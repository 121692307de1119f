//! # floodchips
//!
//! `floodchips` is a crate that prepares a flood mapping training dataset from Sentinel-1 chips.
//! It splits georeferenced chips into 256 x 256 tiles and fetches matching elevation tiles from
//! Earth Engine, masked with each tile's nodata and aligned to the tile's pixel grid.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use floodchips::{fetch_patch, tile256, EeImage, EeSession, ImageSource, TileCountPolicy};
//!
//! let tiles = tile256(
//!     Path::new("data/chip_047/VV.tif"),
//!     Path::new("data/chips/VV"),
//!     TileCountPolicy::Ceil,
//! )
//! .unwrap();
//!
//! let session = EeSession::new("my-cloud-project", "ya29.token", None).unwrap();
//! let image = EeImage::new("NASA/NASADEM_HGT/001");
//! let source = ImageSource::new(&session, &image);
//! for tile in &tiles {
//!     fetch_patch(tile, &source, "elevation", Path::new("data/dem")).unwrap();
//! }
//! ```
//!
//! ## Usage
//! ### rust api
//! The crate provides these main functions:
//!
//! - `tile256`: splits a chip into zero padded 256 x 256 Float32 tiles.
//! - `fetch_patch`: fetches, masks and resamples a remote patch onto one tile.
//! - `fetch_patches`: runs `fetch_patch` over many tiles on a bounded worker pool.
//! - `make_dataset`: extracts the chip and label archives and tiles them into the project layout.
//!
//! ### Command line
//! the clap framework provides the `make-dataset` and `fetch-dem` commands.
//! the easiest way to see them is to run
//!```zsh
//! cargo run --release -- -h
//!```
//! `fetch-dem` reads the access token from `EE_ACCESS_TOKEN` unless `--access_token` is given.
//! Logging goes through `env_logger`; set `RUST_LOG=debug` for per-tile detail.
//!
//! ## Installation
//! gdal must be installed and the path environment variable must be set to the gdal binaries.
//! build using
//!```zsh
//! cargo build --release
//! cargo install --path .
//! ```
//!
pub mod args;
pub mod dataset;
pub mod error;
pub mod fetcher;
pub mod progress;
pub mod raster;
pub mod remote;
pub mod tiler;

pub use dataset::{extract_tifs, make_dataset, DatasetSummary, ProjectLayout};
pub use error::{ChipError, ChipResult};
pub use fetcher::{
    apply_mask, fetch_dem, fetch_patch, fetch_patches, reproject_nearest, BatchReport,
    DEFAULT_WORKERS,
};
pub use raster::{validity_mask, Bounds, GeoTransform};
pub use remote::{
    Domain, EeImage, EeSession, ImageSource, PixelSource, ELEVATION_BAND, NASADEM_ASSET,
};
pub use tiler::{tile256, TileCountPolicy, TILE_SIZE};
