//! Fetches remote patches matching local tiles, masks them with the tile's
//! validity mask and resamples them onto the tile grid.

use crate::error::{ChipError, ChipResult};
use crate::progress::stage_bar;
use crate::raster::{crs_string, glob_sorted, read_band, validity_mask, write_band, GeoTransform};
use crate::remote::{Domain, PixelSource};
use gdal::Dataset;
use ndarray::Array2;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// worker count of the fetch pool when none is given
pub const DEFAULT_WORKERS: usize = 15;

/// zeroes fetched pixels wherever the mask is 0
pub fn apply_mask(fetched: &Array2<i32>, mask: &Array2<i32>) -> ChipResult<Array2<i32>> {
    if fetched.dim() != mask.dim() {
        return Err(ChipError::ShapeMismatch {
            fetched: fetched.dim(),
            mask: mask.dim(),
        });
    }
    Ok(fetched * mask)
}

/// Nearest-neighbour resampling between two north-up grids in the same CRS.
/// Each destination pixel takes the source pixel under its centre; pixels with
/// no source cover are 0.
pub fn reproject_nearest(
    source: &Array2<i32>,
    source_gt: &GeoTransform,
    dest_gt: &GeoTransform,
    dest_shape: (usize, usize),
) -> Array2<i32> {
    let (src_rows, src_cols) = source.dim();
    Array2::from_shape_fn(dest_shape, |(row, col)| {
        let (x, y) = dest_gt.apply(col as f64 + 0.5, row as f64 + 0.5);
        let (src_col, src_row) = source_gt.invert(x, y);
        if src_col < 0.0 || src_row < 0.0 {
            return 0;
        }
        let (c, r) = (src_col.floor() as usize, src_row.floor() as usize);
        if r < src_rows && c < src_cols {
            source[[r, c]]
        } else {
            0
        }
    })
}

/// fetches the remote band covering a tile and writes it, masked and aligned to
/// the tile grid, to `output_dir` under the tile's file name.
/// input_tile: tile raster whose extent, resolution, CRS and nodata drive the request
/// source: remote pixel source
/// band: band name requested from the source
/// output_dir: directory for the result; the file copies the tile's metadata
pub fn fetch_patch<S: PixelSource + ?Sized>(
    input_tile: &Path,
    source: &S,
    band: &str,
    output_dir: &Path,
) -> ChipResult<PathBuf> {
    let file_name = input_tile
        .file_name()
        .ok_or_else(|| ChipError::InvalidChipPath(input_tile.display().to_string()))?;
    let output_path = output_dir.join(file_name);

    let tile = Dataset::open(input_tile)?;
    let (width, height) = tile.raster_size();
    let tile_gt = GeoTransform::from(tile.geo_transform()?);
    let bounds = tile_gt.bounds(width, height);
    let domain = Domain::new(bounds, tile_gt.pixel_width, crs_string(&tile.projection()));

    let fetched = source.pixels(&domain, band)?;

    let nodata = tile.rasterband(1)?.no_data_value();
    let mask = validity_mask(&read_band::<f64>(&tile, 1)?, nodata);
    let masked = apply_mask(&fetched, &mask)?;

    let fetched_gt = GeoTransform::from_bounds(&bounds, masked.ncols(), masked.nrows());
    let aligned = reproject_nearest(&masked, &fetched_gt, &tile_gt, (height, width));

    // the copy keeps dtype, nodata and CRS; only band 1 carries data
    let out = tile.create_copy(&tile.driver(), &output_path, &[])?;
    write_band(&out, 1, &aligned)?;
    if out.raster_count() > 1 {
        let blank = Array2::<i32>::zeros((height, width));
        for index in 2..=out.raster_count() {
            write_band(&out, index, &blank)?;
        }
    }

    log::debug!("wrote {}", output_path.display());
    Ok(output_path)
}

/// Outcome of a batch fetch: written outputs and per-tile failures.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, ChipError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// runs `fetch_patch` for every tile on a pool of `workers` threads. Tasks are
/// independent: a failure is logged and recorded but does not stop the others,
/// and nothing is retried.
pub fn fetch_patches<S: PixelSource + ?Sized>(
    tiles: &[PathBuf],
    source: &S,
    band: &str,
    output_dir: &Path,
    workers: usize,
    desc: &str,
) -> ChipResult<BatchReport> {
    fs::create_dir_all(output_dir)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;

    let pb = stage_bar(tiles.len(), desc);
    let results: Vec<(PathBuf, ChipResult<PathBuf>)> = pool.install(|| {
        tiles
            .par_iter()
            .map(|tile| {
                let result = fetch_patch(tile, source, band, output_dir);
                if let Err(e) = &result {
                    log::error!("{}: {}", tile.display(), e);
                }
                pb.inc(1);
                (tile.clone(), result)
            })
            .collect()
    });
    pb.finish();

    let mut report = BatchReport::default();
    for (tile, result) in results {
        match result {
            Ok(path) => report.written.push(path),
            Err(e) => report.failures.push((tile, e)),
        }
    }
    Ok(report)
}

/// fetches a matching elevation patch for every `*.tif` tile directly inside
/// `in_dir`, writing them to `out_dir/dem`
pub fn fetch_dem<S: PixelSource + ?Sized>(
    in_dir: &Path,
    out_dir: &Path,
    source: &S,
    band: &str,
    workers: usize,
) -> ChipResult<BatchReport> {
    let tiles = glob_sorted(&in_dir.join("*.tif"))?;
    log::info!(
        "requesting {} for {} tiles from {} with {} workers",
        band,
        tiles.len(),
        in_dir.display(),
        workers
    );
    fetch_patches(
        &tiles,
        source,
        band,
        &out_dir.join("dem"),
        workers,
        "GEE data request progress: DEM",
    )
}
