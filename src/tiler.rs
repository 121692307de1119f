//! Splits georeferenced chips into fixed 256 x 256 tiles.

use crate::error::{ChipError, ChipResult};
use crate::raster::{read_band, write_band, GeoTransform};
use gdal::{raster::RasterCreationOption, Dataset, DriverManager};
use ndarray::{s, Array2};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// edge length of every produced tile, in pixels
pub const TILE_SIZE: usize = 256;

/// How the number of tiles along an axis is derived from the raster size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TileCountPolicy {
    /// every pixel lands in a tile; the last tile on each axis is zero padded
    #[default]
    Ceil,
    /// nearest-integer count (half to even); remainders under half a tile are dropped
    Round,
}

impl TileCountPolicy {
    pub fn tiles_along(self, pixels: usize) -> usize {
        match self {
            TileCountPolicy::Ceil => (pixels + TILE_SIZE - 1) / TILE_SIZE,
            TileCountPolicy::Round => {
                let whole = pixels / TILE_SIZE;
                let rem = pixels % TILE_SIZE;
                let half = TILE_SIZE / 2;
                if rem > half || (rem == half && whole % 2 == 1) {
                    whole + 1
                } else {
                    whole
                }
            }
        }
    }

    /// (rows, cols) of the tile grid for a raster of `width` x `height`
    pub fn grid(self, width: usize, height: usize) -> (usize, usize) {
        (self.tiles_along(height), self.tiles_along(width))
    }
}

/// geotransform of the tile at (row, col), offset from the source origin
pub fn tile_geotransform(source: &GeoTransform, row: usize, col: usize) -> GeoTransform {
    let res = source.pixel_width;
    let step = (TILE_SIZE as f64) * res;
    GeoTransform::north_up(
        source.origin_x + step * col as f64,
        source.origin_y - step * row as f64,
        res,
    )
}

/// numeric id from the trailing `_`-separated token of the chip's parent directory,
/// e.g. `.../Bolivia_103757/VV.tif` gives 103757
pub fn chip_id(raster_path: &Path) -> ChipResult<u32> {
    raster_path
        .parent()
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit('_').next())
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| ChipError::InvalidChipPath(raster_path.display().to_string()))
}

/// `{id:03}_{row}{col}.tif`. Row and col are not separated, so names are only
/// unique while both indices stay below 10; see [`tile_names_may_collide`].
pub fn tile_name(id: u32, row: usize, col: usize) -> String {
    format!("{:03}_{}{}.tif", id, row, col)
}

/// true when a `rows` x `cols` grid reaches a two digit index, where
/// e.g. (1, 11) and (11, 1) share a name
pub fn tile_names_may_collide(rows: usize, cols: usize) -> bool {
    rows > 10 || cols > 10
}

/// copies the (row, col) window of `band` into a zero-filled tile
pub fn extract_tile(band: &Array2<f32>, row: usize, col: usize) -> Array2<f32> {
    let (height, width) = band.dim();
    let mut tile = Array2::<f32>::zeros((TILE_SIZE, TILE_SIZE));

    let r0 = (row * TILE_SIZE).min(height);
    let c0 = (col * TILE_SIZE).min(width);
    let r1 = (r0 + TILE_SIZE).min(height);
    let c1 = (c0 + TILE_SIZE).min(width);

    tile.slice_mut(s![..r1 - r0, ..c1 - c0])
        .assign(&band.slice(s![r0..r1, c0..c1]));
    tile
}

/// splits the raster into 256 x 256 Float32, LZW compressed tiles written to the
/// output directory. Returns the paths of the written tiles.
/// raster_path: source chip, whose parent directory name ends in the chip id
/// output_dir: directory for the tiles, created if missing
/// policy: how partial tiles at the right and bottom edges are counted
pub fn tile256(
    raster_path: &Path,
    output_dir: &Path,
    policy: TileCountPolicy,
) -> ChipResult<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let id = chip_id(raster_path)?;
    let src = Dataset::open(raster_path)?;
    let (width, height) = src.raster_size();
    let source_gt = GeoTransform::from(src.geo_transform()?);
    let projection = src.projection();
    let nodata = src.rasterband(1)?.no_data_value();
    let band = read_band::<f32>(&src, 1)?;

    let (rows, cols) = policy.grid(width, height);
    log::debug!(
        "{}: {}x{} px -> {}x{} tiles",
        raster_path.display(),
        width,
        height,
        rows,
        cols
    );
    if tile_names_may_collide(rows, cols) {
        log::warn!(
            "{}: {}x{} tile grid exceeds 10 on an axis, tile names may collide and overwrite",
            raster_path.display(),
            rows,
            cols
        );
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = [RasterCreationOption {
        key: "COMPRESS",
        value: "LZW",
    }];

    let mut written = Vec::with_capacity(rows * cols);
    for col in 0..cols {
        for row in 0..rows {
            let tile_path = output_dir.join(tile_name(id, row, col));
            let mut dst = driver.create_with_band_type_with_options::<f32, _>(
                &tile_path,
                TILE_SIZE as isize,
                TILE_SIZE as isize,
                1,
                &options,
            )?;
            let tile_gt: [f64; 6] = tile_geotransform(&source_gt, row, col).into();
            dst.set_geo_transform(&tile_gt)?;
            dst.set_projection(&projection)?;
            if nodata.is_some() {
                dst.rasterband(1)?.set_no_data_value(nodata)?;
            }
            write_band(&dst, 1, &extract_tile(&band, row, col))?;
            written.push(tile_path);
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ceil_counts_partial_tiles() {
        assert_eq!(TileCountPolicy::Ceil.grid(300, 300), (2, 2));
        assert_eq!(TileCountPolicy::Ceil.grid(512, 256), (1, 2));
        assert_eq!(TileCountPolicy::Ceil.grid(100, 40), (1, 1));
        assert_eq!(TileCountPolicy::Ceil.grid(0, 0), (0, 0));
    }

    #[test]
    fn test_round_matches_legacy_counts() {
        // 300 / 256 = 1.17
        assert_eq!(TileCountPolicy::Round.grid(300, 300), (1, 1));
        // smaller than half a tile rounds to nothing
        assert_eq!(TileCountPolicy::Round.grid(100, 100), (0, 0));
        // 0.5 and 2.5 round to even, 1.5 rounds up
        assert_eq!(TileCountPolicy::Round.tiles_along(128), 0);
        assert_eq!(TileCountPolicy::Round.tiles_along(384), 2);
        assert_eq!(TileCountPolicy::Round.tiles_along(640), 2);
        assert_eq!(TileCountPolicy::Round.tiles_along(400), 2);
    }

    #[test]
    fn test_exact_multiples_agree() {
        for n in [256, 512, 1024, 2560] {
            assert_eq!(
                TileCountPolicy::Ceil.tiles_along(n),
                TileCountPolicy::Round.tiles_along(n)
            );
        }
    }

    #[test]
    fn test_tile_geotransform_offsets() {
        let source = GeoTransform::north_up(0.0, 0.0, 10.0);
        let gt = tile_geotransform(&source, 1, 1);
        assert_relative_eq!(gt.origin_x, 2560.0);
        assert_relative_eq!(gt.origin_y, -2560.0);
        assert_relative_eq!(gt.pixel_width, 10.0);
        assert_relative_eq!(gt.pixel_height, -10.0);

        let source = GeoTransform::north_up(399960.0, 5000040.0, 20.0);
        let gt = tile_geotransform(&source, 0, 3);
        assert_relative_eq!(gt.origin_x, 399960.0 + 3.0 * 256.0 * 20.0);
        assert_relative_eq!(gt.origin_y, 5000040.0);
    }

    #[test]
    fn test_chip_id_from_parent_directory() {
        assert_eq!(chip_id(Path::new("/data/chip_047/VV.tif")).unwrap(), 47);
        assert_eq!(
            chip_id(Path::new("data/src/Bolivia_103757/Bolivia_103757_S1Hand.tif")).unwrap(),
            103757
        );
        assert_eq!(chip_id(Path::new("data/12/x.tif")).unwrap(), 12);
        assert!(matches!(
            chip_id(Path::new("data/chip_abc/x.tif")),
            Err(ChipError::InvalidChipPath(_))
        ));
        assert!(chip_id(Path::new("x.tif")).is_err());
    }

    #[test]
    fn test_tile_name() {
        assert_eq!(tile_name(47, 0, 2), "047_02.tif");
        assert_eq!(tile_name(5, 1, 1), "005_11.tif");
        assert_eq!(tile_name(103757, 1, 0), "103757_10.tif");
    }

    #[test]
    fn test_tile_name_collisions_past_ten() {
        use std::collections::HashSet;

        let unique = |rows: usize, cols: usize| {
            let mut seen = HashSet::new();
            (0..rows)
                .flat_map(|r| (0..cols).map(move |c| (r, c)))
                .all(|(r, c)| seen.insert(tile_name(1, r, c)))
        };
        assert!(!tile_names_may_collide(10, 10));
        assert!(unique(10, 10));
        assert!(tile_names_may_collide(12, 12));
        assert!(!unique(12, 12));
        assert_eq!(tile_name(1, 1, 11), tile_name(1, 11, 1));
    }

    #[test]
    fn test_extract_full_tile_has_no_padding() {
        let band = Array2::from_shape_fn((512, 512), |(r, c)| (r * 512 + c) as f32 + 1.0);
        let tile = extract_tile(&band, 1, 0);
        assert_eq!(tile.dim(), (TILE_SIZE, TILE_SIZE));
        assert_eq!(tile[[0, 0]], band[[256, 0]]);
        assert_eq!(tile[[255, 255]], band[[511, 255]]);
        assert!(tile.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn test_extract_edge_tile_is_zero_padded() {
        let band = Array2::from_elem((300, 300), 7.0f32);
        let tile = extract_tile(&band, 1, 1);
        assert_eq!(tile.dim(), (TILE_SIZE, TILE_SIZE));
        // 44 x 44 pixels remain inside the source
        assert_eq!(tile[[43, 43]], 7.0);
        assert_eq!(tile[[44, 0]], 0.0);
        assert_eq!(tile[[0, 44]], 0.0);
        assert_eq!(tile.iter().filter(|v| **v == 7.0).count(), 44 * 44);
    }

    #[test]
    fn test_extract_tile_past_raster_is_all_zero() {
        let band = Array2::from_elem((100, 100), 3.0f32);
        let tile = extract_tile(&band, 2, 0);
        assert!(tile.iter().all(|v| *v == 0.0));
    }
}
