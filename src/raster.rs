//! Raster primitives shared by the tiler and the remote patch fetcher: the
//! affine geotransform, bounding boxes, validity masks and band I/O through GDAL.

use crate::error::ChipResult;
use gdal::{
    raster::{Buffer, GdalType},
    spatial_ref::SpatialRef,
    Dataset,
};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Affine mapping between pixel and map coordinates, in GDAL term order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub origin_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl From<[f64; 6]> for GeoTransform {
    fn from(gt: [f64; 6]) -> Self {
        GeoTransform {
            origin_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            origin_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(gt: GeoTransform) -> Self {
        [
            gt.origin_x,
            gt.pixel_width,
            gt.rotation_x,
            gt.origin_y,
            gt.rotation_y,
            gt.pixel_height,
        ]
    }
}

impl GeoTransform {
    /// north-up transform with square pixels of size `res`
    pub fn north_up(origin_x: f64, origin_y: f64, res: f64) -> Self {
        GeoTransform {
            origin_x,
            pixel_width: res,
            rotation_x: 0.0,
            origin_y,
            rotation_y: 0.0,
            pixel_height: -res,
        }
    }

    /// transform that stretches a `width` x `height` grid over `bounds`
    pub fn from_bounds(bounds: &Bounds, width: usize, height: usize) -> Self {
        GeoTransform {
            origin_x: bounds.left,
            pixel_width: (bounds.right - bounds.left) / width as f64,
            rotation_x: 0.0,
            origin_y: bounds.top,
            rotation_y: 0.0,
            pixel_height: -(bounds.top - bounds.bottom) / height as f64,
        }
    }

    /// map coordinates of the pixel corner at (col, row)
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.rotation_x,
            self.origin_y + col * self.rotation_y + row * self.pixel_height,
        )
    }

    /// fractional (col, row) of a map coordinate; assumes no rotation
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }

    /// extent covered by a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> Bounds {
        let (x0, y0) = self.apply(0.0, 0.0);
        let (x1, y1) = self.apply(width as f64, height as f64);
        Bounds {
            left: x0.min(x1),
            bottom: y0.min(y1),
            right: x0.max(x1),
            top: y0.max(y1),
        }
    }
}

/// Axis-aligned extent in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

/// 1 where a sample is real data, 0 where it equals the nodata value.
/// Without a nodata value every sample is valid. Samples are compared in f64 so
/// nodata values with no exact f32 form still match.
pub fn validity_mask(values: &Array2<f64>, nodata: Option<f64>) -> Array2<i32> {
    match nodata {
        None => Array2::ones(values.dim()),
        Some(nd) if nd.is_nan() => values.mapv(|v| i32::from(!v.is_nan())),
        Some(nd) => values.mapv(|v| i32::from(v != nd)),
    }
}

/// CRS identifier for a dataset projection: `AUTH:CODE` when the WKT carries an
/// authority, otherwise the WKT itself.
pub fn crs_string(projection: &str) -> String {
    let code = SpatialRef::from_wkt(projection)
        .and_then(|srs| Ok(format!("{}:{}", srs.auth_name()?, srs.auth_code()?)));
    match code {
        Ok(code) => code,
        Err(e) => {
            log::debug!("no authority code for projection ({}), using WKT", e);
            projection.to_string()
        }
    }
}

/// reads a whole band into a (rows, cols) array
pub fn read_band<T: GdalType + Copy>(dataset: &Dataset, index: isize) -> ChipResult<Array2<T>> {
    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(index)?;
    let buffer = band.read_as::<T>((0, 0), (width, height), (width, height), None)?;
    Ok(Array2::from_shape_vec((height, width), buffer.data)?)
}

/// writes a (rows, cols) array over the whole of band `index`
pub fn write_band<T: GdalType + Copy>(
    dataset: &Dataset,
    index: isize,
    data: &Array2<T>,
) -> ChipResult<()> {
    let (rows, cols) = data.dim();
    let buffer = Buffer::new((cols, rows), data.iter().copied().collect());
    let mut band = dataset.rasterband(index)?;
    band.write((0, 0), (cols, rows), &buffer)?;
    Ok(())
}

/// sorted paths matching a glob pattern such as `dir/*/*VV.tif`
pub fn glob_sorted(pattern: &Path) -> ChipResult<Vec<PathBuf>> {
    let mut paths = glob::glob(&pattern.to_string_lossy())?
        .map(|entry| entry.map_err(glob::GlobError::into_error))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_geotransform_array_round_trip() {
        let raw = [500000.0, 10.0, 0.0, 4600000.0, 0.0, -10.0];
        let gt = GeoTransform::from(raw);
        assert_eq!(gt, GeoTransform::north_up(500000.0, 4600000.0, 10.0));
        assert_eq!(<[f64; 6]>::from(gt), raw);
    }

    #[test]
    fn test_bounds_of_north_up_grid() {
        let gt = GeoTransform::north_up(100.0, 200.0, 10.0);
        let b = gt.bounds(256, 128);
        assert_relative_eq!(b.left, 100.0);
        assert_relative_eq!(b.right, 2660.0);
        assert_relative_eq!(b.top, 200.0);
        assert_relative_eq!(b.bottom, -1080.0);
    }

    #[test]
    fn test_from_bounds_recovers_transform() {
        let gt = GeoTransform::north_up(0.0, 0.0, 30.0);
        let b = gt.bounds(256, 256);
        let back = GeoTransform::from_bounds(&b, 256, 256);
        assert_relative_eq!(back.pixel_width, 30.0);
        assert_relative_eq!(back.pixel_height, -30.0);
        assert_relative_eq!(back.origin_x, 0.0);
        assert_relative_eq!(back.origin_y, 0.0);
    }

    #[test]
    fn test_invert_pixel_centre() {
        let gt = GeoTransform::north_up(0.0, 0.0, 10.0);
        let (x, y) = gt.apply(3.5, 7.5);
        let (col, row) = gt.invert(x, y);
        assert_relative_eq!(col, 3.5);
        assert_relative_eq!(row, 7.5);
    }

    #[test]
    fn test_validity_mask() {
        let values = array![[1.0, -9999.0], [0.0, 5.0]];
        assert_eq!(validity_mask(&values, Some(-9999.0)), array![[1, 0], [1, 1]]);
        assert_eq!(validity_mask(&values, None), Array2::<i32>::ones((2, 2)));

        let with_nan = array![[f64::NAN, 2.0]];
        assert_eq!(validity_mask(&with_nan, Some(f64::NAN)), array![[0, 1]]);
    }

    #[test]
    fn test_validity_mask_nodata_without_f32_form() {
        let values = array![[-9999.9, 1.0], [16777217.0, 16777216.0]];
        assert_eq!(validity_mask(&values, Some(-9999.9)), array![[0, 1], [1, 1]]);
        assert_eq!(validity_mask(&values, Some(16777217.0)), array![[1, 1], [0, 1]]);
    }
}
