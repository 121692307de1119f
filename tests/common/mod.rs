#![allow(dead_code)]

use floodchips::{raster::write_band, GeoTransform};
use gdal::{raster::GdalType, spatial_ref::SpatialRef, DriverManager};
use ndarray::Array2;
use std::path::Path;

pub const EPSG: u32 = 32633;

/// writes a single band Float32 GeoTIFF in UTM 33N
pub fn write_raster(path: &Path, data: &Array2<f32>, gt: GeoTransform, nodata: Option<f64>) {
    write_stack(path, std::slice::from_ref(data), gt, nodata);
}

/// writes one band per array, typed after `T`, with the same nodata on every band
pub fn write_stack<T: GdalType + Copy>(
    path: &Path,
    bands: &[Array2<T>],
    gt: GeoTransform,
    nodata: Option<f64>,
) {
    let (rows, cols) = bands[0].dim();
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut ds = driver
        .create_with_band_type::<T, _>(path, cols as isize, rows as isize, bands.len() as isize)
        .unwrap();
    let raw: [f64; 6] = gt.into();
    ds.set_geo_transform(&raw).unwrap();
    ds.set_projection(&SpatialRef::from_epsg(EPSG).unwrap().to_wkt().unwrap())
        .unwrap();
    for (i, data) in bands.iter().enumerate() {
        let index = i as isize + 1;
        if nodata.is_some() {
            ds.rasterband(index).unwrap().set_no_data_value(nodata).unwrap();
        }
        write_band(&ds, index, data).unwrap();
    }
}
