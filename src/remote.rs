//! Earth Engine REST access: query domains, the authenticated session and the
//! pixel source used by the patch fetcher.

use crate::error::{ChipError, ChipResult};
use crate::raster::{read_band, Bounds, GeoTransform};
use gdal::Dataset;
use ndarray::Array2;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://earthengine.googleapis.com";

/// NASADEM 1 arc-second elevation
pub const NASADEM_ASSET: &str = "NASA/NASADEM_HGT/001";
pub const ELEVATION_BAND: &str = "elevation";

/// Geographic query region: bounding box, pixel size and CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub bounds: Bounds,
    pub resolution: f64,
    pub crs: String,
}

impl Domain {
    pub fn new(bounds: Bounds, resolution: f64, crs: impl Into<String>) -> Self {
        Domain {
            bounds,
            resolution,
            crs: crs.into(),
        }
    }

    /// (rows, cols) of the pixel grid covering the bounds
    pub fn shape(&self) -> (usize, usize) {
        let rows = ((self.bounds.top - self.bounds.bottom) / self.resolution).round();
        let cols = ((self.bounds.right - self.bounds.left) / self.resolution).round();
        (rows.max(1.0) as usize, cols.max(1.0) as usize)
    }

    pub fn transform(&self) -> GeoTransform {
        GeoTransform::north_up(self.bounds.left, self.bounds.top, self.resolution)
    }
}

/// Anything that can answer a (domain, band) query with integer pixels.
pub trait PixelSource: Sync {
    fn pixels(&self, domain: &Domain, band: &str) -> ChipResult<Array2<i32>>;
}

/// Authenticated Earth Engine session. Holds the cloud project that requests are
/// billed to and a bearer token from ambient credentials; shared read-only.
pub struct EeSession {
    project: String,
    token: String,
    base_url: String,
    client: Client,
}

impl EeSession {
    /// `timeout` of `None` lets a request block indefinitely
    pub fn new(
        project: impl Into<String>,
        token: impl Into<String>,
        timeout: Option<Duration>,
    ) -> ChipResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("floodchips/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(EeSession {
            project: project.into(),
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn pixels_url(&self, image: &EeImage) -> String {
        format!("{}/v1/{}:getPixels", self.base_url, image.resource_name())
    }
}

/// A remote image asset, e.g. `NASA/NASADEM_HGT/001`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EeImage {
    pub asset_id: String,
}

impl EeImage {
    pub fn new(asset_id: impl Into<String>) -> Self {
        EeImage {
            asset_id: asset_id.into(),
        }
    }

    /// full resource name; bare ids live in the public catalog project
    pub fn resource_name(&self) -> String {
        if self.asset_id.starts_with("projects/") {
            self.asset_id.clone()
        } else {
            format!("projects/earthengine-public/assets/{}", self.asset_id)
        }
    }
}

/// An image queried through a session.
pub struct ImageSource<'a> {
    pub session: &'a EeSession,
    pub image: &'a EeImage,
}

impl<'a> ImageSource<'a> {
    pub fn new(session: &'a EeSession, image: &'a EeImage) -> Self {
        ImageSource { session, image }
    }
}

impl PixelSource for ImageSource<'_> {
    fn pixels(&self, domain: &Domain, band: &str) -> ChipResult<Array2<i32>> {
        let url = self.session.pixels_url(self.image);
        log::debug!("requesting {} {:?} from {}", band, domain.shape(), url);

        let response = self
            .session
            .client
            .post(&url)
            .bearer_auth(&self.session.token)
            .header("x-goog-user-project", &self.session.project)
            .json(&PixelsRequest::new(domain, band))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChipError::Remote {
                status: status.as_u16(),
                body: remote_error_message(&body),
            });
        }

        decode_geotiff(response.bytes()?.to_vec())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PixelsRequest<'a> {
    file_format: &'static str,
    band_ids: [&'a str; 1],
    grid: PixelGrid<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PixelGrid<'a> {
    dimensions: Dimensions,
    affine_transform: AffineTransform,
    #[serde(skip_serializing_if = "Option::is_none")]
    crs_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crs_wkt: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Dimensions {
    width: usize,
    height: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AffineTransform {
    scale_x: f64,
    shear_x: f64,
    translate_x: f64,
    shear_y: f64,
    scale_y: f64,
    translate_y: f64,
}

impl<'a> PixelsRequest<'a> {
    fn new(domain: &'a Domain, band: &'a str) -> Self {
        let (height, width) = domain.shape();
        let gt = domain.transform();
        let is_code = !domain.crs.contains('[') && domain.crs.contains(':');

        PixelsRequest {
            file_format: "GEO_TIFF",
            band_ids: [band],
            grid: PixelGrid {
                dimensions: Dimensions { width, height },
                affine_transform: AffineTransform {
                    scale_x: gt.pixel_width,
                    shear_x: gt.rotation_x,
                    translate_x: gt.origin_x,
                    shear_y: gt.rotation_y,
                    scale_y: gt.pixel_height,
                    translate_y: gt.origin_y,
                },
                crs_code: is_code.then_some(domain.crs.as_str()),
                crs_wkt: (!is_code).then_some(domain.crs.as_str()),
            },
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// the `error.message` of a Google API error response, or the raw body
fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

static MEM_FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// reads band 1 of an in-memory GeoTIFF as i32
fn decode_geotiff(bytes: Vec<u8>) -> ChipResult<Array2<i32>> {
    let n = MEM_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = format!("/vsimem/floodchips_patch_{}.tif", n);
    gdal::vsi::create_mem_file(&path, bytes)?;

    let pixels = Dataset::open(&path)
        .map_err(ChipError::from)
        .and_then(|ds| read_band::<i32>(&ds, 1));
    gdal::vsi::unlink_mem_file(&path)?;
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_domain(crs: &str) -> Domain {
        let bounds = GeoTransform::north_up(600000.0, 4500000.0, 10.0).bounds(256, 256);
        Domain::new(bounds, 10.0, crs)
    }

    #[test]
    fn test_domain_shape_matches_tile() {
        assert_eq!(tile_domain("EPSG:32633").shape(), (256, 256));

        let bounds = Bounds {
            left: 0.0,
            bottom: 0.0,
            right: 300.0,
            top: 150.0,
        };
        assert_eq!(Domain::new(bounds, 30.0, "EPSG:4326").shape(), (5, 10));
    }

    #[test]
    fn test_domain_transform_is_north_up() {
        let gt = tile_domain("EPSG:32633").transform();
        assert_eq!(gt, GeoTransform::north_up(600000.0, 4500000.0, 10.0));
    }

    #[test]
    fn test_request_body_with_crs_code() {
        let domain = tile_domain("EPSG:32633");
        let body = serde_json::to_value(PixelsRequest::new(&domain, "elevation")).unwrap();

        assert_eq!(body["fileFormat"], "GEO_TIFF");
        assert_eq!(body["bandIds"], serde_json::json!(["elevation"]));
        assert_eq!(body["grid"]["dimensions"]["width"], 256);
        assert_eq!(body["grid"]["dimensions"]["height"], 256);
        assert_eq!(body["grid"]["affineTransform"]["scaleX"], 10.0);
        assert_eq!(body["grid"]["affineTransform"]["scaleY"], -10.0);
        assert_eq!(body["grid"]["affineTransform"]["translateX"], 600000.0);
        assert_eq!(body["grid"]["affineTransform"]["translateY"], 4500000.0);
        assert_eq!(body["grid"]["crsCode"], "EPSG:32633");
        assert!(body["grid"].get("crsWkt").is_none());
    }

    #[test]
    fn test_request_body_falls_back_to_wkt() {
        let wkt = r#"LOCAL_CS["arbitrary",UNIT["metre",1]]"#;
        let domain = tile_domain(wkt);
        let body = serde_json::to_value(PixelsRequest::new(&domain, "elevation")).unwrap();
        assert_eq!(body["grid"]["crsWkt"], wkt);
        assert!(body["grid"].get("crsCode").is_none());
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(
            EeImage::new(NASADEM_ASSET).resource_name(),
            "projects/earthengine-public/assets/NASA/NASADEM_HGT/001"
        );
        assert_eq!(
            EeImage::new("projects/my-proj/assets/dem").resource_name(),
            "projects/my-proj/assets/dem"
        );
    }

    #[test]
    fn test_pixels_url() {
        let session = EeSession::new("my-proj", "token", None)
            .unwrap()
            .with_base_url("http://localhost:8080/");
        assert_eq!(session.project(), "my-proj");
        assert_eq!(
            session.pixels_url(&EeImage::new(NASADEM_ASSET)),
            "http://localhost:8080/v1/projects/earthengine-public/assets/NASA/NASADEM_HGT/001:getPixels"
        );
    }

    #[test]
    fn test_remote_error_message() {
        let body = r#"{"error":{"code":403,"message":"Permission denied.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(remote_error_message(body), "Permission denied.");
        assert_eq!(remote_error_message("Bad Gateway"), "Bad Gateway");
    }
}
