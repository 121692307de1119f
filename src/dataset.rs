//! Builds the training dataset layout from the Sentinel-1 chip and water label
//! archives: extract, tile into `data/chips/{VV,VH}` and `data/labels`, clean up.

use crate::error::ChipResult;
use crate::progress::{stage_bar, stage_spinner};
use crate::raster::glob_sorted;
use crate::tiler::{tile256, TileCountPolicy};
use flate2::read::GzDecoder;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

/// top-level directory of the extracted Sentinel-1 source chips
pub const SOURCE_CHIPS_DIR: &str = "c2smsfloods_v1_source_s1";
/// top-level directory of the extracted water labels
pub const WATER_LABELS_DIR: &str = "c2smsfloods_v1_labels_s1_water";

/// Directory layout under a project root.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectLayout { root: root.into() }
    }

    pub fn data(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn models(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn vv_tiles(&self) -> PathBuf {
        self.data().join("chips").join("VV")
    }

    pub fn vh_tiles(&self) -> PathBuf {
        self.data().join("chips").join("VH")
    }

    pub fn label_tiles(&self) -> PathBuf {
        self.data().join("labels")
    }
}

/// Number of tiles written per category.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSummary {
    pub vv: usize,
    pub vh: usize,
    pub labels: usize,
}

fn is_gzip(head: &[u8]) -> bool {
    head.len() >= 2 && head[0] == 0x1F && head[1] == 0x8B
}

/// extracts the `.tif` members of a tar (optionally gzipped) archive into `dest`,
/// skipping everything else and any member whose path escapes `dest`. Returns the
/// number of extracted members.
pub fn extract_tifs(archive: &Path, dest: &Path, desc: &str) -> ChipResult<usize> {
    fs::create_dir_all(dest)?;
    let mut reader = BufReader::new(File::open(archive)?);
    let reader: Box<dyn Read> = if is_gzip(reader.fill_buf()?) {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };

    let mut tar = tar::Archive::new(reader);
    let pb = stage_spinner(desc);
    let mut extracted = 0;
    for entry in tar.entries()? {
        let mut entry = entry?;
        pb.inc(1);
        let is_tif = entry.path()?.to_string_lossy().ends_with(".tif");
        if is_tif && entry.unpack_in(dest)? {
            extracted += 1;
        }
    }
    pb.finish();
    Ok(extracted)
}

fn tile_all(
    chips: &[PathBuf],
    output_dir: &Path,
    policy: TileCountPolicy,
    desc: &str,
) -> ChipResult<usize> {
    let pb = stage_bar(chips.len(), desc);
    let mut tiles = 0;
    for chip in chips {
        tiles += tile256(chip, output_dir, policy)?.len();
        pb.inc(1);
    }
    pb.finish();
    Ok(tiles)
}

/// builds the project layout from the chip and label archives.
/// proj_dir: project root; `data` and `models` are created beneath it
/// chips: tar archive of Sentinel-1 VV/VH chips
/// labels: tar archive of water label chips
/// policy: tile count policy for partial edge tiles
pub fn make_dataset(
    proj_dir: &Path,
    chips: &Path,
    labels: &Path,
    policy: TileCountPolicy,
) -> ChipResult<DatasetSummary> {
    let layout = ProjectLayout::new(proj_dir);
    fs::create_dir_all(layout.data())?;
    fs::create_dir_all(layout.models())?;

    for (archive, desc) in [
        (chips, "S1 chips extraction"),
        (labels, "S1 water labels extraction"),
    ] {
        log::info!("Reading file {}", archive.display());
        let n = extract_tifs(archive, &layout.data(), desc)?;
        log::info!("extracted {} rasters from {}", n, archive.display());
    }

    let sources = layout.data().join(SOURCE_CHIPS_DIR).join("*");
    let vv = glob_sorted(&sources.join("*VV.tif"))?;
    let vh = glob_sorted(&sources.join("*VH.tif"))?;
    let water = glob_sorted(&layout.data().join(WATER_LABELS_DIR).join("*").join("*.tif"))?;

    let summary = DatasetSummary {
        vv: tile_all(&vv, &layout.vv_tiles(), policy, "Tiling VV chips")?,
        vh: tile_all(&vh, &layout.vh_tiles(), policy, "Tiling VH chips")?,
        labels: tile_all(&water, &layout.label_tiles(), policy, "Tiling water labels")?,
    };

    log::info!("Removing original c2smsfloods data");
    for path in glob_sorted(&layout.data().join("c2s*"))? {
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }

    log::info!(
        "Process completed: {} VV, {} VH, {} label tiles",
        summary.vv,
        summary.vh,
        summary.labels
    );
    Ok(summary)
}
