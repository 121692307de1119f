use crate::fetcher::DEFAULT_WORKERS;
use crate::remote::{ELEVATION_BAND, NASADEM_ASSET};
use crate::tiler::TileCountPolicy;
use clap::{Args, Subcommand};
use std::{fmt, path::PathBuf};

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
pub struct ChipCliArgs {
    #[clap(subcommand)]
    pub subcmd: Subaction,
}
#[derive(Debug, Subcommand)]
pub enum Subaction {
    /// extracts the Sentinel-1 chip and water label archives and tiles them into 256 by 256
    /// tiles under the project data directory
    MakeDataset(MakeDatasetCommand),

    /// downloads the elevation tile matching each input tile from Earth Engine
    FetchDem(FetchDemCommand),
}

#[derive(Debug, Args)]
pub struct MakeDatasetCommand {
    /// the project directory location
    #[clap(long = "proj_dir", default_value = ".")]
    pub proj_dir: PathBuf,

    /// the S1 chip archive (tar.gz)
    #[clap(long)]
    pub chips: PathBuf,

    /// the S1 water label archive (tar.gz)
    #[clap(long)]
    pub labels: PathBuf,

    /// how partial tiles at the raster edges are counted
    #[clap(long = "tile_policy", value_enum, default_value_t = TileCountPolicy::Ceil)]
    pub tile_policy: TileCountPolicy,
}

#[derive(Args)]
pub struct FetchDemCommand {
    /// the cloud project id requests are billed to
    #[clap(long = "cld_projid")]
    pub cld_projid: String,

    /// the input tile directory
    #[clap(long = "in_dir")]
    pub in_dir: PathBuf,

    /// the output folder; tiles are written to its dem subfolder
    #[clap(long = "out_dir")]
    pub out_dir: PathBuf,

    /// OAuth access token for the Earth Engine API
    #[clap(long = "access_token", env = "EE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// the Earth Engine image asset
    #[clap(long, default_value = NASADEM_ASSET)]
    pub asset: String,

    /// the band of the asset to download
    #[clap(long, default_value = ELEVATION_BAND)]
    pub band: String,

    /// the number of concurrent requests
    #[clap(long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// request timeout in seconds; requests wait indefinitely when unset
    #[clap(long = "timeout_secs")]
    pub timeout_secs: Option<u64>,
}

// the token never reaches the logs
impl fmt::Debug for FetchDemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDemCommand")
            .field("cld_projid", &self.cld_projid)
            .field("in_dir", &self.in_dir)
            .field("out_dir", &self.out_dir)
            .field("access_token", &"<redacted>")
            .field("asset", &self.asset)
            .field("band", &self.band)
            .field("workers", &self.workers)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
