use clap::Parser;
use floodchips::args::{ChipCliArgs, FetchDemCommand, MakeDatasetCommand, Subaction};
use floodchips::{fetch_dem, make_dataset, EeImage, EeSession, ImageSource};
use std::{error::Error, process::ExitCode, time::Duration};

fn run_make_dataset(cmd: &MakeDatasetCommand) -> Result<ExitCode, Box<dyn Error>> {
    make_dataset(&cmd.proj_dir, &cmd.chips, &cmd.labels, cmd.tile_policy)?;
    Ok(ExitCode::SUCCESS)
}

fn run_fetch_dem(cmd: &FetchDemCommand) -> Result<ExitCode, Box<dyn Error>> {
    let session = EeSession::new(
        cmd.cld_projid.as_str(),
        cmd.access_token.as_str(),
        cmd.timeout_secs.map(Duration::from_secs),
    )?;
    let image = EeImage::new(cmd.asset.as_str());
    let source = ImageSource::new(&session, &image);

    let report = fetch_dem(&cmd.in_dir, &cmd.out_dir, &source, &cmd.band, cmd.workers)?;
    log::info!("{} tiles written", report.written.len());
    if report.is_complete() {
        return Ok(ExitCode::SUCCESS);
    }

    for (tile, e) in &report.failures {
        log::error!("failed {}: {}", tile.display(), e);
    }
    log::error!(
        "{} of {} tiles failed",
        report.failures.len(),
        report.failures.len() + report.written.len()
    );
    Ok(ExitCode::FAILURE)
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let args = ChipCliArgs::parse();
    log::debug!("{:?}", args.subcmd);

    match &args.subcmd {
        Subaction::MakeDataset(cmd) => run_make_dataset(cmd),
        Subaction::FetchDem(cmd) => run_fetch_dem(cmd),
    }
}
