use indicatif::{ProgressBar, ProgressStyle};

/// bar with elapsed time, position and a stage description
pub fn stage_bar(len: usize, desc: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");
    pb.set_style(style);
    pb.set_message(desc.to_string());
    pb
}

/// spinner for stages whose length is not known up front
pub fn stage_spinner(desc: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} entries")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(desc.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
