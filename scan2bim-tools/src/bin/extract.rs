use anyhow::Result;
use scan2bim_tools::{cli, stages::Stage};

fn main() -> Result<()> {
    cli::init_logging();
    let matches = cli::app(
        "scan2bim extract",
        "Computes the feature table of a labeled training point cloud",
        Some(Stage::Extract),
    )
    .get_matches();
    let config = cli::config_from_matches(&matches, Some(Stage::Extract))?;
    Stage::Extract.run(&config)
}
