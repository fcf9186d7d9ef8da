use anyhow::Result;
use scan2bim_tools::{cli, stages::Stage};

fn main() -> Result<()> {
    cli::init_logging();
    let matches = cli::app(
        "scan2bim train",
        "Trains and cross-validates the random forest classifier on a training feature table",
        Some(Stage::Train),
    )
    .get_matches();
    let config = cli::config_from_matches(&matches, Some(Stage::Train))?;
    Stage::Train.run(&config)
}
