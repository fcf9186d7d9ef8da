use anyhow::Result;
use scan2bim_tools::{cli, stages::Stage};

fn main() -> Result<()> {
    cli::init_logging();
    let matches = cli::app(
        "scan2bim predict",
        "Classifies every point of a point cloud with a trained model",
        Some(Stage::Predict),
    )
    .get_matches();
    let config = cli::config_from_matches(&matches, Some(Stage::Predict))?;
    Stage::Predict.run(&config)
}
