use anyhow::Result;
use scan2bim_tools::{cli, stages::Stage};

fn main() -> Result<()> {
    cli::init_logging();
    let matches = cli::app(
        "scan2bim correct",
        "Repairs systematic misclassifications of a classified point cloud with geometric rules",
        Some(Stage::Correct),
    )
    .get_matches();
    let config = cli::config_from_matches(&matches, Some(Stage::Correct))?;
    Stage::Correct.run(&config)
}
