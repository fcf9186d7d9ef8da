use std::{fs, time::Instant};

use anyhow::{Context, Result};
use log::{error, info};
use scan2bim_tools::{cli, stages::Stage};

fn main() -> Result<()> {
    cli::init_logging();

    let matches = cli::app(
        "scan2bim pipeline",
        "Runs feature extraction, training, prediction and correction in sequence",
        None,
    )
    .get_matches();
    let config = cli::config_from_matches(&matches, None)?;

    for directory in config.paths.directories() {
        fs::create_dir_all(&directory)
            .with_context(|| format!("Could not create directory {}", directory.display()))?;
    }

    let t_start = Instant::now();
    let mut timings = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL.iter() {
        info!("Running {}", stage);
        let t_stage = Instant::now();
        if let Err(why) = stage.run(&config) {
            error!("{} failed after {:.2?}, skipping the remaining stages", stage, t_stage.elapsed());
            return Err(why.context(format!("Stage '{}' failed", stage)));
        }
        let elapsed = t_stage.elapsed();
        info!("Finished {} in {:.2?}", stage, elapsed);
        timings.push((*stage, elapsed));
    }

    let total = t_start.elapsed().as_secs_f64();
    println!("Ran {} stages", timings.len());
    for (stage, elapsed) in timings {
        println!("\t{:<20} {:>10.2}s", stage.name(), elapsed.as_secs_f64());
    }
    println!(
        "Total machine time: {:.2}s ({:.2} min)",
        total,
        total / 60.0
    );
    Ok(())
}
