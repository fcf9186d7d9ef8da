use anyhow::Result;
use clap::{value_t, App, Arg, ArgMatches};

use crate::{config::PipelineConfig, stages::Stage};

/// Initialises logging with level `info`, unless `RUST_LOG` says otherwise
pub fn init_logging() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
}

/// Command line arguments shared by all binaries. `stage` decides which configured paths `--input` and `--output`
/// override; the pipeline binary passes `None` and only supports the global overrides
pub fn app<'a, 'b>(name: &str, about: &'b str, stage: Option<Stage>) -> App<'a, 'b> {
    let mut app = App::new(name)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .arg(
            Arg::with_name("CONFIG")
                .short("c")
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .help("JSON configuration file. Values that are not given use their defaults"),
        )
        .arg(
            Arg::with_name("RADIUS")
                .short("r")
                .long("radius")
                .takes_value(true)
                .value_name("RADIUS")
                .help("Neighbourhood search radius for feature extraction. Must match between training and prediction"),
        )
        .arg(
            Arg::with_name("VOXEL_SIZE")
                .long("voxel-size")
                .takes_value(true)
                .value_name("SIZE")
                .help("Voxel edge length used for downsampling before prediction"),
        )
        .arg(
            Arg::with_name("TREES")
                .long("trees")
                .takes_value(true)
                .value_name("N")
                .help("Number of trees in the random forest"),
        )
        .arg(
            Arg::with_name("FOLDS")
                .long("folds")
                .takes_value(true)
                .value_name("K")
                .help("Number of cross-validation folds"),
        )
        .arg(
            Arg::with_name("SEED")
                .long("seed")
                .takes_value(true)
                .value_name("SEED")
                .help("Seed for fold assignment and forest construction"),
        )
        .arg(
            Arg::with_name("SCHEMA_POLICY")
                .long("schema-policy")
                .takes_value(true)
                .possible_values(&["lenient", "strict"])
                .help("How to handle model features that are missing from the feature table"),
        );
    if stage.is_some() {
        app = app
            .arg(
                Arg::with_name("INPUT")
                    .short("i")
                    .long("input")
                    .takes_value(true)
                    .value_name("INPUT")
                    .help("Input file of this stage"),
            )
            .arg(
                Arg::with_name("OUTPUT")
                    .short("o")
                    .long("output")
                    .takes_value(true)
                    .value_name("OUTPUT")
                    .help("Output file of this stage"),
            );
    }
    if stage == Some(Stage::Predict) {
        app = app.arg(
            Arg::with_name("MODEL")
                .short("m")
                .long("model")
                .takes_value(true)
                .value_name("MODEL")
                .help("Model file"),
        );
    }
    app
}

/// Loads the configuration named by `--config` (or the defaults), applies all command line overrides and validates the
/// result
pub fn config_from_matches(matches: &ArgMatches, stage: Option<Stage>) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load_or_default(matches.value_of("CONFIG"))?;

    if matches.is_present("RADIUS") {
        config.features.search_radius = value_t!(matches, "RADIUS", f64)?;
    }
    if matches.is_present("VOXEL_SIZE") {
        config.prediction.voxel_size = value_t!(matches, "VOXEL_SIZE", f64)?;
    }
    if matches.is_present("TREES") {
        config.training.forest.num_trees = value_t!(matches, "TREES", usize)?;
    }
    if matches.is_present("FOLDS") {
        config.training.num_folds = value_t!(matches, "FOLDS", usize)?;
    }
    if matches.is_present("SEED") {
        config.training.seed = value_t!(matches, "SEED", u64)?;
    }
    if let Some(policy) = matches.value_of("SCHEMA_POLICY") {
        config.prediction.schema_policy = policy.parse()?;
    }

    if let Some(stage) = stage {
        let paths = &mut config.paths;
        let (input_slot, output_slot) = match stage {
            Stage::Extract => (&mut paths.training_cloud, &mut paths.training_features),
            Stage::Train => (&mut paths.training_features, &mut paths.model),
            Stage::Predict => (&mut paths.input_cloud, &mut paths.classified_cloud),
            Stage::Correct => (&mut paths.classified_cloud, &mut paths.corrected_cloud),
        };
        if let Some(input) = matches.value_of("INPUT") {
            *input_slot = input.into();
        }
        if let Some(output) = matches.value_of("OUTPUT") {
            *output_slot = output.into();
        }
        if let Some(model) = matches.value_of("MODEL") {
            paths.model = model.into();
        }
    }

    config.validate()?;
    Ok(config)
}
