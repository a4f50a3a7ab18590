use clap::{error::ErrorKind, Parser};
use std::path::PathBuf;

/// Command line arguments for the synthetic-data demo.
/// An optional configuration must point to an existing JSON file.
#[derive(Parser, Debug)]
#[command(about = "Train ShallowFBCSPNet on synthetic band-power trials")]
struct Args {
    /// Number of generated trials
    #[arg(long, default_value_t = 96)]
    trials: usize,

    /// Number of EEG channels per trial
    #[arg(long, default_value_t = 4)]
    channels: usize,

    /// Number of time samples per trial
    #[arg(long, default_value_t = 200)]
    samples: usize,

    /// Number of classes
    #[arg(long, default_value_t = 2)]
    classes: usize,

    /// Overrides the number of training epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Seed for data generation and training
    #[arg(long, default_value_t = 20)]
    seed: u64,

    /// Number of cross-validation folds, 0 skips cross-validation
    #[arg(long, default_value_t = 0)]
    folds: usize,

    /// Path to a JSON model configuration
    #[arg(long, value_parser = validate_file)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoOptions {
    pub n_trials: usize,
    pub n_chans: usize,
    pub n_times: usize,
    pub n_classes: usize,
    pub n_epochs: Option<usize>,
    pub seed: u64,
    pub folds: usize,
    pub config_path: Option<PathBuf>,
}

/// Validates that a path points to an existing JSON file
fn validate_file(path: &str) -> Result<PathBuf, clap::Error> {
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("File not found: {}", path.display()),
        ));
    }
    if !path.is_file() {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("Not a file: {}", path.display()),
        ));
    }
    if path.extension().and_then(|s| s.to_str()) != Some("json") {
        return Err(clap::Error::raw(
            ErrorKind::InvalidValue,
            format!("File must be JSON: {}", path.display()),
        ));
    }
    Ok(path)
}

impl From<Args> for DemoOptions {
    fn from(args: Args) -> Self {
        DemoOptions {
            n_trials: args.trials,
            n_chans: args.channels,
            n_times: args.samples,
            n_classes: args.classes,
            n_epochs: args.epochs,
            seed: args.seed,
            folds: args.folds,
            config_path: args.config,
        }
    }
}

/// Parses and validates command line arguments
pub fn parse_arguments() -> Result<DemoOptions, clap::Error> {
    let args = Args::try_parse()?;
    Ok(args.into())
}

/// Parses arguments from an explicit iterator, with the program name first
pub fn parse_arguments_from<I, T>(args: I) -> Result<DemoOptions, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let args = Args::try_parse_from(args)?;
    Ok(args.into())
}
