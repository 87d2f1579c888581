mod problem;

use log::*;
use problem::{Problem, ProblemError, Solution};
use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::PathBuf,
};
use structopt::StructOpt;
use thiserror::Error;
use translation_averaging::{
    AveragingError, AveragingSettings, ProjectionSamplingMethod, TranslationAveraging1dSfm,
};

#[derive(StructOpt, Clone)]
#[structopt(
    name = "averaging-sandbox",
    about = "A tool for testing translation averaging on stored problems"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `translation_averaging::AveragingSettings`. Defaults are used when it is
    /// not given or does not exist. A settings file that cannot be read or parsed is an error.
    #[structopt(short, long)]
    settings: Option<PathBuf>,
    /// Overrides the projection sampling method of the settings.
    #[structopt(long)]
    sampling_method: Option<ProjectionSamplingMethod>,
    /// Overrides the seed of the settings.
    #[structopt(long)]
    seed: Option<u64>,
    /// The file to write the solution to. Printed to stdout when absent.
    #[structopt(short, long)]
    output: Option<PathBuf>,
    /// The problem file.
    #[structopt(parse(from_os_str))]
    problem: PathBuf,
}

#[derive(Debug, Error)]
enum SandboxError {
    #[error("unable to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse settings {path:?}: {source}")]
    Settings {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unable to parse the problem: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid problem: {0}")]
    Problem(#[from] ProblemError),
    #[error("averaging failed: {0}")]
    Averaging(#[from] AveragingError),
}

fn load_settings(opt: &Opt) -> Result<AveragingSettings, SandboxError> {
    let mut settings = match &opt.settings {
        Some(path) => match File::open(path) {
            Ok(file) => {
                let settings = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                    SandboxError::Settings {
                        path: path.clone(),
                        source,
                    }
                })?;
                info!("loaded existing settings");
                settings
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("settings file {:?} not found, used default settings", path);
                AveragingSettings::default()
            }
            Err(source) => {
                return Err(SandboxError::Io {
                    path: path.clone(),
                    source,
                })
            }
        },
        None => {
            info!("used default settings");
            AveragingSettings::default()
        }
    };
    if let Some(method) = opt.sampling_method {
        settings = settings.projection_sampling_method(method);
    }
    if let Some(seed) = opt.seed {
        settings = settings.seed(seed);
    }
    Ok(settings)
}

fn run(opt: &Opt) -> Result<(), SandboxError> {
    let settings = load_settings(opt)?;

    info!("loading the problem from {:?}", opt.problem);
    let file = File::open(&opt.problem).map_err(|source| SandboxError::Io {
        path: opt.problem.clone(),
        source,
    })?;
    let problem: Problem = serde_json::from_reader(BufReader::new(file))?;
    let input = problem.into_input()?;

    let result = TranslationAveraging1dSfm::new(settings).run(&input)?;
    if let Some(metrics) = &result.metrics {
        info!(
            "precision {:?}, recall {:?}, mean translation error {:?}",
            metrics.precision, metrics.recall, metrics.translation_distance_errors.mean
        );
    }

    let solution = Solution::from(result);
    match &opt.output {
        Some(path) => {
            info!("writing the solution to {:?}", path);
            let file = File::create(path).map_err(|source| SandboxError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::to_writer_pretty(file, &solution)?;
        }
        None => println!("{}", serde_json::to_string_pretty(&solution)?),
    }
    Ok(())
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();
    if let Err(e) = run(&opt) {
        error!("{}", e);
        std::process::exit(1);
    }
}
