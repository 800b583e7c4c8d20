use std::path::PathBuf;

use anyhow::{
    Context,
    Result,
    bail
};
use clap::{
    Parser,
    Subcommand,
    ValueEnum
};
use tracing::info;

use gaussgittins::configuration::BuildConfig;
use gaussgittins::induction::gittins::run_chain;
use gaussgittins::induction::inductionerror::InductionError;
use gaussgittins::induction::tablebuilder::{
    build_bayes_table,
    build_gittins_table
};
use gaussgittins::math::curve::nonparametriccurve::nonparametriccurve::NonparametricCurve;
use gaussgittins::table::bayestable::{
    BayesKey,
    BayesTable
};
use gaussgittins::table::gittinstable::{
    GittinsTable,
    TableFormat
};

#[derive(Parser)]
#[command(name = "gaussgittins", about = "Gittins index tables for Gaussian bandits")]
struct Cli {
    /// JSON build configuration; command-line values override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the single-arm index table and write it to FILENAME
    Build {
        filename: PathBuf,
        #[arg(value_parser = parse_positive)]
        horizon: usize,
        #[arg(value_parser = parse_tolerance)]
        tolerance: f64,
        #[arg(value_parser = parse_positive)]
        max_threads: usize,
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Print the index for (n, T) from a table file
    Lookup {
        filename: PathBuf,
        #[arg(value_parser = parse_positive)]
        n: usize,
        #[arg(value_parser = parse_positive)]
        t: usize,
    },
    /// Run one chain in-process and print its terminal index
    Compute {
        #[arg(value_parser = parse_positive)]
        m: usize,
        #[arg(value_parser = parse_positive)]
        t: usize,
        #[arg(value_parser = parse_tolerance)]
        tolerance: f64,
        /// Also print the knots of the final value spline
        #[arg(long)]
        knots: bool,
    },
    /// Build the two-arm divide table and write it to FILENAME
    BayesBuild {
        filename: PathBuf,
        #[arg(value_parser = parse_positive)]
        horizon: usize,
        #[arg(value_parser = parse_tolerance)]
        tolerance: f64,
        #[arg(value_parser = parse_positive)]
        max_threads: usize,
    },
    /// Print the divide for (m, T1, T2) from a two-arm table file
    BayesLookup {
        filename: PathBuf,
        m: u32,
        t1: u32,
        t2: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Bare,
    Headered,
}

impl From<FormatArg> for TableFormat {
    fn from(format: FormatArg) -> TableFormat {
        match format {
            FormatArg::Bare => TableFormat::Bare,
            FormatArg::Headered => TableFormat::Headered,
        }
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_owned()),
        Ok(value) => Ok(value),
        Err(error) => Err(error.to_string()),
    }
}

fn parse_tolerance(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|error: std::num::ParseFloatError| error.to_string())?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err("must be a positive number".to_owned())
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BuildConfig> {
    match path {
        Some(path) => BuildConfig::from_reader(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(BuildConfig::default()),
    }
}

/// 無法收斂的錯誤前面加上精度提示，其餘原樣轉交
fn with_precision_hint(error: InductionError) -> anyhow::Error {
    if error.is_tolerance_unreachable() {
        anyhow::Error::new(error).context("tolerance unreachable at this precision; retry with a larger tolerance")
    } else {
        error.into()
    }
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Build { filename, horizon, tolerance, max_threads, format } => {
            config.horizon = horizon;
            config.max_threads = max_threads;
            config.induction.tolerance = tolerance;
            if let Some(format) = format {
                config.format = format.into();
            }
            config.validate()?;

            let table = build_gittins_table(&config).map_err(with_precision_hint)?;
            table.write(&filename, config.format)?;
            info!(path = %filename.display(), format = ?config.format, "table written");
        }
        Commands::Lookup { filename, n, t } => {
            let table = GittinsTable::open(&filename)?;
            let Some(index) = table.try_get_idx(n, t) else {
                bail!("cell (n = {n}, T = {t}) is outside a table of horizon {}", table.horizon());
            };
            println!("{index}");
        }
        Commands::Compute { m, t, tolerance, knots } => {
            config.induction.tolerance = tolerance;
            config.induction.validate()?;

            let chain = run_chain(m, t, &config.induction).map_err(with_precision_hint)?;
            let terminal = chain.terminal();
            println!(
                "index for ({}, {}) is {} based on {} splines",
                terminal.time_remaining, terminal.pulls, terminal.index, terminal.segments
            );
            if knots {
                for point in chain.spline().points() {
                    println!("{} {}", point.x(), point.y());
                }
            }
        }
        Commands::BayesBuild { filename, horizon, tolerance, max_threads } => {
            config.horizon = horizon;
            config.max_threads = max_threads;
            config.induction.tolerance = tolerance;
            config.validate()?;

            let table = build_bayes_table(&config).map_err(with_precision_hint)?;
            table.write(&filename)?;
            info!(path = %filename.display(), records = table.len(), "bayes table written");
        }
        Commands::BayesLookup { filename, m, t1, t2 } => {
            let table = BayesTable::open(&filename)?;
            let Some(divide) = table.lookup(&BayesKey::new(m, t1, t2)) else {
                bail!("no record for (m = {m}, T1 = {t1}, T2 = {t2})");
            };
            println!("{divide}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;
    use gaussgittins::math::curve::nonparametriccurve::splineerror::SplineError;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("gaussgittins").chain(args.iter().copied()))
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let error = parse(&["build", "table.bin", "0", "1e-5", "1"]).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn non_positive_tolerance_is_rejected() {
        for tolerance in ["0", "nan", "inf", "abc"] {
            let error = parse(&["compute", "3", "1", tolerance]).err().unwrap();
            assert_eq!(error.kind(), ErrorKind::ValueValidation, "tolerance {tolerance}");
        }
    }

    #[test]
    fn missing_argument_is_rejected() {
        let error = parse(&["bayes-build", "bayes.bin", "10", "1e-5"]).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);

        let error = parse(&["lookup", "table.bin", "3"]).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn build_arguments_parse() {
        let cli = parse(&["--config", "build.json", "build", "table.bin", "40", "1e-4", "3", "--format", "headered"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("build.json")));
        match cli.command {
            Commands::Build { filename, horizon, tolerance, max_threads, format } => {
                assert_eq!(filename, PathBuf::from("table.bin"));
                assert_eq!((horizon, max_threads), (40, 3));
                assert_eq!(tolerance, 1e-4);
                assert!(matches!(format, Some(FormatArg::Headered)));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn precision_hint_only_for_unconverged_errors() {
        let stage = gaussgittins::induction::inductionerror::Stage::Gittins { time_remaining: 3, pulls: 1 };
        let error = with_precision_hint(InductionError::Refinement {
            stage,
            source: SplineError::SegmentLimitExceeded { limit: 8 },
        });
        assert!(error.to_string().starts_with("tolerance unreachable at this precision"));
        assert!(format!("{error:#}").contains("exceeded 8 segments"));

        let error = with_precision_hint(InductionError::InvalidParameter("horizon".to_owned()));
        assert_eq!(error.to_string(), "invalid parameter: horizon");
    }
}
