use anyhow::Context as _;
use clap::Parser;
use regvideo_core::{Pipeline, RunOptions, config::DEFAULT_CONFIG_FILE};
use std::{path::PathBuf, process::ExitCode};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

const ABOUT: &str = "Daily video regression test for the Mupen64Plus emulator.";
const AFTER_HELP: &str = "Exit codes:

    | Code | Meaning                   |
    | ---- | ------------------------- |
    | 0    | Success                   |
    | 1    | Config file load failure  |
    | 2    | Source checkout failure   |
    | 3    | Video build failure       |
    | 4    | Test execution failure    |
    | 5    | Result check failure      |
    | 6    | Report email failure      |
    | 7    | Archive failure           |
";

#[derive(clap::Parser)]
#[command(name = "regvideo", about = ABOUT, after_help = AFTER_HELP)]
struct Cli {
    #[arg(
        short,
        long,
        help = "Assume source code is present; don't check out and build"
    )]
    nobuild: bool,
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Set root of testing directory to PATH",
        long_help = "Set root of testing directory to PATH. Defaults to the directory \
           containing this executable."
    )]
    testpath: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Use regression test config file FILE",
        default_value = DEFAULT_CONFIG_FILE
    )]
    cfgfile: PathBuf,
    #[arg(short, long, help = "Log debug output to stderr")]
    verbose: bool,
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install log subscriber")
}

fn default_test_path() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate executable")?;
    exe.parent()
        .map(PathBuf::from)
        .context("Executable has no parent directory")
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let root = match cli.testpath {
        Some(path) => path,
        None => default_test_path()?,
    };

    let options = RunOptions {
        config_file: cli.cfgfile,
        no_build: cli.nobuild,
        ..RunOptions::new(root, chrono::Local::now().date_naive())
    };
    tracing::info!(root = %options.root.display(), nobuild = options.no_build, "starting regression run");

    let result = Pipeline::new(options).run();
    tracing::info!(status = %result.status, code = result.status.code(), "regression run finished");

    Ok(ExitCode::from(result.status.code()))
}
