//! cloudbuild CLI: sign in, build in the cloud, serve locally.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cloudbuild_config::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod browser;
mod commands;
mod output;
mod prompt;

#[derive(Parser)]
#[command(name = "cloudbuild")]
#[command(about = "Build mobile apps in the cloud", long_about = None)]
#[command(version)]
struct Cli {
    /// API server URL
    #[arg(long, env = "CLOUDBUILD_API_URL", global = true)]
    api_url: Option<String>,

    /// Settings file
    #[arg(long, env = "CLOUDBUILD_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in to the build cloud
    Login,
    /// Sign out from the build cloud
    Logout,
    /// Build the current project in the cloud
    Build(BuildArgs),
    /// Serve the current project locally
    Serve {
        /// Arguments forwarded verbatim to the native tooling
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Target platform (android, ios, ...)
    pub platform: Option<String>,

    /// Build type
    #[arg(long, value_parser = ["debug", "release"], default_value = "debug")]
    pub build_type: String,

    /// Open the build page in the browser instead of building here
    #[arg(long)]
    pub browser: bool,

    /// Open the debugger page (with --browser)
    #[arg(long, requires = "browser")]
    pub debugger: bool,

    /// Where to store the built package
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Android webview engine
    #[arg(long = "android_webview", alias = "android-webview")]
    pub android_webview: Option<String>,

    /// Android CPU architecture
    #[arg(long = "android_arch", alias = "android-arch")]
    pub android_arch: Option<String>,

    /// Do not ask before replacing the project files in the cloud
    #[arg(short, long)]
    pub yes: bool,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(api_url) = &cli.api_url {
        settings
            .set_api_url(api_url)
            .context("Invalid --api-url")?;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(&cli)?;
    let cwd = std::env::current_dir().context("Failed to resolve the current directory")?;

    let code = match cli.command {
        Commands::Login => commands::auth::login(&settings).await?,
        Commands::Logout => commands::auth::logout(&settings).await?,
        Commands::Build(args) => commands::remote::build(&settings, &cwd, args).await?,
        Commands::Serve { args } => commands::serve::serve(&settings, &cwd, args).await?,
    };

    Ok(code)
}
