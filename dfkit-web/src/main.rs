//! dfkit web server
//!
//! Runs the demo application built on the controller helpers.

use anyhow::Context;
use clap::Parser;
use dfkit_web::server::DfServerBuilder;
use dfkit_web::{init_logging, AppEnvironment, WebConfig};
use std::path::PathBuf;
use tracing::info;

/// dfkit web server - controller helpers demo application
#[derive(Parser)]
#[command(name = "dfkit-web")]
#[command(about = "Demo server for the dfkit controller helpers")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Application environment (development, testing, production)
    #[arg(long)]
    env: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    let mut config =
        WebConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    apply_args(&mut config, &args)?;

    if args.print_config {
        print!("{}", config.app.to_toml()?);
        return Ok(());
    }

    init_logging(&config.app.logging).context("Failed to initialize logging")?;
    info!(
        environment = %config.app.environment,
        address = %config.address(),
        "Configuration loaded"
    );

    let server = DfServerBuilder::with_config(config)
        .build()
        .context("Failed to build server")?;
    server.start().await?;

    Ok(())
}

fn apply_args(config: &mut WebConfig, args: &Args) -> anyhow::Result<()> {
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(env) = &args.env {
        config.app.environment = env.parse::<AppEnvironment>()?;
    }
    if let Some(level) = &args.log_level {
        config.app.logging.level = level.clone();
        config.app.logging.filter_directives.clear();
    }
    if args.dev {
        config.dev_mode = true;
        config.app.logging.format = dfkit_core::LogFormat::Pretty;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["dfkit-web"]);
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert!(!args.dev);

        let args = Args::parse_from([
            "dfkit-web",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--env",
            "prod",
            "--dev",
        ]);
        let mut config = WebConfig::default();
        apply_args(&mut config, &args).unwrap();

        assert_eq!(config.address(), "0.0.0.0:3000");
        assert!(config.app.environment.is_production());
        assert!(config.dev_mode);
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let args = Args::parse_from(["dfkit-web", "--env", "staging"]);
        let mut config = WebConfig::default();
        assert!(apply_args(&mut config, &args).is_err());
    }
}
