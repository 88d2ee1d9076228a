use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::Path;
use testsproxy::config::{Config, LoggingConfig};
use testsproxy::config_validation::ConfigValidator;
use testsproxy::logging::{self, parse_log_format, parse_log_level};
use testsproxy::{Notifier, ProxyServer};
use tokio::signal;

#[derive(Parser)]
#[clap(
    version,
    about = "A tiny forward HTTP proxy with CONNECT tunneling for integration tests"
)]
struct Args {
    #[clap(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<String>,

    #[clap(long, value_name = "FILE", help = "Write a sample configuration file and exit")]
    generate_config: Option<String>,

    #[clap(short, long, value_name = "ADDR", help = "Listen address (e.g., 127.0.0.1:3128)")]
    listen: Option<SocketAddr>,

    #[clap(short, long, value_name = "PORT", help = "Listen port, keeping the configured address")]
    port: Option<u16>,

    #[clap(long, value_name = "MILLIS", help = "How long the relay waits for data per cycle")]
    poll_interval_ms: Option<u64>,

    #[clap(long, value_name = "BYTES", help = "Largest chunk relayed in one read")]
    chunk_size: Option<usize>,

    #[clap(long, value_name = "CYCLES", help = "Idle cycles before a CONNECT tunnel is closed")]
    tunnel_idle_cycles: Option<u32>,

    #[clap(long, value_name = "CYCLES", help = "Idle cycles before a plain request relay is closed")]
    request_idle_cycles: Option<u32>,

    #[clap(long, value_name = "SECONDS", help = "Timeout for connecting to destinations")]
    connect_timeout: Option<u64>,

    #[clap(long, value_name = "LEVEL", help = "Log level: trace, debug, info, warn or error")]
    log_level: Option<String>,

    #[clap(long, value_name = "FORMAT", help = "Log format: text or json")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.generate_config {
        Config::default()
            .to_file(path)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Failed to write sample configuration to {}", path))?;
        println!("Sample configuration file generated: {}", path);
        return Ok(());
    }

    let config = load_config(&args)?;
    logging::init(config.logging.as_ref()).map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    let validation = ConfigValidator::validate(&config);
    for warning in &validation.warnings {
        warn!("Configuration warning: {}", warning);
    }
    for suggestion in &validation.suggestions {
        info!("Configuration suggestion: {}", suggestion);
    }
    if !validation.is_valid {
        for err in &validation.errors {
            error!("Configuration error: {}", err);
        }
        anyhow::bail!("Invalid configuration ({} errors)", validation.errors.len());
    }

    info!("Starting testsproxy on port {}", config.listen_addr.port());
    let server = ProxyServer::bind(&config)
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen_addr))?;

    let notifier = Notifier::from_env();
    if let Err(e) = notifier.ready() {
        warn!("Readiness notification failed: {}", e);
    }

    let server_handle = tokio::spawn(server.run());

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            if !Path::new(path).exists() {
                anyhow::bail!("Configuration file not found: {}", path);
            }
            Config::from_file(path)
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Failed to load configuration from {}", path))?
        }
        None => Config::default(),
    };

    // Command line flags override the file
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(port) = args.port {
        config.listen_addr.set_port(port);
    }
    if let Some(millis) = args.poll_interval_ms {
        config.relay.poll_interval_ms = millis;
    }
    if let Some(size) = args.chunk_size {
        config.relay.chunk_size = size;
    }
    if let Some(cycles) = args.tunnel_idle_cycles {
        config.relay.tunnel_idle_cycles = cycles;
    }
    if let Some(cycles) = args.request_idle_cycles {
        config.relay.request_idle_cycles = cycles;
    }
    if let Some(secs) = args.connect_timeout {
        config.connect_timeout_secs = Some(secs);
    }

    if args.log_level.is_some() || args.log_format.is_some() {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        if let Some(level) = &args.log_level {
            logging.level = Some(parse_log_level(level).map_err(|e| anyhow::anyhow!("{}", e))?);
        }
        if let Some(format) = &args.log_format {
            logging.format = Some(parse_log_format(format).map_err(|e| anyhow::anyhow!("{}", e))?);
        }
    }

    Ok(config)
}
