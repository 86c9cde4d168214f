//! fetchdns
//!
//! Resolves names through DNS-over-HTTPS providers from the command line.

mod logging;

use anyhow::{bail, Context, Result};
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Parser, Subcommand};
use console::style;
use fetchdns_config::Config;
use fetchdns_proto::RecordType;
use fetchdns_resolver::{DohResolver, Family};
use logging::{init_tracing, parse_log_level, LogConfig, LogFormat};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// fetchdns - DNS lookups over HTTPS
#[derive(Parser, Debug)]
#[command(name = "fetchdns")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (YAML, JSON or TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// DoH endpoint to query; repeat to give several
    #[arg(short, long = "server", global = true, value_name = "URL")]
    servers: Vec<Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve records of one type
    Resolve {
        /// Hostname to resolve
        hostname: String,

        /// Record type (A, AAAA, CNAME, MX, NAPTR, NS, PTR, SOA, SRV, TXT, ANY)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        rtype: Option<String>,

        /// Show TTLs
        #[arg(long)]
        ttl: bool,
    },

    /// Look up addresses
    Lookup {
        /// Hostname to look up
        hostname: String,

        /// Address family: 0 (either), 4 or 6
        #[arg(short, long, default_value_t = 0, value_parser = PossibleValuesParser::new(["0", "4", "6"]).map(|s| s.parse::<u8>().unwrap_or(0)))]
        family: u8,

        /// Return every address instead of one
        #[arg(short, long)]
        all: bool,
    },

    /// Resolve every supported record type present for a name
    Any {
        /// Hostname to resolve
        hostname: String,
    },

    /// Show the upstream servers in use
    Servers,

    /// Validate the configuration file
    Validate {
        /// Show the loaded configuration
        #[arg(short, long)]
        verbose: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_logging(config: &Config, cli_level: Option<&str>) {
    let level = parse_log_level(cli_level.unwrap_or(&config.logging.level));
    init_tracing(&LogConfig {
        level,
        format: LogFormat::from_name(&config.logging.format),
    });
}

fn validate_config(path: Option<&PathBuf>, verbose: bool) -> Result<()> {
    let Some(path) = path else {
        bail!("No configuration file given, pass one with --config");
    };

    println!("Validating configuration: {}", path.display());
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    if verbose {
        println!("\n{}", style("Configuration loaded:").green().bold());
        for server in &config.resolver.servers {
            println!("  Server: {server}");
        }
        println!("  Default TTL: {}s", config.resolver.default_ttl_secs);
        println!("  Timeout: {}ms", config.resolver.timeout_ms);
        println!("  Cleanup batch: {}", config.cache.batch_size);
        println!("  Cleanup period: {}s", config.cache.clean_period_secs);
        println!("  Logging: {} ({})", config.logging.level, config.logging.format);
    }

    config
        .validate()
        .with_context(|| "Configuration validation failed")?;

    println!("{}", style("Configuration is valid!").green().bold());
    Ok(())
}

async fn resolve(
    resolver: &DohResolver,
    hostname: &str,
    rtype: Option<&str>,
    ttl: bool,
    as_json: bool,
) -> Result<()> {
    if ttl {
        let rtype = match rtype {
            Some(name) => name
                .parse::<RecordType>()
                .with_context(|| format!("Unsupported record type {name}"))?,
            None => RecordType::A,
        };
        let records = resolver.resolve_with_ttl(hostname, rtype).await?;
        if as_json {
            let items: Vec<_> = records
                .iter()
                .map(|r| json!({ "record": r.record, "ttl": r.ttl }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        } else {
            for r in &records {
                println!("{}\t{}", r.ttl, r.record);
            }
        }
        return Ok(());
    }

    let records = resolver.resolve_by_name(hostname, rtype).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{record}");
        }
    }
    Ok(())
}

async fn lookup(
    resolver: &DohResolver,
    hostname: &str,
    family: Family,
    all: bool,
    as_json: bool,
) -> Result<()> {
    let addresses = if all {
        resolver.lookup_all(hostname, family).await?
    } else {
        vec![resolver.lookup(hostname, family).await?]
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&addresses)?);
    } else {
        for address in &addresses {
            println!("{}\tIPv{}", address.address, address.family);
        }
    }
    Ok(())
}

async fn any(resolver: &DohResolver, hostname: &str, as_json: bool) -> Result<()> {
    let records = resolver.resolve_any(hostname).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for any in &records {
            println!("{}\t{}", style(&any.type_name).cyan(), any.record);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Validate { verbose } = &cli.command {
        return validate_config(cli.config.as_ref(), *verbose);
    }

    let config = load_config(cli.config.as_ref())?;
    init_logging(&config, cli.log_level.as_deref());

    let resolver = DohResolver::new(config.resolver_config()).context("Failed to build resolver")?;
    if !cli.servers.is_empty() {
        debug!(servers = cli.servers.len(), "Overriding configured servers");
        resolver.set_servers(cli.servers.clone());
    }

    match cli.command {
        Commands::Resolve { hostname, rtype, ttl } => {
            resolve(&resolver, &hostname, rtype.as_deref(), ttl, cli.json).await?
        }
        Commands::Lookup {
            hostname,
            family,
            all,
        } => {
            let family = Family::from_number(family).unwrap_or_default();
            lookup(&resolver, &hostname, family, all, cli.json).await?
        }
        Commands::Any { hostname } => any(&resolver, &hostname, cli.json).await?,
        Commands::Servers => {
            let servers: Vec<String> = resolver.get_servers().iter().map(Url::to_string).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&servers)?);
            } else {
                for server in servers {
                    println!("{server}");
                }
            }
        }
        Commands::Validate { .. } => unreachable!(),
    }

    Ok(())
}
