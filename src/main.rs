use anyhow::Context as _;
use clap::{Parser, Subcommand};
use desvio::config::Config;
use desvio::rules::{DecisionModel, UrlDecisionModel};
use desvio::traffic::{calculate_adjusted_traffic, calculate_adjusted_weights};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "desvio")]
#[command(about = "Redirection decision engine for hierarchical service stacks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rule document and report whether it is installable
    Check {
        /// Path to a JSON rule document
        rules: PathBuf,
        /// Treat the document as URL-routing rules
        #[arg(long)]
        url: bool,
    },
    /// Derive the per-host weight that produces a desired traffic boost
    Weights {
        /// Number of hosts to boost
        #[arg(long)]
        weighted_hosts: u64,
        /// Desired per-host traffic change in percent (may be negative)
        #[arg(long)]
        percent: f64,
        /// Total connections across the stack
        #[arg(long)]
        connections: u64,
        /// Total hosts in the stack
        #[arg(long)]
        hosts: u64,
        /// Weight of a non-boosted host
        #[arg(long, default_value_t = 5)]
        default_weight: i64,
    },
    /// Derive the traffic delta a chosen weight produces
    Traffic {
        /// Number of hosts carrying the adjusted weight
        #[arg(long)]
        weighted_hosts: u64,
        /// Total connections across the stack
        #[arg(long)]
        connections: u64,
        /// Total hosts in the stack
        #[arg(long)]
        hosts: u64,
        /// Weight of a non-boosted host
        #[arg(long, default_value_t = 5)]
        default_weight: i64,
        /// Weight carried by the boosted hosts
        #[arg(long)]
        adjusted_weight: i64,
    },
    /// Generate an example configuration file
    Config {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Check { rules, url } => check_rules(rules, url)?,
        Commands::Weights {
            weighted_hosts,
            percent,
            connections,
            hosts,
            default_weight,
        } => {
            let result = calculate_adjusted_weights(
                weighted_hosts,
                percent,
                connections,
                hosts,
                default_weight,
            );
            println!("adjusted weight:        {}", result.adjusted_weight);
            println!("default weight:         {}", result.default_weight);
            println!(
                "weighted host traffic:  {:.1} connections",
                result.weighted_host_connections
            );
            println!(
                "default host traffic:   {:.1} connections",
                result.default_host_connections
            );
        }
        Commands::Traffic {
            weighted_hosts,
            connections,
            hosts,
            default_weight,
            adjusted_weight,
        } => {
            let result = calculate_adjusted_traffic(
                weighted_hosts,
                connections,
                hosts,
                default_weight,
                adjusted_weight,
            );
            match result.percent_delta {
                Some(delta) => println!("traffic delta:          {:+.1}%", delta),
                None => println!("traffic delta:          n/a (no non-weighted hosts)"),
            }
            println!(
                "weighted host traffic:  {:.1} connections",
                result.weighted_host_connections
            );
            println!(
                "default host traffic:   {:.1} connections",
                result.default_host_connections
            );
        }
        Commands::Config { output } => {
            Config::create_example_config(&output)
                .with_context(|| format!("failed to write config to {:?}", output))?;
            println!("Configuration file generated: {:?}", output);
            println!("Edit the file to match your environment.");
        }
        Commands::Validate { config } => {
            let loaded = Config::load_from_file(&config)
                .with_context(|| format!("configuration {:?} is invalid", config))?;
            println!("✓ Configuration file is valid");
            println!("  Service name:   {}", loaded.balancer.service_name);
            println!("  Default weight: {}", loaded.balancer.default_weight);
            println!("  Backup path:    {}", loaded.backup.base_path);
            println!("  Application:    {}", loaded.backup.app_name);
        }
        Commands::Version => {
            println!("desvio v{}", env!("CARGO_PKG_VERSION"));
            println!("Redirection decision engine for hierarchical service stacks");
        }
    }

    Ok(())
}

fn check_rules(path: PathBuf, url: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read rule document {:?}", path))?;

    let rule_count = if url {
        UrlDecisionModel::from_json(&raw)
            .with_context(|| format!("url rule document {:?} failed to compile", path))?
            .rule_count()
    } else {
        DecisionModel::from_json(&raw)
            .with_context(|| format!("rule document {:?} failed to compile", path))?
            .rule_count()
    };

    println!("✓ Document compiles: {} rules", rule_count);
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
