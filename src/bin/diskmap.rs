//! diskmap CLI
//!
//! Compacts a run-length disk map read from a file (or stdin) and prints the
//! resulting checksum.

use anyhow::{bail, Context};
use clap::Parser;
use diskmap_rs::{CompactionConfig, DiskMapBuilder, Policy};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "diskmap")]
#[command(about = "Compact a run-length disk map and print its checksum")]
struct Args {
    /// Input file containing the disk map ("-" reads stdin)
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Compaction policy (fragment, whole-file) [default: fragment]
    #[arg(short = 'p', long, conflicts_with = "part")]
    policy: Option<String>,

    /// Puzzle part: 1 selects fragment, 2 selects whole-file
    #[arg(long)]
    part: Option<u8>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Check block list invariants after every step
    #[arg(long)]
    verify: bool,

    /// Print the layout before and after compaction (small inputs only)
    #[arg(short = 'r', long)]
    render: bool,

    /// Print a JSON report instead of the bare checksum
    #[arg(long)]
    json: bool,
}

/// Parse the puzzle part number into a policy
fn parse_part(part: u8) -> anyhow::Result<Policy> {
    match part {
        1 => Ok(Policy::Fragment),
        2 => Ok(Policy::WholeFile),
        _ => bail!("Invalid part '{}'. Valid options: 1, 2", part),
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read disk map from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read disk map from {:?}", path))
    }
}

fn load_config(args: &Args) -> anyhow::Result<CompactionConfig> {
    let mut config = match &args.config {
        Some(path) => CompactionConfig::from_file(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        None => CompactionConfig::default(),
    };

    if let Some(policy) = &args.policy {
        config.policy = policy.parse()?;
    } else if let Some(part) = args.part {
        config.policy = parse_part(part)?;
    }
    if args.verify {
        config.verify_invariants = true;
    }

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!("Policy: {}, verify: {}", config.policy, config.verify_invariants);

    let input = read_input(&args.input)?;
    let render_limit = config.render_limit;
    let mut disk = DiskMapBuilder::from_config(config).build(&input)?;

    if args.render && disk.list().len() < render_limit {
        println!("{}", disk.render());
    }

    let mut log = disk.event_log();
    let report = disk.compact_with(&mut log)?;

    if args.render && disk.list().len() < render_limit {
        println!("{}", disk.render());
    }

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report.checksum);
    }

    info!(
        "Done: checksum {} after {} steps ({:.0}% of expected work)",
        report.checksum,
        report.stats.steps,
        log.progress() * 100.0
    );

    Ok(())
}
