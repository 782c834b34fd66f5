//! docgraph: command-line entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (`RUST_LOG` > CLI `-v` > `DOCGRAPH_LOG_LEVEL` > config)
//!   4. Init logger once
//!   5. Open the store and model provider
//!   6. Print a user summary, or the resolved status, and exit

use tracing::info;

use docgraph::service::DocGraph;
use docgraph::{config, error, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;
    logger::init(
        args.log_level.unwrap_or(config.log_level.as_str()),
        &config.dependency_log_level,
    )?;

    info!(
        service = %config.service_name,
        work_dir = %config.work_dir.display(),
        log_level = %config.log_level,
        "config loaded"
    );

    let service = DocGraph::from_config(&config)?;

    let Some(user_id) = args.user_id else {
        println!(
            "✓ {} ready: store={} provider={} work_dir={}",
            config.service_name,
            service.store_type(),
            service.provider_name(),
            config.work_dir.display()
        );
        return Ok(());
    };

    let overview = service.graph_overview(&user_id)?;
    let analytics = service.temporal_analytics(&user_id, false)?;

    println!("user: {user_id}");
    println!("entities: {}", overview.entities.len());
    println!("relationships: {}", overview.doc_relationships.len());
    println!("insights:");
    for insight in &analytics.insights {
        println!("  - {insight}");
    }
    Ok(())
}

struct CliArgs {
    config_path: Option<String>,
    log_level: Option<&'static str>,
    user_id: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut user_id = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: docgraph [OPTIONS] [USER_ID]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: {})", config::DEFAULT_CONFIG_PATH);
                println!("  -v, -vv, -vvv              Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ if user_id.is_none() && !arg.starts_with('-') => user_id = Some(arg),
            _ => {}
        }
    }

    //   -v → info, -vv → debug, -vvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { config_path, log_level, user_id }
}
