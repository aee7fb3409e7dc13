use clap::{Arg, Command};
use dwh::RunSummary;
use std::process;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/dwh.toml";

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Sets a custom config file")
}

fn print_summary(summary: &RunSummary) {
    for count in summary.staged.iter().chain(&summary.inserted) {
        println!("  {}", count);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("Song Play Warehouse")
        .version("1.0")
        .about("Loads song-play logs into a Redshift star schema")
        .subcommand(
            Command::new("create-tables")
                .about("Drop and recreate the staging and star-schema tables")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("etl")
                .about("Copy staging data and insert the star schema")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Recreate the tables, then run the ETL")
                .arg(config_arg()),
        )
        .get_matches();

    let Some((name, sub_matches)) = matches.subcommand() else {
        println!("No subcommand specified. Use --help for usage information.");
        process::exit(1);
    };
    let config_path = sub_matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_CONFIG);

    let result = match name {
        "create-tables" => {
            println!("Creating tables with config: {}", config_path);
            dwh::run_create_tables(config_path).await.map(|()| None)
        }
        "etl" => {
            println!("Starting ETL with config: {}", config_path);
            dwh::run_etl(config_path).await.map(Some)
        }
        "run" => {
            println!("Starting full pipeline with config: {}", config_path);
            dwh::run_pipeline(config_path).await.map(Some)
        }
        _ => {
            eprintln!("Please specify a valid subcommand");
            process::exit(1);
        }
    };

    match result {
        Ok(Some(summary)) => {
            println!("Pipeline complete");
            print_summary(&summary);
            Ok(())
        }
        Ok(None) => {
            println!("Tables created");
            Ok(())
        }
        Err(e) => {
            eprintln!("Pipeline error: {}", e);
            process::exit(1);
        }
    }
}
