use clap::Parser;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use northwind_bi::cli::{Cli, Commands};
use northwind_bi::{Pipeline, PipelineConfig, PipelineInput};

const DEFAULT_FILTER: &str = "nwbi=info,northwind_bi=info";

fn main() {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&cli) {
        if cli.json {
            let kind = err
                .downcast_ref::<northwind_bi::Error>()
                .map(northwind_bi::Error::kind)
                .or_else(|| {
                    err.downcast_ref::<northwind_bi::ConfigError>()
                        .map(|_| "config")
                })
                .unwrap_or("input");
            let payload = json!({
                "error": {
                    "kind": kind,
                    "message": format!("{err:#}"),
                }
            });
            eprintln!("{payload}");
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load_from(path)?,
        None => PipelineConfig::load()?,
    };
    let input = PipelineInput::from_path(cli.command.input())?;
    let pipeline = Pipeline::new(config);

    let out = match &cli.command {
        Commands::Kpis { .. } => {
            let run = pipeline.run(&input)?;
            json!({
                "kpis": run.kpis,
                "failures": run.kpis.failures(),
                "fan_outs": run.facts.fan_outs,
            })
        }
        Commands::Facts { .. } => {
            let (_, facts) = pipeline.build(&input)?;
            json!({
                "columns": facts.table.columns(),
                "rows": facts.table.records(),
                "fan_outs": facts.fan_outs,
                "unmatched": facts.unmatched,
            })
        }
        Commands::Quality { .. } => {
            let tables = pipeline.normalize_all(&input)?;
            let reports: Vec<_> = tables
                .quality_reports()
                .map(|q| {
                    json!({
                        "report": q,
                        "completeness_pct": q.completeness_pct(),
                    })
                })
                .collect();
            json!({ "tables": reports })
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
