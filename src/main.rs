use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use daioe_rollup::config::parse_delimiter;
use daioe_rollup::{
    CsvSource, OutputFormat, OutputStore, PipelineConfig, PipelinePayload, Taxonomy, run_pipeline,
};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

/// Roll DAIOE exposure indices up the SSYK hierarchy
#[derive(Parser, Debug)]
#[command(name = "daioe-rollup")]
#[command(version)]
struct Args {
    /// Taxonomy to process; repeat for several (default: all)
    #[arg(short, long = "taxonomy", value_enum)]
    taxonomies: Vec<Taxonomy>,

    /// Field delimiter of input and CSV output files (`\t` for tab)
    #[arg(long, env = "DAIOE_CSV_SEP")]
    sep: Option<String>,

    /// Directory with `daioe_<taxonomy>.csv` and `employment_<taxonomy>.csv`
    #[arg(short, long, env = "DAIOE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory the aggregated tables are written to
    #[arg(short, long, env = "DATA_CACHE_DIR")]
    output_dir: Option<PathBuf>,

    /// Output file format
    #[arg(long, value_enum, default_value = "parquet")]
    format: OutputFormat,

    /// Process taxonomies one after another
    #[arg(long)]
    sequential: bool,

    /// JSON config file; command-line flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid DAIOE_* environment override")?;

    if !args.taxonomies.is_empty() {
        config.taxonomies.clone_from(&args.taxonomies);
    }
    if let Some(sep) = &args.sep {
        config.delimiter = parse_delimiter(sep)?;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir.clone_from(dir);
    }
    if args.output_dir.is_some() {
        config.output_dir.clone_from(&args.output_dir);
    }
    if args.sequential {
        config.parallel = false;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;
    info!("Configuration:\n{config}");

    let start = Instant::now();
    let source = CsvSource::new(config.clone());
    let results = run_pipeline(&source, &config).context("Pipeline produced no output")?;

    for (taxonomy, output) in &results.outputs {
        println!(
            "{taxonomy}: employment year {}, weighted rows {}, simple rows {}",
            output.employment_year,
            output.weighted.num_rows(),
            output.simple.num_rows()
        );
    }
    for (taxonomy, e) in &results.failures {
        error!("{taxonomy} was skipped: {e}");
    }

    let payload = PipelinePayload::combine(&results)?;
    if let Some(dir) = &config.output_dir {
        let store = OutputStore::new(dir);
        store
            .save_as(&payload, args.format, config.delimiter)
            .with_context(|| format!("Failed to write output to {}", dir.display()))?;
        info!("Wrote {:?} output to {}", args.format, dir.display());
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
