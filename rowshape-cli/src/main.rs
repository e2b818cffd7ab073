use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rowshape_common::time::infer_time_unit;
use rowshape_common::value::dataset_from_json;
use rowshape_common::{Dataset, Options, Value};
use rowshape_transforms::transforms::{Bin, BinConfig};
use rowshape_transforms::utils::convert_to_2d_array;
use rowshape_transforms::{AggregationType, PipelineConfig, PipelineState, TransformedData};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, fmt::format::FmtSpan, prelude::*};

/// Reshape JSON rows into chart-ready datasets
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline config over a JSON array of rows
    Run {
        /// Path to a JSON array of flat objects
        #[arg(short, long)]
        data: PathBuf,

        /// Path to the pipeline config
        #[arg(short, long)]
        pipeline: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Rows)]
        format: OutputFormat,

        /// Column order for table output (defaults to the keys of the first row)
        #[arg(long, value_delimiter = ',')]
        headers: Option<Vec<String>>,
    },

    /// Bin a numeric field into a histogram
    Bin {
        #[arg(short, long)]
        data: PathBuf,

        /// Numeric field defining bucket membership
        #[arg(long)]
        field: String,

        /// Fixed bucket width, used verbatim
        #[arg(long, conflicts_with = "count")]
        size: Option<f64>,

        /// Target bucket count, rounded to a nice width
        #[arg(long)]
        count: Option<usize>,

        /// Field to reduce per bucket instead of counting rows
        #[arg(long)]
        value_field: Option<String>,

        /// Reducer for the value field (sum, mean, max, min, count, none)
        #[arg(long, requires = "value_field")]
        aggregation: Option<AggregationType>,
    },

    /// Print the time unit chosen for a timestamp field
    InferTimeUnit {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(long)]
        field: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Records as JSON objects
    Rows,
    /// A header row followed by value rows
    Table,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RowsOutput<'a> {
    transformed_data: &'a TransformedData,
    options: &'a Options,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Table {
    Single(Vec<Vec<Value>>),
    Facets(Vec<Vec<Vec<Value>>>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableOutput<'a> {
    transformed_data: Table,
    options: &'a Options,
}

fn load_dataset(path: &Path) -> Result<Dataset> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read data file {}", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Data file {} is not valid JSON", path.display()))?;
    let data = dataset_from_json(json)
        .with_context(|| format!("Data file {} is not an array of flat objects", path.display()))?;
    info!(rows = data.len(), path = %path.display(), "loaded dataset");
    Ok(data)
}

fn render_state(
    state: &PipelineState,
    format: OutputFormat,
    headers: Option<&[String]>,
) -> Result<serde_json::Value> {
    let json = match format {
        OutputFormat::Rows => serde_json::to_value(RowsOutput {
            transformed_data: &state.transformed_data,
            options: &state.options,
        })?,
        OutputFormat::Table => {
            let table = match &state.transformed_data {
                TransformedData::Rows(rows) => Table::Single(convert_to_2d_array(rows, headers)),
                TransformedData::Facets(facets) => Table::Facets(
                    facets
                        .iter()
                        .map(|rows| convert_to_2d_array(rows, headers))
                        .collect(),
                ),
            };
            serde_json::to_value(TableOutput {
                transformed_data: table,
                options: &state.options,
            })?
        }
    };
    Ok(json)
}

fn bin_config(size: Option<f64>, count: Option<usize>) -> BinConfig {
    match (size, count) {
        (Some(size), _) => BinConfig::size(size),
        (None, Some(count)) => BinConfig::count(count),
        (None, None) => BinConfig::default(),
    }
}

fn print_json(json: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(json)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_span_events(FmtSpan::CLOSE))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            pipeline,
            format,
            headers,
        } => {
            let config = PipelineConfig::from_path(&pipeline)
                .with_context(|| format!("Invalid pipeline config {}", pipeline.display()))?;
            let state = config.run(load_dataset(&data)?)?;
            print_json(&render_state(&state, format, headers.as_deref())?)
        }
        Commands::Bin {
            data,
            field,
            size,
            count,
            value_field,
            aggregation,
        } => {
            if size.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                bail!("--size must be a positive number");
            }
            if count == Some(0) {
                bail!("--count must be at least 1");
            }
            let mut bin = Bin::new(field);
            bin.bin = bin_config(size, count);
            bin.value_field = value_field;
            bin.aggregation_type = aggregation;
            let buckets = bin.run(&load_dataset(&data)?);
            print_json(&serde_json::to_value(buckets)?)
        }
        Commands::InferTimeUnit { data, field } => {
            let unit = infer_time_unit(&load_dataset(&data)?, &field);
            println!("{unit}");
            Ok(())
        }
    }
}
