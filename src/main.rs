use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracebuild::{build_with_diagnostics, parse_plot_spec, Dataset};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tracebuild")]
#[command(about = "Build plotly.js traces and layout from a JSON plot spec", long_about = None)]
struct Args {
    /// Plot spec JSON file, or '-' to read it from stdin
    spec: String,

    /// Bind a CSV file to a dataset name (e.g. --data cars=cars.csv)
    #[arg(short, long = "data", value_name = "NAME=PATH")]
    data: Vec<String>,

    /// Pretty-print the figure JSON
    #[arg(long)]
    pretty: bool,

    /// Write the figure to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    // Read the plot spec
    let text = if args.spec == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read plot spec from stdin")?;
        buf
    } else {
        fs::read_to_string(&args.spec)
            .with_context(|| format!("Failed to read plot spec '{}'", args.spec))?
    };
    let mut spec = parse_plot_spec(&text).context("Failed to parse plot spec")?;

    // Attach CSV datasets; they replace inline datasets of the same name
    for binding in &args.data {
        let (name, path) = binding
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected NAME=PATH for --data, got '{}'", binding))?;
        let file = File::open(path).with_context(|| format!("Failed to open '{}'", path))?;
        let dataset =
            Dataset::from_csv(file).with_context(|| format!("Failed to load dataset '{}'", name))?;
        spec.datasets.insert(name.to_string(), dataset);
    }

    // Build the figure
    let (figure, _diagnostics) = build_with_diagnostics(&spec).context("Failed to build plot")?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&figure)
    } else {
        serde_json::to_string(&figure)
    }
    .context("Failed to serialize figure")?;

    match &args.output {
        Some(path) => fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write '{}'", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", json).context("Failed to write figure to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
