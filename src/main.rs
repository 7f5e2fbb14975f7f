use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use cnm_community::cnm::{greedy_modularity_communities, CnmOutcome};
use cnm_community::community::modularity;
use cnm_community::config::{CnmOptions, DEFAULT_DESCRIPTOR};
use cnm_community::dataset::{DatasetLayout, DatasetLoader};
use cnm_community::graph::{EdgeListGraph, GraphView};
use cnm_community::logger::init_logger;
use cnm_community::report::display_communities;

/// Greedy modularity community detection.
#[derive(Debug, Parser)]
#[command(name = "cnm-community", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// YAML file with run options, flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resolution of the null model.
    #[arg(long, global = true)]
    resolution: Option<f64>,

    /// Stop once this many communities are left.
    #[arg(long, global = true)]
    cutoff: Option<usize>,

    /// Log the partition after every merge.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print member lists instead of the size histogram.
    #[arg(long, global = true)]
    members: bool,

    /// Print the outcome as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Append log records to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Partition a binary column dataset.
    Dataset {
        root: PathBuf,
        /// Descriptor file name inside the dataset directory.
        #[arg(long, default_value = DEFAULT_DESCRIPTOR)]
        descriptor: String,
        /// YAML file layout, the Istanbul layout when absent.
        #[arg(long)]
        layout: Option<PathBuf>,
    },
    /// Partition a `from to [weight]` text edge list.
    Edges {
        file: PathBuf,
        /// Node count, max id + 1 when absent.
        #[arg(long)]
        nodes: Option<usize>,
    },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    modularity: f64,
    outcome: &'a CnmOutcome<f64>,
}

impl Cli {
    fn options(&self) -> Result<CnmOptions> {
        let mut options = match &self.config {
            Some(path) => CnmOptions::from_yaml_file(path)?,
            None => CnmOptions::default(),
        };
        if let Some(resolution) = self.resolution {
            options.resolution = resolution;
        }
        if let Some(cutoff) = self.cutoff {
            options.cutoff = cutoff;
        }
        if self.verbose {
            options.verbose = true;
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_file.as_deref())?;
    let options = cli.options()?;

    let start = Instant::now();
    let graph = match &cli.command {
        Command::Dataset { root, descriptor, layout } => {
            let layout = match layout {
                Some(path) => DatasetLayout::from_yaml_file(path)?,
                None => DatasetLayout::default(),
            };
            DatasetLoader::new(root)
                .with_descriptor(descriptor.clone())
                .with_layout(layout)
                .load()
                .with_context(|| format!("failed to load dataset {}", root.display()))?
        }
        Command::Edges { file, nodes } => EdgeListGraph::from_txt_file(file, *nodes)?,
    };
    info!("Graph loaded in {:?}", start.elapsed());

    run_partition(&graph, &options, &cli)
}

fn run_partition<G: GraphView>(graph: &G, options: &CnmOptions, cli: &Cli) -> Result<()> {
    let start = Instant::now();
    let outcome = greedy_modularity_communities::<f64, G>(graph, options).context("partition failed")?;
    info!("Partition computed in {:?}", start.elapsed());

    let quality = modularity(graph, &outcome.communities, options.resolution)?;
    if cli.json {
        let report = JsonReport {
            modularity: quality,
            outcome: &outcome,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", display_communities(&outcome.communities, !cli.members));
        println!("modularity {:.6}", quality);
    }
    Ok(())
}
