//! nexnet CLI: derive the transmission graph of one character from a Nexus file.

use clap::Parser;
use log::info;
use nexnet::error::Result;
use nexnet::nexus::NexusReaderBuilder;
use nexnet::pipeline::{CharacterSelector, PipelineBuilder};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "nexnet",
    version,
    about = "Derive a transmission network from a discrete-trait annotated phylogeny"
)]
struct Cli {
    /// Nexus file with TAXA, CHARACTERS and TREES blocks
    input: PathBuf,

    /// Character to analyze: 1-based index or name from CHARSTATELABELS
    #[arg(short, long, default_value = "1")]
    character: CharacterSelector,

    /// 0-based index of the tree within the TREES block
    #[arg(short, long, default_value = "0")]
    tree: usize,

    /// Output JSON file path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read the input through a buffered reader instead of into memory
    #[arg(long)]
    buffered: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match cli.verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.target(env_logger::Target::Stderr).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut reader = NexusReaderBuilder::for_file(&cli.input);
    if cli.buffered {
        reader = reader.with_buffered_source();
    }
    let file = reader.read()?;
    info!(
        "Read {} taxa, {} characters and {} trees from {}",
        file.metadata().taxa().len(),
        file.metadata().characters().len(),
        file.trees().len(),
        cli.input.display()
    );

    let graph = PipelineBuilder::new()
        .with_character(cli.character.clone())
        .with_tree(cli.tree)
        .build()
        .run(&file)?;

    match &cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, &graph)?;
            writeln!(writer)?;
            writer.flush()?;
            info!("Wrote transmission graph to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &graph)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
