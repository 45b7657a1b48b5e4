// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, hands each command to its use case and prints results.
//
//   inspect   dataset metadata + file selection
//   peek      one unshuffled batch, optional SVG
//   build     model assembly / checkpoint init + restore
//   evaluate  training-run loss summary, optional SVG
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildArgs, Commands, DatasetArgs, EvaluateArgs, PeekArgs};

#[derive(Parser, Debug)]
#[command(
    name = "hpn-vocoder",
    version = "0.1.0",
    about = "Data pipeline, model assembly and training evaluation for harmonic-plus-noise vocoders."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case; nothing is computed here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Inspect(args)  => run_inspect(args),
            Commands::Peek(args)     => run_peek(args),
            Commands::Build(args)    => run_build(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_inspect(args: DatasetArgs) -> Result<()> {
    use crate::application::dataset_use_case::DatasetUseCase;

    let summary = DatasetUseCase::new(args.into())?.inspect()?;
    let m = &summary.metadata;
    println!("audio_rate     {}", m.audio_rate);
    println!("input_rate     {}", m.input_rate);
    println!("input_keys     {}", m.input_keys.join(", "));
    println!("example_secs   {} (hop {})", m.example_secs, m.hop_secs);
    println!("audio_length   {}", m.audio_length());
    println!("input_length   {}", m.input_length());
    println!("n_samples      {}", m.n_samples);
    if let Some(n) = m.split_count(summary.split) {
        println!("split '{}'     {} examples", summary.split, n);
    }
    println!("files ({}):", summary.pattern);
    for f in &summary.files {
        println!("  {}", f.display());
    }
    Ok(())
}

fn run_peek(args: PeekArgs) -> Result<()> {
    use crate::application::dataset_use_case::DatasetUseCase;

    let request = args.request();
    let report = DatasetUseCase::new(args.dataset.into())?.peek(&request)?;
    println!("batch {} ({} examples)", request.batch_number, report.batch_size);
    for s in &report.stats {
        println!(
            "  {:<12} len={:<7} min={:<12.4} max={:<12.4} mean={:.4}",
            s.name, s.length, s.min, s.max, s.mean
        );
    }
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<()> {
    use crate::application::build_use_case::BuildUseCase;

    let report = BuildUseCase::new(args.into()).execute()?;
    println!("model          {}", report.model_type);
    println!("time_steps     {}", report.time_steps);
    println!("n_samples      {}", report.n_samples);
    println!("decoder inputs {}", report.decoder_inputs.join(", "));
    println!("parameters     {}", report.num_params);
    match &report.restored_from {
        Some(dir) => println!("restored from  {}", dir.display()),
        None => println!("restored from  (fresh weights)"),
    }
    for (name, shape) in &report.decoded {
        println!("  {name:<22} {shape:?}");
    }
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let losses = EvaluateUseCase::new(args.into()).execute()?;
    if losses.is_empty() {
        println!("No training runs found.");
    }
    for l in &losses {
        println!("{:<24} {:<6} epoch {:>8.2}  loss {:.5}", l.model_id, l.split, l.epoch, l.value);
    }
    Ok(())
}
