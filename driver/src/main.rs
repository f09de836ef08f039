use anyhow::Context;
use candycore::interface::FeatureRecord;
use candycore::math::NormaliserKind;
use clap::{Parser, Subcommand};
use generator::profile::{write_filterbank, GeneratorConfig, InjectedPulse};
use std::path::PathBuf;
use workflow::candidates::{load_candidates, write_candidates};
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Feature extraction for dispersed radio transient candidates")]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Featurize every candidate of a list against a filterbank
    Make {
        /// Candidate list (t0,dm,snr,wbin[,beam])
        candidates: PathBuf,
        #[arg(long)]
        fil: PathBuf,
        /// Load the workflow config from YAML instead of the flags below
        #[arg(long)]
        workflow: Option<PathBuf>,
        /// Kernel worker threads, 0 for one per core
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Search DMs from 0 to twice the candidate's DM
        #[arg(long, default_value_t = false)]
        no_zoom: bool,
        #[arg(long, default_value_t = 512.0)]
        fudging: f64,
        #[arg(long, default_value_t = NormaliserKind::ZScore)]
        normaliser: NormaliserKind,
        /// Compute features without writing them
        #[arg(long, default_value_t = false)]
        no_save: bool,
        #[arg(long, default_value = ".")]
        output: PathBuf,
        /// Beam for candidates that do not name one
        #[arg(long)]
        beam: Option<usize>,
    },
    /// Write a synthetic filterbank with one injected pulse and its candidate list
    Simulate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        candidates: PathBuf,
        /// Load the generator config from YAML instead of the flags below
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 256)]
        channels: usize,
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        #[arg(long, default_value_t = 5.0)]
        t0: f64,
        #[arg(long, default_value_t = 100.0)]
        dm: f64,
        #[arg(long, default_value_t = 4)]
        width: usize,
        #[arg(long, default_value_t = 1.5)]
        amplitude: f32,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print the scalar metadata of a feature file
    Inspect { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Command::Make {
            candidates,
            fil,
            workflow,
            threads,
            no_zoom,
            fudging,
            normaliser,
            no_save,
            output,
            beam,
        } => {
            let workflow_config = if let Some(path) = workflow {
                WorkflowConfig::load(path)?
            } else {
                WorkflowConfig::from_args(!no_zoom, fudging, threads, normaliser, !no_save, output, beam)
            };
            let candidates = load_candidates(&candidates, workflow_config.beam)?;
            let runner = Runner::new(workflow_config);
            let result = runner.execute_file(&fil, &candidates)?;

            for failure in &result.failures {
                eprintln!("failed: {}", failure);
            }
            for path in &result.written {
                println!("{}", path.display());
            }
            println!(
                "Featurized {}/{} candidates ({} written, {:.1} ms in kernels)",
                result.succeeded(),
                result.candidates,
                result.written.len(),
                result.metrics.kernel_time.as_secs_f64() * 1e3
            );
        }
        Command::Simulate {
            out,
            candidates,
            config,
            channels,
            duration,
            t0,
            dm,
            width,
            amplitude,
            seed,
        } => {
            let generator = if let Some(path) = config {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading generator config {}", path.display()))?;
                serde_yaml::from_str::<GeneratorConfig>(&contents)
                    .with_context(|| format!("parsing generator config {}", path.display()))?
            } else {
                GeneratorConfig {
                    nf: channels,
                    duration,
                    seed,
                    pulses: vec![InjectedPulse {
                        t0,
                        dm,
                        width,
                        amplitude,
                    }],
                    ..Default::default()
                }
            };
            let injected = write_filterbank(&generator, &out)?;
            write_candidates(&candidates, &injected)?;
            println!(
                "Wrote {} ({} channels, {} samples) and {} candidates to {}",
                out.display(),
                generator.nf,
                generator.nt(),
                injected.len(),
                candidates.display()
            );
        }
        Command::Inspect { path } => {
            let record = FeatureRecord::load(&path)?;
            println!("id     {}", record.id);
            println!("t0     {:.7} s", record.t0);
            println!("dm     {:.5} pc cm^-3", record.dm);
            println!("snr    {:.5}", record.snr);
            println!("wbin   {}", record.wbin);
            println!("nt     {}", record.nt);
            println!("nf     {}", record.nf);
            println!("ndms   {}", record.ndms);
            println!("band   {:.4}-{:.4} MHz (df {:.6} MHz)", record.fl, record.fh, record.df);
            println!("dt     {:.3e} s", record.dt);
            println!(
                "dmt    {:.4}-{:.4} step {:.6}, shape {:?}",
                record.dmtransform.dmlow,
                record.dmtransform.dmhigh,
                record.dmtransform.ddm,
                record.dmtransform.array.shape
            );
            println!("dyn    shape {:?}", record.dedispersed.array.shape);
        }
    }

    Ok(())
}
