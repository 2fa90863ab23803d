//! sonovm CLI: check, render, and run patches.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};

use sonovm::audio::CpalTransport;
use sonovm::config::EngineConfig;
use sonovm::dsl;
use sonovm::frame::Frame;
use sonovm::live::PatchFile;
use sonovm::osc::{OscConfig, OscListener};
use sonovm::render;
use sonovm::source::SourceKind;
use sonovm::vm::VirtualMachine;
use sonovm::wav;

/// How often the run loop checks for edits and shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often the run loop reports levels.
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "sonovm")]
#[command(about = "Per-sample DSP patch language and virtual machine", long_about = None)]
struct Cli {
    /// Engine config (default: ~/.sonovm/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a patch and print its syntax tree, disassembly and variables
    Check {
        /// Patch file
        patch: PathBuf,
    },

    /// Render a patch to a WAV file without a sound card
    Render {
        /// Patch file
        patch: PathBuf,

        /// Output WAV file path
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "5.0")]
        duration: f32,

        /// Input source (soundcard renders silence)
        #[arg(short, long)]
        source: Option<SourceKind>,

        /// WAV file looped by the file source
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Run a patch on the sound card, reloading it whenever the file changes
    Run {
        /// Patch file
        patch: PathBuf,

        /// Input source
        #[arg(short, long)]
        source: Option<SourceKind>,

        /// WAV file looped by the file source
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Listen for OSC control on this UDP port
        #[arg(short = 'P', long)]
        osc_port: Option<u16>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load().unwrap_or_default(),
    };

    match cli.command {
        Commands::Check { patch } => check(&patch),
        Commands::Render {
            patch,
            output,
            duration,
            source,
            input,
        } => render_wav(config, &patch, &output, duration, source, input.as_deref()),
        Commands::Run {
            patch,
            source,
            input,
            osc_port,
        } => run(config, &patch, source, input.as_deref(), osc_port),
    }
}

fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let dsl::Inspection { tree, patch } = dsl::inspect(&source)?;

    println!("-- syntax tree");
    print!("{tree}");
    println!("-- program ({} instructions)", patch.program.len());
    print!("{}", patch.program.disassemble(&patch.vars));
    println!("-- variables");
    for (slot, var) in patch.vars.iter().enumerate() {
        println!("{slot:4} {}", var.name);
    }
    Ok(())
}

fn load_input(path: Option<&Path>) -> Result<Option<Arc<[Frame]>>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let frames = wav::read_frames(path)?;
    info!(path = %path.display(), frames = frames.len(), "loaded input file");
    Ok(Some(Arc::from(frames)))
}

fn render_wav(
    mut config: EngineConfig,
    patch_path: &Path,
    output: &Path,
    duration: f32,
    source: Option<SourceKind>,
    input: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let patch = dsl::compile(&std::fs::read_to_string(patch_path)?)?;
    let file_frames = load_input(input)?;
    config.source = match (source, &file_frames) {
        (Some(kind), _) => kind,
        (None, Some(_)) => SourceKind::File,
        (None, None) => config.source,
    };

    let frames = (duration.max(0.0) * config.sample_rate as f32) as usize;
    let rendered = render::render(&config, patch, file_frames, frames)?;
    wav::write_interleaved(output, config.sample_rate, &rendered.samples)?;

    info!(
        output = %output.display(),
        frames = rendered.frames(),
        peak = rendered.peak(),
        source = %config.source,
        "render complete"
    );
    Ok(())
}

fn run(
    mut config: EngineConfig,
    patch_path: &Path,
    source: Option<SourceKind>,
    input: Option<&Path>,
    osc_port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut patch_file = PatchFile::new(patch_path);
    let patch = patch_file.load()?;
    let file_frames = load_input(input)?;
    if let Some(kind) = source {
        config.source = kind;
    }

    let (mut vm, [mut scope, mut spectrum]) =
        VirtualMachine::new(&config, Box::new(CpalTransport::new()));
    if let Some(frames) = file_frames {
        vm.set_file_frames(frames);
    }
    vm.load(patch);
    vm.start()?;

    let osc_config = match (osc_port, config.osc.clone()) {
        (Some(port), osc) => Some(OscConfig {
            listen_port: port,
            ..osc.unwrap_or_default()
        }),
        (None, osc) => osc,
    };
    let _osc = match osc_config {
        Some(osc_config) => match OscListener::start(&osc_config, vm.core()) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!(port = osc_config.listen_port, "OSC listener failed to start: {e}");
                None
            }
        },
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    info!(patch = %patch_path.display(), source = %config.source, "running; press Ctrl+C to stop");

    let core = vm.core();
    let mut scope_buf = vec![Frame::SILENCE; 4096];
    let mut output_peak = 0.0f32;
    let mut energy = 0.0f64;
    let mut energy_frames = 0u64;
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        if let Some(result) = patch_file.poll() {
            match result {
                Ok(patch) => {
                    vm.load(patch);
                    info!("patch reloaded");
                }
                Err(e) => error!("reload failed, keeping previous patch: {e}"),
            }
        }

        loop {
            let n = scope.read_into(&mut scope_buf);
            output_peak = scope_buf[..n]
                .iter()
                .fold(output_peak, |peak, f| peak.max(f.left.abs()).max(f.right.abs()));
            if n < scope_buf.len() {
                break;
            }
        }

        loop {
            let n = spectrum.read_into(&mut scope_buf);
            energy += scope_buf[..n]
                .iter()
                .map(|f| f64::from(f.left * f.left + f.right * f.right) / 2.0)
                .sum::<f64>();
            energy_frames += n as u64;
            if n < scope_buf.len() {
                break;
            }
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            let (in_left, in_right) = core.levels();
            let out_rms = (energy / energy_frames.max(1) as f64).sqrt();
            info!(
                in_left,
                in_right,
                out_peak = output_peak,
                out_rms,
                guard_trips = core.guard_trips(),
                telemetry_dropped = core.telemetry_dropped(),
                input_underruns = vm.input_underruns(),
                "levels"
            );
            output_peak = 0.0;
            energy = 0.0;
            energy_frames = 0;
            last_report = Instant::now();
        }

        thread::sleep(POLL_INTERVAL);
    }

    vm.stop();
    info!("shutdown");
    Ok(())
}
