//! Pedaler - Guitar Pedal Circuit Simulator
//!
//! A real-time circuit simulator for guitar effects pedals.
//!
//! # Usage
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - | pedaler circuit.ped | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```
//!
//! Offline batch modes are also available: `--dc` prints the DC operating
//! point instead of streaming audio, and `--probe <path>` additionally logs
//! every `.probe` target to a CSV file while streaming.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use clap::Parser;

use pedaler_core::{
    audio::process_audio,
    circuit::Circuit,
    dsl,
    error::Result,
    probe::ProbeWriter,
    solver::{operating_point, Simulator, SimulatorConfig},
    DEFAULT_SAMPLE_RATE,
};

/// Guitar pedal circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit description file (.ped)
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: f32,

    /// Print the DC operating point node voltages instead of streaming audio
    #[arg(long)]
    dc: bool,

    /// Write a CSV probe log to this path (or "-" for stdout) while streaming
    #[arg(long, value_name = "PATH")]
    probe: Option<PathBuf>,

    /// Override the circuit's `.warmup` duration, in seconds
    #[arg(long)]
    warmup: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let ast = dsl::parse_file(&args.circuit_file)?;
    let mut circuit = Circuit::from_ast(ast)?;
    pedaler_core::circuit::validate_circuit(&circuit)?;

    if let Some(warmup) = args.warmup {
        circuit.warmup = warmup;
    }

    if args.dc {
        let voltages = operating_point(&mut circuit);
        for (idx, name) in circuit.node_names.iter().enumerate() {
            println!("V({name}) = {:.9}", voltages[idx]);
        }
        return Ok(());
    }

    let config = SimulatorConfig::new();
    let mut simulator = Simulator::with_config(circuit, args.sample_rate, config);

    if let Some(path) = args.probe {
        if path.to_str() == Some("-") {
            run_with_probe(&mut simulator, io::stdout())?;
        } else {
            let file = File::create(&path).map_err(|source| pedaler_core::error::PedalerError::FileReadError {
                path: path.display().to_string(),
                source,
            })?;
            run_with_probe(&mut simulator, file)?;
        }
    } else {
        process_audio(&mut simulator)?;
    }

    Ok(())
}

/// Stream audio through the simulator while also writing a CSV probe log,
/// skipping samples still within the `.warmup` window.
fn run_with_probe<W: io::Write>(simulator: &mut Simulator, out: W) -> Result<()> {
    use pedaler_core::audio::{AudioInput, AudioOutput};

    let mut writer = ProbeWriter::new(out);
    let mut input = AudioInput::new();
    let mut output = AudioOutput::new();

    let mut in_samples = vec![0.0f32; pedaler_core::audio::BUFFER_SIZE];
    let mut out_samples = vec![0.0f32; pedaler_core::audio::BUFFER_SIZE];

    loop {
        let samples_read = input.read_block(&mut in_samples)?;
        if samples_read == 0 {
            break;
        }

        for i in 0..samples_read {
            simulator.set_input(in_samples[i]);
            let v_out = simulator.step();
            out_samples[i] = v_out;

            if !simulator.in_warmup() {
                let t = simulator.time();
                writer
                    .write_sample(simulator.circuit(), simulator.matrix(), t)
                    .map_err(|e| pedaler_core::error::PedalerError::AudioOutputError {
                        message: e.to_string(),
                    })?;
            }
        }

        output.write_block(&out_samples[..samples_read])?;
    }

    output.flush()?;
    Ok(())
}
