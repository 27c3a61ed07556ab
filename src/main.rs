//! Patchbay CLI - command-line interface for the patchbay synthesis engine

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use patchbay::document::Document;
use patchbay::engine::{self, AudioEngine, DEFAULT_MAX_BLOCK};
use patchbay::graph::GraphRuntime;
use patchbay::registry;

#[derive(Parser)]
#[command(name = "patchbay")]
#[command(about = "Modular node-based synthesis engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available module types and their ports
    List,

    /// Print the modules and connections of a patch file
    Describe {
        /// Patch file (.json)
        file: PathBuf,
    },

    /// Render a patch file to a stereo WAV
    Render {
        /// Patch file (.json)
        file: PathBuf,

        /// Output WAV file path
        #[arg(short, long, default_value = "out.wav")]
        output: PathBuf,

        /// Duration in seconds (default: 10.0)
        #[arg(short, long, default_value = "10.0")]
        duration: f32,

        /// Sample rate in Hz (default: 44100)
        #[arg(short, long, default_value = "44100")]
        sample_rate: u32,
    },

    /// Play a patch file on the default output device
    Play {
        /// Patch file (.json)
        file: PathBuf,

        /// Duration in seconds (default: 10.0)
        #[arg(short, long, default_value = "10.0")]
        duration: f32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List => {
            for spec in registry::modules() {
                println!("{}", spec.name);
                println!("  inlets:  {}", spec.inlets.join(", "));
                println!("  outlets: {}", spec.outlets.join(", "));
                for param in spec.params {
                    println!(
                        "  param:   {} [{} .. {}] = {}",
                        param.id,
                        param.display_text(param.min),
                        param.display_text(param.max),
                        param.display_text(param.default),
                    );
                }
            }
        }

        Commands::Describe { file } => {
            let mut document = Document::new();
            let (runtime, _render) = GraphRuntime::new(44_100.0, DEFAULT_MAX_BLOCK);
            runtime.attach(&mut document);
            document.load(&file)?;

            println!("{} modules:", document.num_modules());
            for record in document.modules() {
                println!(
                    "  [{}] {} at ({}, {}){}",
                    record.id,
                    record.type_name,
                    record.bounds.x,
                    record.bounds.y,
                    if record.enabled { "" } else { " (disabled)" },
                );
            }
            println!("{} connections:", document.connections().len());
            for connection in document.connections() {
                println!(
                    "  {}:{} -> {}:{}",
                    connection.source.module,
                    connection.source.port,
                    connection.destination.module,
                    connection.destination.port,
                );
            }
        }

        Commands::Render {
            file,
            output,
            duration,
            sample_rate,
        } => {
            let mut document = Document::new();
            let (runtime, mut render) =
                GraphRuntime::new(f64::from(sample_rate), DEFAULT_MAX_BLOCK);
            runtime.attach(&mut document);
            document.load(&file)?;

            let num_samples = (duration * sample_rate as f32) as usize;
            let samples = render.render(num_samples);

            let spec = hound::WavSpec {
                channels: 2,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(&output, spec)?;
            for sample in samples {
                writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
            println!("Rendered {duration}s to {}", output.display());
        }

        Commands::Play { file, duration } => {
            let (sample_rate, max_block) = engine::output_spec()?;
            let mut document = Document::new();
            let (runtime, render) = GraphRuntime::new(sample_rate, max_block);
            runtime.attach(&mut document);
            document.load(&file)?;

            let _engine = AudioEngine::start(render)?;
            std::thread::sleep(std::time::Duration::from_secs_f32(duration));
        }
    }

    Ok(())
}
