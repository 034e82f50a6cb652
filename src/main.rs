// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;

use keysampler::audio::{self, offline, Renderer};
use keysampler::config::Config;
use keysampler::controller::{self, keyboard, Controller, KeyEvent};
use keysampler::sampler::{Sampler, Transport};

const STATS_PERIOD: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A keyboard-driven polyphonic sampler with a step sequencer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays the configured program through the audio interface, driven from the keyboard.
    Play {
        /// The path to the sampler config.
        config_path: String,
    },
    /// Renders the configured program to a WAV file without an audio interface.
    Render {
        /// The path to the sampler config.
        config_path: String,
        /// The WAV file to write.
        output_path: String,
        /// How long to render.
        #[arg(short, long, default_value_t = 4.0)]
        seconds: f64,
        /// Keys held down from the first beat, e.g. "1a".
        #[arg(short, long, default_value = "")]
        keys: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play { config_path } => {
            let config = Config::deserialize(&PathBuf::from(&config_path))?;
            let program = Arc::new(config.load_program()?);
            let keymap = config.keymap();

            let device = audio::cpal::Device::get(config.audio())?;
            let format = device.output_format(config.audio())?;
            let settings = config
                .sampler()
                .settings(format.sample_rate(), config.transport());
            let (sampler, handle) = Sampler::new(program, settings);
            handle.set_play_state(config.transport().play_state());

            let renderer = Renderer::new(
                sampler,
                Transport::new(config.transport().tempo()),
                config.audio().buffer_size(),
            );
            let stream = device.start(&format, renderer)?;

            let stats = controller::spawn_stats_monitor(handle.clone(), STATS_PERIOD);
            let driver = Arc::new(keyboard::Driver::new());
            Controller::new(handle, keymap).spawn(driver).await?;

            stats.abort();
            drop(stream);
            info!("Stopped.");
        }
        Commands::Render {
            config_path,
            output_path,
            seconds,
            keys,
        } => {
            let config = Config::deserialize(&PathBuf::from(&config_path))?;
            let program = Arc::new(config.load_program()?);
            let sample_rate = config.audio().sample_rate();
            let settings = config.sampler().settings(sample_rate, config.transport());
            let (sampler, handle) = Sampler::new(program, settings);
            handle.set_play_state(config.transport().play_state());

            let controller = Controller::new(handle.clone(), config.keymap());
            for key in keys.chars() {
                controller.handle_key(KeyEvent::Down(key));
            }

            let block_size = config.audio().buffer_size();
            let mut renderer = Renderer::new(
                sampler,
                Transport::new(config.transport().tempo()),
                block_size,
            );
            let frames = (seconds.max(0.0) * sample_rate as f64).round() as usize;
            offline::render_to_wav(
                &mut renderer,
                &PathBuf::from(&output_path),
                frames,
                block_size,
                config.audio().channels(),
            )?;

            let stats = handle.stats();
            println!(
                "Rendered {} frames to {} ({} voices stolen, {} events dropped).",
                frames, output_path, stats.voices_stolen, stats.dropped_events
            );
        }
    }

    Ok(())
}
