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
use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use super::Renderer;
use crate::config;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// The negotiated output format.
#[derive(Clone, Debug)]
pub struct OutputFormat {
    pub stream_config: cpal::StreamConfig,
    pub sample_format: cpal::SampleFormat,
}

impl OutputFormat {
    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.stream_config.channels
    }
}

impl Device {
    /// Lists cpal output devices.
    pub fn list() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs.map(|c| c.channels()).max().unwrap_or(0);
                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the configured device, or the default output device when none is named.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let Some(name) = config.device() else {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device available")?;
            let max_channels = device
                .supported_output_configs()?
                .map(|c| c.channels())
                .max()
                .unwrap_or(0);
            return Ok(Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
            });
        };

        Device::list()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name).into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Negotiates the output format. The device's default rate is kept, the buffer size
    /// comes from the configuration, and a channel count other than the configured one is
    /// an error.
    pub fn output_format(&self, config: &config::Audio) -> Result<OutputFormat, Box<dyn Error>> {
        let supported = self.device.default_output_config()?;
        let sample_format = supported.sample_format();
        if let cpal::SupportedBufferSize::Range { min, max } = supported.buffer_size() {
            info!(min, max, "Device buffer size range");
        }

        let mut stream_config: cpal::StreamConfig = supported.into();
        if stream_config.channels != config.channels() {
            return Err(format!(
                "device {} provides {} channels, {} are configured",
                self.name,
                stream_config.channels,
                config.channels()
            )
            .into());
        }
        stream_config.buffer_size = cpal::BufferSize::Fixed(config.buffer_size() as u32);

        Ok(OutputFormat {
            stream_config,
            sample_format,
        })
    }

    /// Builds and starts the output stream. The stream plays until it is dropped.
    pub fn start(
        &self,
        format: &OutputFormat,
        mut renderer: Renderer,
    ) -> Result<cpal::Stream, Box<dyn Error>> {
        let channels = format.channels() as usize;
        let config = &format.stream_config;
        let err_fn = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);

        let stream = match format.sample_format {
            cpal::SampleFormat::F32 => self.device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    renderer.render_interleaved(data, channels);
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I16 => self.device.build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    renderer.render_interleaved_as(data, channels, i16_from_f32);
                },
                err_fn,
                None,
            )?,
            cpal::SampleFormat::I32 => self.device.build_output_stream(
                config,
                move |data: &mut [i32], _: &cpal::OutputCallbackInfo| {
                    renderer.render_interleaved_as(data, channels, i32_from_f32);
                },
                err_fn,
                None,
            )?,
            other => return Err(format!("unsupported sample format {}", other).into()),
        };
        stream.play()?;

        info!(
            device = %self.name,
            sample_rate = format.sample_rate(),
            channels,
            buffer_size = ?config.buffer_size,
            "CPAL output stream started"
        );
        Ok(stream)
    }
}

fn i16_from_f32(sample: f32) -> i16 {
    <i16 as cpal::Sample>::from_sample(sample)
}

fn i32_from_f32(sample: f32) -> i32 {
    <i32 as cpal::Sample>::from_sample(sample)
}
