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

//! Headless rendering to a WAV file, block by block, exactly as a device would pull it.

use std::path::Path;

use tracing::info;

use super::Renderer;

/// Renders `frames` frames in blocks of `block_size` and writes them as a 32-bit float WAV.
pub fn render_to_wav(
    renderer: &mut Renderer,
    path: &Path,
    frames: usize,
    block_size: usize,
    channels: u16,
) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: renderer.sampler().sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;

    let block_size = block_size.max(1);
    let mut block = vec![0.0f32; block_size * channels as usize];
    let mut remaining = frames;
    while remaining > 0 {
        let len = remaining.min(block_size) * channels as usize;
        renderer.render_interleaved(&mut block[..len], channels as usize);
        for sample in &block[..len] {
            writer.write_sample(*sample)?;
        }
        remaining -= len / channels as usize;
    }
    writer.finalize()?;

    info!(
        path = ?path,
        frames,
        sample_rate = spec.sample_rate,
        channels,
        "Rendered to file"
    );
    Ok(())
}
