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

use crate::sampler::{Sampler, Transport};

pub mod cpal;
pub mod offline;

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::Device>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Drives a sampler from a device callback.
///
/// The sampler renders mono, so every block is rendered into a scratch buffer and then
/// copied to each interleaved output channel. Requests larger than the scratch buffer are
/// split into several blocks.
pub struct Renderer {
    sampler: Sampler,
    transport: Transport,
    scratch: Vec<f32>,
}

impl Renderer {
    /// Creates a renderer whose blocks are at most `max_block` frames long.
    pub fn new(sampler: Sampler, transport: Transport, max_block: usize) -> Renderer {
        Renderer {
            sampler,
            transport,
            scratch: vec![0.0; max_block.max(1)],
        }
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Fills an interleaved f32 buffer.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        self.render_interleaved_as(out, channels, |sample| sample);
    }

    /// Fills an interleaved buffer of any sample type. Trailing samples that do not make up
    /// a whole frame are silenced.
    pub fn render_interleaved_as<T, F>(&mut self, out: &mut [T], channels: usize, convert: F)
    where
        T: Copy,
        F: Fn(f32) -> T,
    {
        let channels = channels.max(1);
        let whole = out.len() - out.len() % channels;
        let (frames, rest) = out.split_at_mut(whole);
        rest.fill(convert(0.0));

        for chunk in frames.chunks_mut(self.scratch.len() * channels) {
            let len = chunk.len() / channels;
            let block = &mut self.scratch[..len];
            self.sampler.render(&mut self.transport, block);
            for (frame, sample) in chunk.chunks_exact_mut(channels).zip(block.iter()) {
                frame.fill(convert(*sample));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::program::{Instrument, Program};
    use crate::sampler::{MidiEvent, SamplerSettings};

    fn renderer(max_block: usize) -> (Renderer, crate::sampler::SamplerHandle) {
        let program = Arc::new(Program::new(vec![Instrument::new(
            "dc",
            Arc::new(vec![0.5; 48000]),
            48000,
        )
        .with_attack_ms(0.0)]));
        let (sampler, handle) = Sampler::new(program, SamplerSettings::default());
        (
            Renderer::new(sampler, Transport::new(120.0), max_block),
            handle,
        )
    }

    #[test]
    fn test_silence_fills_every_channel() {
        let (mut renderer, _handle) = renderer(64);
        let mut out = vec![1.0f32; 2 * 100 + 1];
        renderer.render_interleaved(&mut out, 2);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_mono_is_replicated() {
        let (mut renderer, handle) = renderer(64);
        handle
            .post_midi_event(MidiEvent::note_on(0, 60, 127))
            .unwrap();

        let mut out = vec![0.0f32; 3 * 200];
        renderer.render_interleaved(&mut out, 3);
        for frame in out.chunks_exact(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[0], frame[2]);
        }
        assert!(out[3 * 199] > 0.0);
    }

    #[test]
    fn test_large_requests_are_split() {
        let (mut renderer, _handle) = renderer(64);
        let mut out = vec![0.0f32; 2 * 1000];
        renderer.render_interleaved(&mut out, 2);

        // 1000 frames at 48k and 120 bpm.
        let expected = 1000.0 / 48000.0 * 2.0;
        assert!((renderer.transport().position() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_integer_output() {
        let (mut renderer, handle) = renderer(64);
        handle
            .post_midi_event(MidiEvent::note_on(0, 60, 127))
            .unwrap();
        let mut out = vec![0i16; 2 * 128];
        renderer.render_interleaved_as(&mut out, 2, |s| (s * i16::MAX as f32) as i16);
        assert!(out[2 * 127] > 0);
    }
}
