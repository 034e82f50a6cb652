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

//! End-to-end tests: configuration on disk through key presses to rendered audio.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::Renderer;
use crate::config::Config;
use crate::controller::{Controller, KeyEvent};
use crate::sampler::{PlayState, Sampler, SamplerHandle, Transport};

const RATE: u32 = 48000;

/// Frames per beat at 120 bpm.
const BEAT: usize = 24000;

fn write_wav(path: &Path, frames: usize, value: i16) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

struct Rig {
    _dir: tempfile::TempDir,
    handle: SamplerHandle,
    controller: Controller,
    renderer: Renderer,
}

impl Rig {
    fn new() -> Rig {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("samples")).unwrap();
        write_wav(&dir.path().join("samples/click.wav"), 200, 16384);
        write_wav(&dir.path().join("samples/tone.wav"), RATE as usize, 8192);

        std::fs::write(
            dir.path().join("program.yaml"),
            r#"
instruments:
  - name: click
    file: samples/click.wav
    root_note: 36
    channel: 9
    attack_ms: 0
    note_off: play_to_completion
  - name: tone
    file: samples/tone.wav
    root_note: 60
    key_range: [48, 72]
    release_ms: 1
"#,
        )
        .unwrap();

        let config_path: PathBuf = dir.path().join("keysampler.yaml");
        std::fs::write(
            &config_path,
            r#"
program: program.yaml
audio:
  sample_rate: 48000
  buffer_size: 512
sampler:
  voices: 8
transport:
  tempo: 120
keymap:
  keys:
    - key: a
      note: 60
      vel: 127
  sequences:
    - key: "1"
      chan: 9
      stepdur: 1
      notes:
        - note: 36
          velocity: 127
          data: "1000"
    - key: "2"
      chan: 9
      notes:
        - note: 36
          data: "10x0"
"#,
        )
        .unwrap();

        let config = Config::deserialize(&config_path).unwrap();
        let program = Arc::new(config.load_program().unwrap());
        let settings = config
            .sampler()
            .settings(config.audio().sample_rate(), config.transport());
        let (sampler, handle) = Sampler::new(program, settings);
        let controller = Controller::new(handle.clone(), config.keymap());
        let renderer = Renderer::new(
            sampler,
            Transport::new(config.transport().tempo()),
            config.audio().buffer_size(),
        );

        Rig {
            _dir: dir,
            handle,
            controller,
            renderer,
        }
    }

    fn press(&self, key: char) {
        assert!(self.controller.handle_key(KeyEvent::Down(key)));
    }

    fn release(&self, key: char) {
        assert!(self.controller.handle_key(KeyEvent::Up(key)));
    }

    /// Renders mono frames through a stereo device buffer.
    fn render(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        self.renderer.render_interleaved(&mut out, 2);
        out.chunks_exact(2).map(|f| f[0]).collect()
    }
}

fn is_silent(samples: &[f32]) -> bool {
    samples.iter().all(|s| *s == 0.0)
}

#[test]
fn test_note_key_plays_and_releases() {
    let mut rig = Rig::new();
    rig.press('a');
    let held = rig.render(1000);
    assert!((held[999] - 0.25).abs() < 1e-3);

    rig.release('a');
    let released = rig.render(1000);
    // A 1 ms release at 48k.
    assert!(released[0] > 0.0);
    assert!(is_silent(&released[100..]));
    assert_eq!(0, rig.handle.stats().dropped_events);
}

#[test]
fn test_sequence_key_triggers_on_the_beat() {
    let mut rig = Rig::new();
    rig.press('1');

    // "1000" with one beat steps repeats every four beats.
    let out = rig.render(5 * BEAT);
    assert!(out[100] > 0.0);
    assert!(is_silent(&out[300..4 * BEAT]));
    assert!(out[4 * BEAT + 100] > 0.0);
    assert!(is_silent(&out[4 * BEAT + 300..]));
}

#[test]
fn test_sequence_key_toggles_off() {
    let mut rig = Rig::new();
    rig.press('1');
    rig.render(BEAT);

    rig.press('1');
    assert!(rig.handle.active_sequence(9).is_none());
    let out = rig.render(4 * BEAT);
    assert!(is_silent(&out));
}

#[test]
fn test_invalid_sequence_is_skipped() {
    let mut rig = Rig::new();
    rig.press('2');
    assert!(rig.handle.active_sequence(9).is_none());
    assert!(is_silent(&rig.render(BEAT)));
}

#[test]
fn test_stopped_transport_keeps_live_voices() {
    let mut rig = Rig::new();
    rig.handle.set_play_state(PlayState::Stopped);
    rig.press('1');
    rig.press('a');

    let out = rig.render(2 * BEAT);
    assert!((out[2 * BEAT - 1] - 0.25).abs() < 1e-3);
    assert_eq!(0.0, rig.renderer.transport().position());

    // Sequencing resumes from the top once playing again.
    rig.release('a');
    rig.handle.set_play_state(PlayState::Playing);
    let out = rig.render(BEAT);
    assert!(out[100] > 0.0);
}

#[test]
fn test_unmapped_keys_do_nothing() {
    let mut rig = Rig::new();
    rig.press('z');
    rig.release('z');
    assert!(is_silent(&rig.render(1000)));
    assert_eq!(0, rig.handle.stats().dropped_events);
}
