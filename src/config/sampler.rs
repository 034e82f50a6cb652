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
use serde::Deserialize;

use crate::sampler::{PlayState, SamplerSettings, StealPolicy, DEFAULT_TEMPO};

/// A YAML representation of the sampler settings. Unset fields keep the sampler defaults.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sampler {
    /// Number of voice slots.
    voices: Option<usize>,

    master_gain: Option<f32>,
    min_out: Option<f32>,
    max_out: Option<f32>,

    #[serde(default)]
    steal_policy: StealPolicy,

    /// Number of events that can wait for the render thread.
    queue_capacity: Option<usize>,

    /// Number of sequencer events a single block can hold.
    max_block_events: Option<usize>,
}

impl Sampler {
    /// Builds the sampler settings for the given output rate and transport.
    pub fn settings(&self, sample_rate: u32, transport: &Transport) -> SamplerSettings {
        let defaults = SamplerSettings::default();
        SamplerSettings {
            sample_rate,
            master_gain: self.master_gain.unwrap_or(defaults.master_gain),
            min_out: self.min_out.unwrap_or(defaults.min_out),
            max_out: self.max_out.unwrap_or(defaults.max_out),
            voices: self.voices.unwrap_or(defaults.voices).max(1),
            steal_policy: self.steal_policy,
            queue_capacity: self.queue_capacity.unwrap_or(defaults.queue_capacity).max(1),
            max_block_events: self.max_block_events.unwrap_or(defaults.max_block_events),
            tempo: transport.tempo(),
        }
    }
}

/// A YAML representation of the transport.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Transport {
    /// Beats per minute (default: 120).
    tempo: Option<f64>,

    /// State the transport starts in (default: playing).
    #[serde(default)]
    play_state: PlayState,
}

impl Transport {
    pub fn tempo(&self) -> f64 {
        self.tempo
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(DEFAULT_TEMPO)
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }
}

#[cfg(test)]
mod tests {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse<T: serde::de::DeserializeOwned>(yaml: &str) -> T {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<T>()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Sampler::default().settings(44100, &Transport::default());
        let defaults = SamplerSettings::default();
        assert_eq!(44100, settings.sample_rate);
        assert_eq!(defaults.voices, settings.voices);
        assert_eq!(defaults.queue_capacity, settings.queue_capacity);
        assert_eq!(StealPolicy::Oldest, settings.steal_policy);
        assert_eq!(120.0, settings.tempo);
    }

    #[test]
    fn test_overrides() {
        let sampler: Sampler = parse(
            r#"
            voices: 32
            master_gain: 0.5
            min_out: -0.8
            max_out: 0.8
            steal_policy: quietest
            queue_capacity: 64
            "#,
        );
        let transport: Transport = parse(
            r#"
            tempo: 96
            play_state: stopped
            "#,
        );
        let settings = sampler.settings(48000, &transport);
        assert_eq!(32, settings.voices);
        assert_eq!(0.5, settings.master_gain);
        assert_eq!(-0.8, settings.min_out);
        assert_eq!(0.8, settings.max_out);
        assert_eq!(StealPolicy::Quietest, settings.steal_policy);
        assert_eq!(64, settings.queue_capacity);
        assert_eq!(96.0, settings.tempo);
        assert_eq!(PlayState::Stopped, transport.play_state());
    }

    #[test]
    fn test_bad_tempo_falls_back() {
        let transport: Transport = parse("tempo: -10\n");
        assert_eq!(DEFAULT_TEMPO, transport.tempo());
    }
}
