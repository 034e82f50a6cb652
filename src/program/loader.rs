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

//! Sample loading and caching.
//!
//! Files are decoded entirely into memory and mixed down to mono before the sampler
//! starts, so nothing on the render path ever touches the disk.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use super::error::LoadError;

/// Decoded mono sample data.
#[derive(Clone)]
pub struct LoadedSample {
    data: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl LoadedSample {
    pub fn data(&self) -> Arc<Vec<f32>> {
        self.data.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.data.len()
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Loads sample files, sharing the decoded data between instruments that use the same file.
#[derive(Default)]
pub struct SampleLoader {
    cache: HashMap<PathBuf, LoadedSample>,
}

impl SampleLoader {
    pub fn new() -> SampleLoader {
        SampleLoader::default()
    }

    /// Loads a sample into memory, or returns the cached copy.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, LoadError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        info!(path = ?path, "Loading sample into memory");
        let (data, sample_rate) = decode_mono(path)?;
        if data.is_empty() {
            return Err(LoadError::EmptySample(path.to_path_buf()));
        }

        let loaded = LoadedSample {
            data: Arc::new(data),
            sample_rate,
        };
        info!(
            path = ?path,
            sample_rate,
            duration_ms = Duration::from_secs_f64(loaded.frames() as f64 / sample_rate as f64)
                .as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }
}

impl fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes the first audio track of a file and averages its channels into one.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), LoadError> {
    let decode_err = |source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoAudioTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| LoadError::MissingSampleRate(path.to_path_buf()))?;
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut mono = Vec::new();
    let mut scratch: Option<AudioBuffer<f32>> = None;
    while let Some(packet) = next_packet(format_reader.as_mut(), decoder.as_mut(), track_id)
        .map_err(decode_err)?
    {
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = ?path, error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_err(e)),
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let mut buf = match scratch.take() {
            Some(buf) if buf.capacity() as u64 >= capacity && *buf.spec() == spec => buf,
            _ => AudioBuffer::new(capacity, spec),
        };
        decoded.convert(&mut buf);
        mix_down(&buf, &mut mono);
        scratch = Some(buf);
    }

    Ok((mono, sample_rate))
}

/// Reads the next packet belonging to the track. End of stream is `Ok(None)`.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<Packet>, SymphoniaError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => return Ok(Some(packet)),
            Ok(_) => continue,
            Err(SymphoniaError::ResetRequired) => decoder.reset(),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        }
    }
}

fn mix_down(buf: &AudioBuffer<f32>, mono: &mut Vec<f32>) {
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return;
    }
    let scale = 1.0 / channels as f32;
    let start = mono.len();
    mono.extend_from_slice(&buf.chan(0)[..buf.frames()]);
    for ch in 1..channels {
        for (out, sample) in mono[start..].iter_mut().zip(buf.chan(ch)) {
            *out += *sample;
        }
    }
    if channels > 1 {
        for out in &mut mono[start..] {
            *out *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 44100, &[16384, -16384, 0]);

        let mut loader = SampleLoader::new();
        let sample = loader.load(&path).unwrap();
        assert_eq!(44100, sample.sample_rate());
        assert_eq!(3, sample.frames());
        let data = sample.data();
        assert!((data[0] - 0.5).abs() < 1e-4);
        assert!((data[1] + 0.5).abs() < 1e-4);
        assert_eq!(0.0, data[2]);
    }

    #[test]
    fn test_stereo_is_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 48000, &[16384, 0, 16384, 16384, -16384, 16384]);

        let mut loader = SampleLoader::new();
        let data = loader.load(&path).unwrap().data();
        assert_eq!(3, data.len());
        assert!((data[0] - 0.25).abs() < 1e-4);
        assert!((data[1] - 0.5).abs() < 1e-4);
        assert!(data[2].abs() < 1e-4);
    }

    #[test]
    fn test_cache_shares_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hit.wav");
        write_wav(&path, 1, 48000, &[1000; 64]);

        let mut loader = SampleLoader::new();
        let first = loader.load(&path).unwrap();
        let second = loader.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first.data(), &second.data()));
        assert_eq!(64 * 4, loader.total_memory_usage());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = SampleLoader::new();
        assert!(matches!(
            loader.load(&dir.path().join("nope.wav")),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn test_not_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, "definitely not a wave file").unwrap();
        let mut loader = SampleLoader::new();
        assert!(matches!(loader.load(&path), Err(LoadError::Decode { .. })));
    }
}
