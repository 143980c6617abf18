//! Local WAV sample playback using hound and cpal
//!
//! Alert sounds are short files played at a fixed gain. Each playback opens
//! its own output stream on a short-lived thread, since cpal streams cannot
//! move between threads on every platform.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// A decoded sample, downmixed to mono
#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    frames: Vec<f32>,
    sample_rate: u32,
}

impl SampleData {
    /// Decode a WAV file (integer or float PCM)
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open WAV file: {:?}", path))?;
        let spec = reader.spec();

        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .context("failed to decode samples")?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .context("failed to decode samples")?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let frames = raw
            .chunks(channels)
            .map(|c| c.iter().sum::<f32>() / c.len() as f32)
            .collect();

        Ok(Self {
            frames,
            sample_rate: spec.sample_rate,
        })
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames.len() as f64 / self.sample_rate as f64)
    }

    /// Linearly interpolated frame at a fractional position, `None` past the end
    pub fn frame_at(&self, position: f64) -> Option<f32> {
        if position < 0.0 {
            return None;
        }
        let index = position.floor() as usize;
        let current = *self.frames.get(index)?;
        let next = self.frames.get(index + 1).copied().unwrap_or(current);
        let frac = (position - index as f64) as f32;
        Some(current + (next - current) * frac)
    }
}

/// Plays WAV files on the default output device, caching decoded files
#[derive(Debug, Default)]
pub struct Sampler {
    cache: Mutex<HashMap<PathBuf, Arc<SampleData>>>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `path` once; later calls reuse the cached data
    pub fn preload(&self, path: &Path) -> Result<Arc<SampleData>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(data) = cache.get(path) {
            return Ok(Arc::clone(data));
        }
        let data = Arc::new(SampleData::load(path)?);
        debug!("Loaded {:?} ({:.2}s)", path, data.duration().as_secs_f64());
        cache.insert(path.to_path_buf(), Arc::clone(&data));
        Ok(data)
    }

    /// Start playback and return immediately
    pub fn play(&self, path: &Path, gain: f64) -> Result<()> {
        let data = self.preload(path)?;
        let gain = gain as f32;
        let name = path.display().to_string();

        thread::Builder::new()
            .name("sampler".to_string())
            .spawn(move || {
                if let Err(e) = play_blocking(data, gain) {
                    warn!("Sample {} failed to play: {}", name, e);
                }
            })?;
        Ok(())
    }
}

fn play_blocking(data: Arc<SampleData>, gain: f32) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;

    let config = device.default_output_config()?;
    let sample_format = config.sample_format();
    let stream_config: StreamConfig = config.into();
    let length = data.duration();

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, data, gain)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, data, gain)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, data, gain)?,
        _ => bail!("Unsupported sample format"),
    };

    stream.play()?;
    thread::sleep(length + Duration::from_millis(100));
    Ok(())
}

fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    data: Arc<SampleData>,
    gain: f32,
) -> Result<Stream> {
    let channels = config.channels as usize;
    let step = data.sample_rate() as f64 / config.sample_rate.0 as f64;
    let mut position = 0.0f64;

    let stream = device.build_output_stream(
        config,
        move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in out.chunks_mut(channels) {
                let sample = data
                    .frame_at(position)
                    .map(|s| (s * gain).clamp(-1.0, 1.0))
                    .unwrap_or(0.0);
                position += step;

                for channel_sample in frame.iter_mut() {
                    *channel_sample = T::from_sample(sample);
                }
            }
        },
        |err| {
            warn!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::NamedTempFile;

    fn write_stereo_i16(frames: &[(i16, i16)], sample_rate: u32) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for &(l, r) in frames {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();
        file
    }

    #[test]
    fn test_load_downmixes_and_normalizes() {
        let file = write_stereo_i16(&[(16384, 16384), (16384, -16384), (0, 0)], 8000);
        let data = SampleData::load(file.path()).unwrap();

        assert_eq!(data.sample_rate(), 8000);
        assert_eq!(data.frames().len(), 3);
        assert!((data.frames()[0] - 0.5).abs() < 1e-6);
        assert_eq!(data.frames()[1], 0.0);
    }

    #[test]
    fn test_load_float_wav() {
        let file = NamedTempFile::new().unwrap();
        let spec = WavSpec {
            channels: 1,
            sample_rate: 4,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for s in [0.25f32, -0.25, 1.0, 0.0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let data = SampleData::load(file.path()).unwrap();
        assert_eq!(data.frames(), &[0.25, -0.25, 1.0, 0.0]);
        assert_eq!(data.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_frame_interpolation() {
        let data = SampleData {
            frames: vec![0.0, 1.0],
            sample_rate: 2,
        };
        assert_eq!(data.frame_at(0.0), Some(0.0));
        assert_eq!(data.frame_at(0.5), Some(0.5));
        assert_eq!(data.frame_at(1.0), Some(1.0));
        assert_eq!(data.frame_at(2.0), None);
        assert_eq!(data.frame_at(-1.0), None);
    }

    #[test]
    fn test_preload_caches() {
        let file = write_stereo_i16(&[(0, 0)], 44100);
        let sampler = Sampler::new();
        let a = sampler.preload(file.path()).unwrap();
        let b = sampler.preload(file.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let sampler = Sampler::new();
        assert!(sampler.play(Path::new("/nonexistent/alarm.wav"), 1.0).is_err());
    }
}
