//! Background music: decode via ffmpeg, loop or trim to the video length,
//! apply volume, and stage as a raw f32le side input for the encoder.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ReelError, ReelResult};

pub const MUSIC_SAMPLE_RATE: u32 = 48_000;
pub const MUSIC_CHANNELS: u16 = 2;

/// Interleaved f32 PCM.
#[derive(Clone, Debug)]
pub struct AudioPcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    pub fn frames(&self) -> usize {
        self.interleaved_f32.len() / self.channels as usize
    }
}

/// A staged raw-PCM file ready to feed ffmpeg as a second input.
#[derive(Clone, Debug)]
pub struct AudioInput {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode any ffmpeg-readable audio file to interleaved stereo f32 at
/// `sample_rate`. A file without an audio stream decodes to empty PCM.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> ReelResult<AudioPcm> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| ReelError::encode(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // ffmpeg reports a missing audio stream as an error; treat it as
        // empty PCM.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
        {
            return Ok(AudioPcm {
                sample_rate,
                channels: 2,
                interleaved_f32: Vec::new(),
            });
        }
        return Err(ReelError::encode(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(ReelError::encode(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }

    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32: pcm,
    })
}

/// Repeat or cut `pcm` so it covers exactly `target_frames` sample frames.
/// Empty input stays empty (the caller falls back to a silent video).
pub fn loop_or_trim(pcm: &AudioPcm, target_frames: usize) -> AudioPcm {
    let channels = pcm.channels as usize;
    let target_len = target_frames * channels;
    let mut interleaved = Vec::with_capacity(target_len);

    if !pcm.interleaved_f32.is_empty() {
        while interleaved.len() < target_len {
            let need = target_len - interleaved.len();
            let take = need.min(pcm.interleaved_f32.len());
            interleaved.extend_from_slice(&pcm.interleaved_f32[..take]);
        }
    }

    AudioPcm {
        sample_rate: pcm.sample_rate,
        channels: pcm.channels,
        interleaved_f32: interleaved,
    }
}

pub fn apply_volume(pcm: &mut AudioPcm, volume: f32) {
    let volume = volume.clamp(0.0, 1.0);
    if volume == 1.0 {
        return;
    }
    for s in &mut pcm.interleaved_f32 {
        *s *= volume;
    }
}

/// Write interleaved f32 PCM to a raw little-endian file.
pub fn write_f32le(pcm: &AudioPcm, out_path: &Path) -> ReelResult<()> {
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            ReelError::encode(format!(
                "failed to create audio scratch directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(pcm.interleaved_f32.len() * 4);
    for &sample in &pcm.interleaved_f32 {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        ReelError::encode(format!(
            "failed to write audio scratch file '{}': {e}",
            out_path.display()
        ))
    })
}

/// Decode the configured music track, fit it to `total_seconds`, apply the
/// volume, and stage it at `scratch_path`.
///
/// Returns `None` when there is no usable audio (missing file or no audio
/// stream); the video is then encoded silent.
pub fn prepare_music(
    path: &Path,
    total_seconds: f64,
    volume: f32,
    scratch_path: &Path,
) -> ReelResult<Option<AudioInput>> {
    if !path.is_file() {
        warn!(path = %path.display(), "music file not found; encoding silent video");
        return Ok(None);
    }

    let pcm = decode_audio_f32_stereo(path, MUSIC_SAMPLE_RATE)?;
    if pcm.interleaved_f32.is_empty() {
        warn!(path = %path.display(), "music file has no audio stream; encoding silent video");
        return Ok(None);
    }

    let target_frames = (total_seconds * f64::from(MUSIC_SAMPLE_RATE)).round() as usize;
    let mut fitted = loop_or_trim(&pcm, target_frames);
    apply_volume(&mut fitted, volume);
    write_f32le(&fitted, scratch_path)?;

    info!(
        path = %path.display(),
        seconds = total_seconds,
        looped = fitted.frames() > pcm.frames(),
        "music staged"
    );
    Ok(Some(AudioInput {
        path: scratch_path.to_path_buf(),
        sample_rate: MUSIC_SAMPLE_RATE,
        channels: MUSIC_CHANNELS,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: Vec<f32>) -> AudioPcm {
        AudioPcm {
            sample_rate: 48_000,
            channels: 2,
            interleaved_f32: samples,
        }
    }

    #[test]
    fn trim_cuts_long_audio() {
        let src = pcm(vec![0.1; 100]);
        let out = loop_or_trim(&src, 10);
        assert_eq!(out.interleaved_f32.len(), 20);
        assert_eq!(out.frames(), 10);
    }

    #[test]
    fn loop_repeats_short_audio() {
        let src = pcm(vec![0.5, -0.5, 0.25, -0.25]);
        let out = loop_or_trim(&src, 5);
        assert_eq!(out.interleaved_f32.len(), 10);
        assert_eq!(out.interleaved_f32[0], 0.5);
        assert_eq!(out.interleaved_f32[4], 0.5);
        assert_eq!(out.interleaved_f32[9], -0.5);
    }

    #[test]
    fn loop_of_empty_audio_stays_empty() {
        let out = loop_or_trim(&pcm(Vec::new()), 100);
        assert!(out.interleaved_f32.is_empty());
    }

    #[test]
    fn volume_scales_samples() {
        let mut p = pcm(vec![1.0, -1.0]);
        apply_volume(&mut p, 0.9);
        assert!((p.interleaved_f32[0] - 0.9).abs() < 1e-6);
        assert!((p.interleaved_f32[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn write_f32le_bytes_are_little_endian() {
        let dir = std::env::temp_dir().join("reelkit-audio-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pcm.f32le");
        write_f32le(&pcm(vec![1.0f32]), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, 1.0f32.to_le_bytes());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_music_is_soft_none() {
        let out = prepare_music(
            Path::new("/no/such/music.mp3"),
            5.0,
            0.9,
            Path::new("/tmp/reelkit-unused.f32le"),
        )
        .unwrap();
        assert!(out.is_none());
    }
}
