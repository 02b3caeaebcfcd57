//! Decoded audio clips and fixed-length chunking

use std::io::Cursor;
use std::time::Duration;

use crate::{Error, Result};

/// A decoded mono clip
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    /// Create a clip from mono samples
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Samples in the clip
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the clip has no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playing time of the clip
    #[must_use]
    pub fn duration(&self) -> Duration {
        samples_duration(self.samples.len(), self.sample_rate)
    }

    /// Split into consecutive chunks of `chunk` playing time
    ///
    /// The last chunk holds the remainder. A chunk shorter than one sample is
    /// widened to one sample.
    #[must_use]
    pub fn into_chunks(self, chunk: Duration) -> Vec<Self> {
        let per_chunk = samples_for(chunk, self.sample_rate).max(1);
        let sample_rate = self.sample_rate;

        self.samples
            .chunks(per_chunk)
            .map(|c| Self::new(c.to_vec(), sample_rate))
            .collect()
    }
}

/// Number of samples covering `duration` at `sample_rate`
#[allow(clippy::cast_possible_truncation)]
fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_millis() * u128::from(sample_rate) / 1000) as usize
}

/// Playing time of `len` samples at `sample_rate`
pub(super) fn samples_duration(len: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(len as u64 * 1000 / u64::from(sample_rate))
}

/// Decode MP3 bytes to a mono clip
///
/// # Errors
///
/// Returns error if the MP3 stream is malformed
pub fn decode_mp3(mp3_data: &[u8]) -> Result<AudioClip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }

                // Downmix stereo by averaging each frame pair
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Tts(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(AudioClip::new(samples, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_covers_every_sample() {
        // 1.2 s at 1 kHz in 500 ms chunks -> 500, 500, 200
        let clip = AudioClip::new(vec![0.1; 1200], 1000);
        let chunks = clip.into_chunks(Duration::from_millis(500));

        let lens: Vec<usize> = chunks.iter().map(|c| c.samples().len()).collect();
        assert_eq!(lens, vec![500, 500, 200]);
        assert!(chunks.iter().all(|c| c.sample_rate() == 1000));
    }

    #[test]
    fn test_empty_clip_has_no_chunks() {
        let clip = AudioClip::new(Vec::new(), 24000);
        assert!(clip.is_empty());
        assert!(clip.into_chunks(Duration::from_millis(500)).is_empty());
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip::new(vec![0.0; 24000], 24000);
        assert_eq!(clip.duration(), Duration::from_secs(1));
        assert_eq!(samples_duration(10, 0), Duration::ZERO);
    }

    #[test]
    fn test_garbage_is_not_mp3() {
        // minimp3 skips junk until EOF; it must not panic
        let clip = decode_mp3(&[0u8; 64]);
        assert!(clip.map(|c| c.is_empty()).unwrap_or(true));
    }
}
