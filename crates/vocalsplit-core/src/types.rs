//! Common types for VocalSplit
//!
//! Stem identifiers and the stereo frame/buffer types the mixer renders into.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of stems in a separated pair (Vocals, Accompaniment)
pub const NUM_STEMS: usize = 2;

/// Audio sample type (32-bit float throughout)
pub type Sample = f32;

/// Stem identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum StemRole {
    Vocals = 0,
    Accompaniment = 1,
}

impl StemRole {
    /// Get all stems in mixer order
    pub const ALL: [StemRole; NUM_STEMS] = [StemRole::Vocals, StemRole::Accompaniment];

    /// Parse a user-supplied stem name
    ///
    /// Accepts the names the separation service and the download file names use.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "vocals" | "vocal" | "v" => Some(StemRole::Vocals),
            "accompaniment" | "instrumental" | "inst" | "a" => Some(StemRole::Accompaniment),
            _ => None,
        }
    }

    /// Index of this stem in per-stem arrays
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Get the name of this stem
    pub fn name(&self) -> &'static str {
        match self {
            StemRole::Vocals => "Vocals",
            StemRole::Accompaniment => "Accompaniment",
        }
    }

    /// Suffix used in saved file names (`song_vocals.mp3`, `song_instrumental.mp3`)
    pub fn file_suffix(&self) -> &'static str {
        match self {
            StemRole::Vocals => "vocals",
            StemRole::Accompaniment => "instrumental",
        }
    }
}

impl fmt::Display for StemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` keeps the layout `[left, right]` so a `&[StereoSample]` can be
/// viewed as interleaved `&[f32]` without copying.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Same value in both channels
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Linear interpolation towards `other` (`t` in 0..=1)
    #[inline]
    pub fn lerp(self, other: Self, t: Sample) -> Self {
        Self {
            left: self.left + (other.left - self.left) * t,
            right: self.right + (other.right - self.right) * t,
        }
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// A pre-allocated buffer of stereo samples
///
/// Used as the mixer's working buffer inside the audio callback, where the
/// length changes per block but the allocation must not.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Growing past the capacity allocates; callers size the buffer up front.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        if new_len > self.samples.len() {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy view as interleaved f32 `[L, R, L, R, ...]`
    ///
    /// Stereo devices take this directly.
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }
}
