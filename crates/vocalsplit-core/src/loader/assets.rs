//! Stem pair loading: fetch both, decode both, validate
//!
//! The load is all-or-nothing. Either both stems decode and a
//! [`LoadedStems`] comes back, or a single [`LoadError`] does.

use std::sync::Arc;

use thiserror::Error;

use crate::config::LoaderConfig;
use crate::decode::{decode_stem, DecodeError, DecodedStem};
use crate::fetch::{AssetFetcher, FetchError};
use crate::source::StemSource;
use crate::types::StemRole;

/// The one message shown to the user for any load failure
pub const LOAD_FAILED_MESSAGE: &str = "failed to load audio files";

/// Errors that fail a stem pair load
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to fetch {role} stem: {source}")]
    Fetch {
        role: StemRole,
        #[source]
        source: FetchError,
    },

    #[error("failed to decode {role} stem: {source}")]
    Decode {
        role: StemRole,
        #[source]
        source: DecodeError,
    },

    #[error("stem durations differ: vocals {vocals:.3}s, accompaniment {accompaniment:.3}s")]
    DurationMismatch { vocals: f64, accompaniment: f64 },
}

impl LoadError {
    /// User-facing text; the detail goes to the log
    pub fn user_message(&self) -> &'static str {
        LOAD_FAILED_MESSAGE
    }

    /// Stem the failure is attributed to, if any
    pub fn role(&self) -> Option<StemRole> {
        match self {
            LoadError::Fetch { role, .. } | LoadError::Decode { role, .. } => Some(*role),
            LoadError::DurationMismatch { .. } => None,
        }
    }
}

/// Both stems of a successful load
#[derive(Debug, Clone)]
pub struct LoadedStems {
    pub vocals: Arc<DecodedStem>,
    pub accompaniment: Arc<DecodedStem>,
}

impl LoadedStems {
    pub fn new(vocals: DecodedStem, accompaniment: DecodedStem) -> Self {
        Self {
            vocals: Arc::new(vocals),
            accompaniment: Arc::new(accompaniment),
        }
    }

    pub fn get(&self, role: StemRole) -> &Arc<DecodedStem> {
        match role {
            StemRole::Vocals => &self.vocals,
            StemRole::Accompaniment => &self.accompaniment,
        }
    }

    /// Session duration: the shorter of the two stems
    pub fn duration_seconds(&self) -> f64 {
        self.vocals
            .duration_seconds()
            .min(self.accompaniment.duration_seconds())
    }

    /// Absolute difference between the two stem durations
    pub fn duration_mismatch(&self) -> f64 {
        (self.vocals.duration_seconds() - self.accompaniment.duration_seconds()).abs()
    }
}

/// Fetches and decodes stem pairs
pub struct AssetLoader {
    fetcher: Arc<dyn AssetFetcher>,
    config: LoaderConfig,
}

impl AssetLoader {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, config: LoaderConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn fetcher(&self) -> &Arc<dyn AssetFetcher> {
        &self.fetcher
    }

    /// Load both stems
    ///
    /// The two fetches run concurrently and are joined before anything is
    /// decoded; the two decodes are joined the same way. When both stems fail,
    /// the vocal error is the one reported.
    pub fn load(
        &self,
        vocals: &StemSource,
        accompaniment: &StemSource,
    ) -> Result<LoadedStems, LoadError> {
        log::info!(
            "loader: fetching stems\n  vocals: {}\n  accompaniment: {}",
            vocals.locator,
            accompaniment.locator
        );

        let (vocal_bytes, accompaniment_bytes) =
            rayon::join(|| self.fetch(vocals), || self.fetch(accompaniment));
        let vocal_bytes = vocal_bytes?;
        let accompaniment_bytes = accompaniment_bytes?;

        let (vocal_stem, accompaniment_stem) = rayon::join(
            || decode(vocals, vocal_bytes),
            || decode(accompaniment, accompaniment_bytes),
        );
        let stems = LoadedStems::new(vocal_stem?, accompaniment_stem?);

        self.validate_durations(&stems)?;

        log::info!(
            "loader: stems ready, duration {:.2}s",
            stems.duration_seconds()
        );
        Ok(stems)
    }

    fn fetch(&self, source: &StemSource) -> Result<Vec<u8>, LoadError> {
        self.fetcher
            .fetch(&source.locator)
            .map_err(|source_err| LoadError::Fetch {
                role: source.role,
                source: source_err,
            })
    }

    fn validate_durations(&self, stems: &LoadedStems) -> Result<(), LoadError> {
        let mismatch = stems.duration_mismatch();
        if mismatch <= self.config.duration_tolerance_seconds() {
            return Ok(());
        }

        let vocals = stems.vocals.duration_seconds();
        let accompaniment = stems.accompaniment.duration_seconds();

        if self.config.strict_duration_check {
            return Err(LoadError::DurationMismatch {
                vocals,
                accompaniment,
            });
        }

        log::warn!(
            "loader: stem durations differ by {:.0}ms \
             (vocals {:.3}s, accompaniment {:.3}s), using the shorter",
            mismatch * 1000.0,
            vocals,
            accompaniment
        );
        Ok(())
    }
}

fn decode(source: &StemSource, bytes: Vec<u8>) -> Result<DecodedStem, LoadError> {
    let extension = source.extension();
    decode_stem(source.role, bytes, extension.as_deref()).map_err(|e| LoadError::Decode {
        role: source.role,
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use std::io::Cursor;

    fn wav(seconds: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * sample_rate as f64).round() as usize;
            for i in 0..frames {
                writer.write_sample(((i % 64) as i16 - 32) * 256).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn loader_with(
        vocals: Vec<u8>,
        accompaniment: Vec<u8>,
        config: LoaderConfig,
    ) -> (AssetLoader, StemSource, StemSource) {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("mem://v.wav", vocals);
        fetcher.insert("mem://a.wav", accompaniment);
        (
            AssetLoader::new(fetcher, config),
            StemSource::new(StemRole::Vocals, "mem://v.wav"),
            StemSource::new(StemRole::Accompaniment, "mem://a.wav"),
        )
    }

    #[test]
    fn test_shorter_duration_wins_when_lenient() {
        let (loader, v, a) = loader_with(wav(1.0, 8000), wav(1.5, 8000), LoaderConfig::default());
        let stems = loader.load(&v, &a).unwrap();
        assert!((stems.duration_seconds() - 1.0).abs() < 1e-9);
        assert!((stems.duration_mismatch() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_strict_duration_check_fails_load() {
        let config = LoaderConfig {
            strict_duration_check: true,
            ..LoaderConfig::default()
        };
        let (loader, v, a) = loader_with(wav(1.0, 8000), wav(1.5, 8000), config);
        let err = loader.load(&v, &a).unwrap_err();
        assert!(matches!(err, LoadError::DurationMismatch { .. }));
        assert_eq!(err.user_message(), LOAD_FAILED_MESSAGE);
    }

    #[test]
    fn test_within_tolerance_passes_strict_check() {
        let config = LoaderConfig {
            strict_duration_check: true,
            ..LoaderConfig::default()
        };
        let (loader, v, a) = loader_with(wav(1.0, 8000), wav(1.02, 8000), config);
        assert!(loader.load(&v, &a).is_ok());
    }

    #[test]
    fn test_undecodable_accompaniment_is_decode_error() {
        let (loader, v, a) = loader_with(
            wav(0.5, 8000),
            b"<html>not found</html>".to_vec(),
            LoaderConfig::default(),
        );
        let err = loader.load(&v, &a).unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(err.role(), Some(StemRole::Accompaniment));
        assert_eq!(err.user_message(), "failed to load audio files");
    }

    #[test]
    fn test_vocal_error_reported_when_both_fail() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let loader = AssetLoader::new(fetcher, LoaderConfig::default());
        let err = loader
            .load(
                &StemSource::new(StemRole::Vocals, "mem://gone-v"),
                &StemSource::new(StemRole::Accompaniment, "mem://gone-a"),
            )
            .unwrap_err();
        assert_eq!(err.role(), Some(StemRole::Vocals));
    }
}
