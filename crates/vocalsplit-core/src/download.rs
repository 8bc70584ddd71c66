//! Per-stem download
//!
//! Re-fetches one stem through the same [`AssetFetcher`] the loader uses and
//! saves it as `<original base name>_<vocals|instrumental>.<ext>`. Failures
//! are scoped to the download and never touch playback.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::fetch::{AssetFetcher, FetchError};
use crate::source::StemSource;
use crate::types::StemRole;

/// Extension used when the locator path has none
pub const FALLBACK_EXTENSION: &str = "wav";

const FALLBACK_BASE_NAME: &str = "track";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("failed to fetch {role} stem: {source}")]
    Fetch {
        role: StemRole,
        #[source]
        source: FetchError,
    },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `song.mp3` + vocals stem at `.../vocals.wav` gives `song_vocals.wav`
pub fn download_file_name(original_name: &str, source: &StemSource) -> String {
    let file = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let base = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let base = if base.is_empty() { FALLBACK_BASE_NAME } else { base };
    let extension = source
        .extension()
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    format!("{}_{}.{}", base, source.role.file_suffix(), extension)
}

/// Fetch `source` and save it under `dest_dir`
///
/// The bytes land in a `.part` file first and are renamed into place, so an
/// interrupted download never leaves a truncated file under the final name.
pub fn download_stem(
    fetcher: &dyn AssetFetcher,
    source: &StemSource,
    original_name: &str,
    dest_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let bytes = fetcher
        .fetch(&source.locator)
        .map_err(|source_err| DownloadError::Fetch {
            role: source.role,
            source: source_err,
        })?;

    fs::create_dir_all(dest_dir).map_err(|e| DownloadError::Io {
        path: dest_dir.to_path_buf(),
        source: e,
    })?;

    let target = dest_dir.join(download_file_name(original_name, source));
    let temp = target.with_extension("part");
    log::info!("Downloading {} stem to {:?}", source.role, target);

    write_file(&temp, &bytes).map_err(|e| {
        fs::remove_file(&temp).ok();
        DownloadError::Io {
            path: temp.clone(),
            source: e,
        }
    })?;
    fs::rename(&temp, &target).map_err(|e| DownloadError::Io {
        path: target.clone(),
        source: e,
    })?;

    log::info!(
        "Saved {:?} ({} bytes)",
        target.file_name().unwrap_or_default(),
        bytes.len()
    );
    Ok(target)
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    #[test]
    fn test_file_name_from_original_and_locator() {
        let vocals = StemSource::new(StemRole::Vocals, "http://host/out/song/vocals.MP3");
        let accompaniment = StemSource::new(StemRole::Accompaniment, "out/song/accompaniment.wav");
        assert_eq!(download_file_name("song.flac", &vocals), "song_vocals.mp3");
        assert_eq!(
            download_file_name("my.live.set.wav", &accompaniment),
            "my.live.set_instrumental.wav"
        );
    }

    #[test]
    fn test_file_name_fallbacks() {
        let bare = StemSource::new(StemRole::Vocals, "http://host/stems/vocals");
        assert_eq!(download_file_name("song.mp3", &bare), "song_vocals.wav");
        assert_eq!(download_file_name("", &bare), "track_vocals.wav");
        assert_eq!(download_file_name("C:\\music\\demo.mp3", &bare), "demo_vocals.wav");
        assert_eq!(download_file_name(".hidden", &bare), ".hidden_vocals.wav");
    }

    #[test]
    fn test_download_writes_stem() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::new();
        fetcher.insert("mem://vocals.wav", b"RIFFdata".to_vec());
        let source = StemSource::new(StemRole::Vocals, "mem://vocals.wav");

        let dest = dir.path().join("nested");
        let path = download_stem(&fetcher, &source, "song.mp3", &dest).unwrap();
        assert_eq!(path, dest.join("song_vocals.wav"));
        assert_eq!(fs::read(&path).unwrap(), b"RIFFdata");
        assert!(!dest.join("song_vocals.part").exists());
    }

    #[test]
    fn test_download_fetch_error_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::new();
        let source = StemSource::new(StemRole::Accompaniment, "mem://gone.wav");

        let err = download_stem(&fetcher, &source, "song.mp3", dir.path()).unwrap_err();
        match err {
            DownloadError::Fetch { role, source } => {
                assert_eq!(role, StemRole::Accompaniment);
                assert!(matches!(source, FetchError::Status { status: 404, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
