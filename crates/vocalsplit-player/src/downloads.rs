//! Stem downloads off the session loop
//!
//! A download re-fetches a whole stem, so it runs on its own thread and
//! reports back over a channel the session loop selects on. Requests are
//! served in order; playback keeps running meanwhile.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use vocalsplit_core::download::{download_stem, DownloadError};
use vocalsplit_core::fetch::AssetFetcher;
use vocalsplit_core::source::StemSource;

struct DownloadRequest {
    source: StemSource,
    original_name: String,
    dest_dir: PathBuf,
}

/// Result of one download
pub struct DownloadOutcome {
    pub source: StemSource,
    pub result: Result<PathBuf, DownloadError>,
}

pub struct DownloadWorker {
    request_tx: Option<Sender<DownloadRequest>>,
    outcome_rx: Receiver<DownloadOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl DownloadWorker {
    pub fn spawn(fetcher: Arc<dyn AssetFetcher>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = channel::unbounded::<DownloadRequest>();
        let (outcome_tx, outcome_rx) = channel::unbounded::<DownloadOutcome>();

        let handle = thread::Builder::new()
            .name("stem-download".to_string())
            .spawn(move || download_thread(fetcher, request_rx, outcome_tx))?;

        Ok(Self {
            request_tx: Some(request_tx),
            outcome_rx,
            handle: Some(handle),
        })
    }

    /// Queue `source` to be saved under `dest_dir`
    pub fn request(&self, source: StemSource, original_name: &str, dest_dir: PathBuf) {
        let request = DownloadRequest {
            source,
            original_name: original_name.to_string(),
            dest_dir,
        };
        if let Some(tx) = &self.request_tx {
            if let Err(e) = tx.send(request) {
                log::error!("Failed to queue download: {}", e);
            }
        }
    }

    pub fn receiver(&self) -> &Receiver<DownloadOutcome> {
        &self.outcome_rx
    }
}

impl Drop for DownloadWorker {
    fn drop(&mut self) {
        // The thread exits once queued downloads finish
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn download_thread(
    fetcher: Arc<dyn AssetFetcher>,
    rx: Receiver<DownloadRequest>,
    tx: Sender<DownloadOutcome>,
) {
    while let Ok(request) = rx.recv() {
        let result = download_stem(
            fetcher.as_ref(),
            &request.source,
            &request.original_name,
            &request.dest_dir,
        );
        if let Err(e) = &result {
            log::error!("Download of {} stem failed: {}", request.source.role, e);
        }
        let outcome = DownloadOutcome {
            source: request.source,
            result,
        };
        if tx.send(outcome).is_err() {
            break;
        }
    }
    log::debug!("Download thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vocalsplit_core::fetch::MemoryFetcher;
    use vocalsplit_core::StemRole;

    #[test]
    fn test_download_runs_on_worker_thread() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MemoryFetcher::new();
        fetcher.insert("mem://vocals.wav", b"RIFFdata".to_vec());
        let worker = DownloadWorker::spawn(Arc::new(fetcher)).unwrap();

        let source = StemSource::new(StemRole::Vocals, "mem://vocals.wav");
        worker.request(source.clone(), "song.mp3", dir.path().to_path_buf());
        let outcome = worker
            .receiver()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();

        assert_eq!(outcome.source, source);
        let path = outcome.result.unwrap();
        assert_eq!(path, dir.path().join("song_vocals.wav"));
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFFdata");
    }

    #[test]
    fn test_failed_download_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let worker = DownloadWorker::spawn(Arc::new(MemoryFetcher::new())).unwrap();

        let source = StemSource::new(StemRole::Accompaniment, "mem://missing.wav");
        worker.request(source, "song.mp3", dir.path().to_path_buf());
        let outcome = worker
            .receiver()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();

        assert_eq!(outcome.source.role, StemRole::Accompaniment);
        assert!(matches!(outcome.result, Err(DownloadError::Fetch { .. })));
    }
}
