//! Background stem loading
//!
//! One request is serviced at a time. Every request carries a generation
//! number; a result whose generation is older than the latest request is a
//! superseded load and is dropped by [`BackgroundLoader::try_recv`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use super::assets::{AssetLoader, LoadError, LoadedStems};
use crate::source::StemPair;

struct LoadRequest {
    generation: u64,
    pair: StemPair,
}

/// Outcome of one background load
pub struct LoadResult {
    pub generation: u64,
    pub pair: StemPair,
    pub result: Result<LoadedStems, LoadError>,
}

/// Runs [`AssetLoader::load`] off the control thread
pub struct BackgroundLoader {
    request_tx: Option<Sender<LoadRequest>>,
    result_rx: Receiver<LoadResult>,
    latest: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundLoader {
    /// Spawn the loader thread
    pub fn spawn(loader: AssetLoader) -> std::io::Result<Self> {
        let (request_tx, request_rx) = channel::unbounded::<LoadRequest>();
        let (result_tx, result_rx) = channel::unbounded::<LoadResult>();
        let latest = Arc::new(AtomicU64::new(0));
        let latest_clone = latest.clone();

        let handle = thread::Builder::new()
            .name("stem-loader".to_string())
            .spawn(move || loader_thread(loader, request_rx, result_tx, latest_clone))?;

        log::info!("BackgroundLoader spawned");

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            latest,
            handle: Some(handle),
        })
    }

    /// Queue a pair for loading, superseding any request still in flight
    ///
    /// Returns the generation the result will carry.
    pub fn request(&self, pair: StemPair) -> u64 {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = &self.request_tx {
            if let Err(e) = tx.send(LoadRequest { generation, pair }) {
                log::error!("Failed to queue stem load: {}", e);
            }
        }
        generation
    }

    /// Generation of the most recent request (0 before the first)
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Receiver for select loops; results may be stale, check the generation
    pub fn receiver(&self) -> &Receiver<LoadResult> {
        &self.result_rx
    }

    /// Try to receive the current load's result (non-blocking)
    pub fn try_recv(&self) -> Option<LoadResult> {
        while let Ok(result) = self.result_rx.try_recv() {
            if self.is_current(&result) {
                return Some(result);
            }
            log::debug!("Dropping superseded load result #{}", result.generation);
        }
        None
    }

    /// Whether `result` answers the most recent request
    pub fn is_current(&self, result: &LoadResult) -> bool {
        result.generation == self.latest_generation()
    }
}

impl Drop for BackgroundLoader {
    fn drop(&mut self) {
        // Closing the request channel ends the thread after its current load
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn loader_thread(
    loader: AssetLoader,
    rx: Receiver<LoadRequest>,
    tx: Sender<LoadResult>,
    latest: Arc<AtomicU64>,
) {
    log::info!("Stem loader thread started");

    while let Ok(request) = rx.recv() {
        if request.generation < latest.load(Ordering::SeqCst) {
            log::debug!("Skipping superseded load #{}", request.generation);
            continue;
        }

        let result = loader.load(&request.pair.vocals, &request.pair.accompaniment);
        if let Err(e) = &result {
            log::error!("Stem load #{} failed: {}", request.generation, e);
        }

        let outcome = LoadResult {
            generation: request.generation,
            pair: request.pair,
            result,
        };
        if tx.send(outcome).is_err() {
            break;
        }
    }

    log::info!("Stem loader thread stopped");
}
