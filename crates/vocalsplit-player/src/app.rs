//! The player session: engine, loader, transport clock and waveforms
//!
//! Everything here runs on the main thread. Load results, download
//! outcomes, stdin commands and display frames are multiplexed with
//! `crossbeam::select!`; the frame timer only exists while the engine is
//! playing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver};
use vocalsplit_core::config::VocalSplitConfig;
use vocalsplit_core::engine::{EngineState, OutputFactory, PlaybackEngine};
use vocalsplit_core::fetch::AssetFetcher;
use vocalsplit_core::loader::{AssetLoader, BackgroundLoader, LoadResult};
use vocalsplit_core::source::StemPair;
use vocalsplit_core::transport::{TimeReadout, TransportClock};
use vocalsplit_core::waveform::StemWaveforms;
use vocalsplit_core::StemRole;

use crate::commands::{Command, HELP};
use crate::downloads::{DownloadOutcome, DownloadWorker};

pub struct Player {
    pair: StemPair,
    engine: PlaybackEngine,
    clock: TransportClock,
    loader: BackgroundLoader,
    downloads: DownloadWorker,
    waveforms: StemWaveforms,
    waveform_dir: Option<PathBuf>,
    download_dir: PathBuf,
}

impl Player {
    pub fn new(
        config: &VocalSplitConfig,
        pair: StemPair,
        fetcher: Arc<dyn AssetFetcher>,
        output: Box<dyn OutputFactory>,
        waveform_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = &waveform_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create waveform directory: {:?}", dir))?;
        }

        let assets = AssetLoader::new(fetcher.clone(), config.loader.clone());
        let loader = BackgroundLoader::spawn(assets).context("Failed to spawn stem loader")?;
        let downloads = DownloadWorker::spawn(fetcher).context("Failed to spawn download worker")?;

        Ok(Self {
            pair,
            engine: PlaybackEngine::new(output),
            clock: TransportClock::new(config.transport.frame_rate),
            loader,
            downloads,
            waveforms: StemWaveforms::from_config(&config.waveform),
            waveform_dir,
            download_dir: config.download.directory.clone(),
        })
    }

    /// Start (or restart) loading the current pair
    pub fn reload(&mut self) {
        self.engine.begin_load();
        self.clock.cancel();
        let generation = self.loader.request(self.pair.clone());
        println!("Loading stems for {} (#{})", self.pair.original_name, generation);
    }

    /// Run until `quit` or stdin closes
    pub fn run(mut self, commands: Receiver<Command>) -> Result<()> {
        let results = self.loader.receiver().clone();
        let downloaded = self.downloads.receiver().clone();
        self.reload();

        loop {
            let frame = match self.clock.timeout(Instant::now()) {
                Some(timeout) => channel::after(timeout),
                None => channel::never(),
            };

            crossbeam::select! {
                recv(results) -> msg => {
                    let result = msg.context("stem loader stopped")?;
                    self.on_loaded(result);
                }
                recv(downloaded) -> msg => {
                    let outcome = msg.context("download worker stopped")?;
                    self.on_downloaded(outcome);
                }
                recv(commands) -> msg => match msg {
                    Ok(Command::Quit) | Err(_) => break,
                    Ok(command) => self.handle(command),
                },
                recv(frame) -> _ => {}
            }

            self.on_frame();
        }

        self.engine.teardown();
        println!("Stopped.");
        Ok(())
    }

    fn on_loaded(&mut self, result: LoadResult) {
        if !self.loader.is_current(&result) {
            log::debug!("Ignoring superseded load #{}", result.generation);
            return;
        }

        match self.engine.complete_load(result.result) {
            Ok(()) => {
                if let Some(stems) = self.engine.stems() {
                    self.waveforms.draw(stems, self.engine.session().muted());
                }
                self.save_waveforms();
                println!("Ready: {}", TimeReadout::from(self.engine.session()));
            }
            Err(e) => {
                self.waveforms.clear();
                self.save_waveforms();
                println!("Error: {}", e.user_message());
            }
        }
    }

    fn handle(&mut self, command: Command) {
        let accepted = match command {
            Command::Play => self.engine.play(),
            Command::Pause => self.engine.pause(),
            Command::Toggle => self.engine.toggle_play(),
            Command::Seek(seconds) => self.engine.seek(seconds),
            Command::Mute(role) => self.set_muted(role, true),
            Command::Unmute(role) => self.set_muted(role, false),
            Command::Download(role, dir) => {
                self.download(role, dir.as_deref());
                true
            }
            Command::Status => {
                self.print_status();
                true
            }
            Command::Reload => {
                self.reload();
                true
            }
            Command::Help => {
                println!("{}", HELP);
                true
            }
            Command::Quit => true,
        };

        if !accepted {
            println!("Not available while {}", self.engine.state());
        }
        self.clock.sync(&self.engine, Instant::now());
    }

    fn on_frame(&mut self) {
        let was_playing = self.engine.is_playing();
        if self.clock.on_frame(&mut self.engine, Instant::now()).is_some()
            && was_playing
            && self.engine.state() == EngineState::Ended
        {
            println!("Ended: {}", TimeReadout::from(self.engine.session()));
        }
    }

    fn set_muted(&mut self, role: StemRole, muted: bool) -> bool {
        if !self.engine.set_muted(role, muted) {
            return false;
        }
        if let Some(stems) = self.engine.stems() {
            self.waveforms.redraw(role, stems, muted);
        }
        self.save_waveforms();
        true
    }

    fn download(&self, role: StemRole, dir: Option<&Path>) {
        let dir = dir.unwrap_or(&self.download_dir).to_path_buf();
        println!("Downloading {} to {}", role, dir.display());
        self.downloads
            .request(self.pair.get(role).clone(), &self.pair.original_name, dir);
    }

    fn on_downloaded(&self, outcome: DownloadOutcome) {
        match outcome.result {
            Ok(path) => println!("Saved {}", path.display()),
            Err(e) => println!("Download of {} failed: {}", outcome.source.role, e),
        }
    }

    fn save_waveforms(&self) {
        let Some(dir) = &self.waveform_dir else {
            return;
        };
        let base = Path::new(&self.pair.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("track");
        if let Err(e) = self.waveforms.save_png(dir, base) {
            log::warn!("Could not write waveforms to {:?}: {}", dir, e);
        }
    }

    fn print_status(&self) {
        let session = self.engine.session();
        let muted: Vec<&str> = StemRole::ALL
            .iter()
            .filter(|role| session.is_muted(**role))
            .map(|role| role.name())
            .collect();
        println!(
            "{} {}{}",
            self.engine.state(),
            TimeReadout::new(self.engine.current_position(), session.duration_seconds),
            if muted.is_empty() {
                String::new()
            } else {
                format!(" (muted: {})", muted.join(", "))
            }
        );
        if let Some(message) = self.engine.last_error() {
            println!("Last error: {}", message);
        }
    }
}
