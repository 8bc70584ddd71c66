//! VocalSplit Player - synchronized vocal/accompaniment playback in the terminal
//!
//! Loads a separated stem pair, plays both stems locked together on one
//! output, and takes transport commands on stdin.
//!
//! ## Command line
//!
//! See [`args::USAGE`]. Set `RUST_LOG=debug` for verbose output.

mod app;
mod args;
mod audio;
mod commands;
mod downloads;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use vocalsplit_core::audio::get_output_devices;
use vocalsplit_core::config::{default_config_path, load_config, VocalSplitConfig};
use vocalsplit_core::fetch::HttpFetcher;
use vocalsplit_core::source::StemPair;

use app::Player;
use args::{Args, USAGE};
use audio::PlayerOutput;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }
    if args.list_devices {
        return list_devices();
    }

    log::info!("vocalsplit-player starting up");

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config: VocalSplitConfig = load_config(&config_path);
    log::info!("Config loaded from {:?}", config_path);

    let pair = stem_pair(&args, &config)?;
    log::info!(
        "Stems: vocals={} accompaniment={}",
        pair.vocals.locator,
        pair.accompaniment.locator
    );

    let fetcher = Arc::new(HttpFetcher::new(config.loader.request_timeout()));
    let output = PlayerOutput::new(config.audio.clone(), !args.no_audio);
    let player = Player::new(
        &config,
        pair,
        fetcher,
        Box::new(output),
        args.waveforms.clone(),
    )?;

    let commands = commands::spawn_stdin_reader().context("Failed to spawn stdin reader")?;
    println!("{}", commands::HELP);
    player.run(commands)
}

/// Locators from `--split-response`, or the two positional arguments
fn stem_pair(args: &Args, config: &VocalSplitConfig) -> Result<StemPair> {
    if let Some(path) = &args.split_response {
        let reply = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read separation reply: {:?}", path))?;
        let name = args.name.clone().unwrap_or_else(|| fallback_name(path));
        return StemPair::from_split_response(&config.service.base_url, &reply, name)
            .with_context(|| format!("Invalid separation reply: {:?}", path));
    }

    let (Some(vocals), Some(accompaniment)) = (&args.vocals, &args.accompaniment) else {
        anyhow::bail!("no stem locators given");
    };
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| fallback_name(Path::new(vocals)));
    Ok(StemPair::new(vocals.as_str(), accompaniment.as_str(), name))
}

fn fallback_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("track")
        .to_string()
}

fn list_devices() -> Result<()> {
    let devices = get_output_devices().context("Could not enumerate output devices")?;
    for device in devices {
        println!("{}", device);
        println!("    id: {}", device.id.display_label());
        println!(
            "    rates: {:?}, channels: {}",
            device.sample_rates, device.max_channels
        );
    }
    Ok(())
}
