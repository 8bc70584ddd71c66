//! Command line parsing

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

pub const USAGE: &str = "\
Usage: vocalsplit-player <vocals> <accompaniment> [options]
       vocalsplit-player --split-response <reply.json> [options]

Options:
  --name <file>              Original file name (names downloads)
  --config <path>            Config file (default: platform config dir)
  --waveforms <dir>          Write waveform PNGs to <dir>
  --split-response <file>    Read stem locators from a separation service reply
  --no-audio                 Play through a silent clock instead of a device
  --list-devices             Print output devices and exit
  -h, --help                 Show this help";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Args {
    pub vocals: Option<String>,
    pub accompaniment: Option<String>,
    pub name: Option<String>,
    pub config: Option<PathBuf>,
    pub waveforms: Option<PathBuf>,
    pub split_response: Option<PathBuf>,
    pub no_audio: bool,
    pub list_devices: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{} requires a value", flag))
            };
            match arg.as_str() {
                "--name" => parsed.name = Some(value("--name")?),
                "--config" => parsed.config = Some(value("--config")?.into()),
                "--waveforms" => parsed.waveforms = Some(value("--waveforms")?.into()),
                "--split-response" => {
                    parsed.split_response = Some(value("--split-response")?.into())
                }
                "--no-audio" => parsed.no_audio = true,
                "--list-devices" => parsed.list_devices = true,
                "-h" | "--help" => parsed.help = true,
                flag if flag.starts_with("--") => bail!("unknown option {}", flag),
                _ => positional.push(arg),
            }
        }

        if parsed.help || parsed.list_devices {
            return Ok(parsed);
        }

        match (positional.len(), parsed.split_response.is_some()) {
            (0, true) => {}
            (2, false) => {
                let mut positional = positional.into_iter();
                parsed.vocals = positional.next();
                parsed.accompaniment = positional.next();
            }
            (_, true) => bail!("--split-response replaces the stem locators"),
            _ => bail!("expected a vocals and an accompaniment locator"),
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_positional_pair_with_options() {
        let args = parse(&["v.wav", "a.wav", "--name", "song.mp3", "--no-audio"]).unwrap();
        assert_eq!(args.vocals.as_deref(), Some("v.wav"));
        assert_eq!(args.accompaniment.as_deref(), Some("a.wav"));
        assert_eq!(args.name.as_deref(), Some("song.mp3"));
        assert!(args.no_audio);
    }

    #[test]
    fn test_split_response_instead_of_locators() {
        let args = parse(&["--split-response", "reply.json"]).unwrap();
        assert_eq!(args.split_response, Some(PathBuf::from("reply.json")));
        assert!(parse(&["v.wav", "--split-response", "reply.json"]).is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["v.wav"]).is_err());
        assert!(parse(&["v.wav", "a.wav", "--bogus"]).is_err());
        assert!(parse(&["v.wav", "a.wav", "--name"]).is_err());
        assert!(parse(&["--list-devices"]).unwrap().list_devices);
    }
}
