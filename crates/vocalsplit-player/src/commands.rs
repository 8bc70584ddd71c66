//! Interactive commands read from stdin

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;

use anyhow::{anyhow, bail, Error, Result};
use crossbeam::channel::{self, Receiver};
use vocalsplit_core::transport::parse_time;
use vocalsplit_core::StemRole;

pub const HELP: &str = "\
Commands:
  play | pause | toggle
  seek <seconds|mm:ss>
  mute <vocals|accompaniment>
  unmute <vocals|accompaniment>
  download <vocals|accompaniment> [dir]
  status | reload | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Toggle,
    Seek(f64),
    Mute(StemRole),
    Unmute(StemRole),
    Download(StemRole, Option<PathBuf>),
    Status,
    Reload,
    Help,
    Quit,
}

fn role_arg(arg: Option<&str>) -> Result<StemRole> {
    let arg = arg.ok_or_else(|| anyhow!("expected vocals or accompaniment"))?;
    StemRole::parse(arg).ok_or_else(|| anyhow!("unknown stem '{}'", arg))
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("empty command");
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "play" => Command::Play,
            "pause" => Command::Pause,
            "toggle" | "p" => Command::Toggle,
            "seek" => {
                let arg = words.next().ok_or_else(|| anyhow!("seek needs a time"))?;
                let seconds = parse_time(arg).ok_or_else(|| anyhow!("invalid time '{}'", arg))?;
                Command::Seek(seconds)
            }
            "mute" => Command::Mute(role_arg(words.next())?),
            "unmute" => Command::Unmute(role_arg(words.next())?),
            "download" => {
                let role = role_arg(words.next())?;
                Command::Download(role, words.next().map(PathBuf::from))
            }
            "status" | "s" => Command::Status,
            "reload" => Command::Reload,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command '{}'", other),
        };
        Ok(command)
    }
}

/// Read commands on a named thread
///
/// The channel disconnects when stdin closes or after `quit`.
pub fn spawn_stdin_reader() -> io::Result<Receiver<Command>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        let quit = command == Command::Quit;
                        if tx.send(command).is_err() || quit {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{} (type 'help')", e),
                }
            }
            log::debug!("stdin reader finished");
        })?;
    Ok(rx)
}
