//! Line-based control console
//!
//! Reads one command per line (from stdin in the player) and applies it to the
//! session's control handles. Everything here runs on the control thread; the
//! audio thread only ever sees the resulting atomic stores.
//!
//! ```text
//! a load ~/music/track.flac     b play        xfade 0.3
//! a gain 1.2                    b speed 0.9   status
//! a ab-start / a ab-end / a ab on           quit
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use twindeck_core::engine::{DeckController, DeckEvent, EngineControls};
use twindeck_core::DeckId;

pub const HELP: &str = "\
Deck commands (prefix with a or b):
  load PATH   play   pause   stop   restart   start   end
  gain 0..2   speed 0.25..2   seek SECONDS   loop on|off   mute
  ab-start   ab-end   ab on|off   info
Mixer:
  xfade 0..1  (0 = deck A, 1 = deck B)
Other:
  status   help   quit";

/// One operation on a deck
#[derive(Debug, Clone, PartialEq)]
pub enum DeckCommand {
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    Restart,
    GoToStart,
    GoToEnd,
    Gain(f32),
    Speed(f64),
    Seek(f64),
    Looping(bool),
    ToggleMute,
    AbStart,
    AbEnd,
    AbLoop(bool),
    Info,
}

/// One console line
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Deck(DeckId, DeckCommand),
    Crossfade(f32),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("not a number: {0}")]
    InvalidNumber(String),
    #[error("expected on or off, got: {0}")]
    InvalidSwitch(String),
}

fn number<T: FromStr>(name: &'static str, arg: Option<&str>) -> Result<T, ParseError> {
    let arg = arg.ok_or(ParseError::MissingArgument(name))?;
    arg.parse().map_err(|_| ParseError::InvalidNumber(arg.to_string()))
}

fn switch(name: &'static str, arg: Option<&str>) -> Result<bool, ParseError> {
    match arg.ok_or(ParseError::MissingArgument(name))? {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(ParseError::InvalidSwitch(other.to_string())),
    }
}

fn parse_deck_command(verb: &str, rest: &str) -> Result<DeckCommand, ParseError> {
    let arg = Some(rest).filter(|r| !r.is_empty());
    let command = match verb {
        "load" => DeckCommand::Load(PathBuf::from(arg.ok_or(ParseError::MissingArgument("load"))?)),
        "play" => DeckCommand::Play,
        "pause" => DeckCommand::Pause,
        "stop" => DeckCommand::Stop,
        "restart" => DeckCommand::Restart,
        "start" => DeckCommand::GoToStart,
        "end" => DeckCommand::GoToEnd,
        "gain" => DeckCommand::Gain(number("gain", arg)?),
        "speed" => DeckCommand::Speed(number("speed", arg)?),
        "seek" => DeckCommand::Seek(number("seek", arg)?),
        "loop" => DeckCommand::Looping(switch("loop", arg)?),
        "mute" => DeckCommand::ToggleMute,
        "ab-start" => DeckCommand::AbStart,
        "ab-end" => DeckCommand::AbEnd,
        "ab" => DeckCommand::AbLoop(switch("ab", arg)?),
        "info" => DeckCommand::Info,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Split off the first whitespace-delimited word
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

impl FromStr for ControlCommand {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (head, rest) = split_word(line);
        match head.to_ascii_lowercase().as_str() {
            "" => Err(ParseError::Empty),
            "a" | "b" => {
                let deck = if head.eq_ignore_ascii_case("a") { DeckId::A } else { DeckId::B };
                let (verb, arg) = split_word(rest);
                if verb.is_empty() {
                    return Err(ParseError::MissingArgument("deck command"));
                }
                Ok(ControlCommand::Deck(deck, parse_deck_command(verb, arg)?))
            }
            "xfade" | "crossfade" => {
                let arg = Some(rest).filter(|r| !r.is_empty());
                Ok(ControlCommand::Crossfade(number("xfade", arg)?))
            }
            "status" => Ok(ControlCommand::Status),
            "help" | "?" => Ok(ControlCommand::Help),
            "quit" | "exit" | "q" => Ok(ControlCommand::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// One-line summary of a deck
pub fn deck_status(deck: &DeckController) -> String {
    let mut line = format!(
        "{}: {:?} {:.2}/{:.2}s gain {:.2} speed {:.2}",
        deck.id(),
        deck.state(),
        deck.current_position(),
        deck.total_length(),
        deck.gain(),
        deck.speed()
    );
    if deck.is_muted() {
        line.push_str(" [muted]");
    }
    if deck.is_looping() {
        line.push_str(" [loop]");
    }
    let ab = deck.ab_loop();
    if ab.enabled {
        line.push_str(&format!(" [AB {:.2}-{:.2}s]", ab.start, ab.end));
    }
    line
}

/// Apply a deck command, returning a reply for the console
fn apply_deck(deck: &DeckController, command: DeckCommand) -> String {
    match command {
        DeckCommand::Load(path) => match deck.load(&path) {
            Ok(()) => format!("{} loaded\n{}", deck.id(), deck.metadata()),
            Err(e) => format!("{}: {}", deck.id(), e),
        },
        DeckCommand::Play => {
            deck.play();
            if !deck.is_loaded() {
                return format!("{}: nothing loaded", deck.id());
            }
            deck_status(deck)
        }
        DeckCommand::Pause => {
            deck.pause();
            deck_status(deck)
        }
        DeckCommand::Stop => {
            deck.stop();
            deck_status(deck)
        }
        DeckCommand::Restart => {
            deck.restart();
            deck_status(deck)
        }
        DeckCommand::GoToStart => {
            deck.go_to_start();
            deck_status(deck)
        }
        DeckCommand::GoToEnd => {
            deck.go_to_end();
            deck_status(deck)
        }
        DeckCommand::Gain(gain) => {
            deck.set_gain(gain);
            format!("{} gain {:.2}", deck.id(), deck.gain())
        }
        DeckCommand::Speed(speed) => {
            deck.set_speed(speed);
            format!("{} speed {:.2}", deck.id(), deck.speed())
        }
        DeckCommand::Seek(seconds) => {
            deck.set_position(seconds);
            deck_status(deck)
        }
        DeckCommand::Looping(looping) => {
            deck.set_looping(looping);
            format!("{} loop {}", deck.id(), on_off(looping))
        }
        DeckCommand::ToggleMute => {
            deck.toggle_mute();
            format!("{} mute {}", deck.id(), on_off(deck.is_muted()))
        }
        DeckCommand::AbStart => {
            deck.set_ab_loop_start();
            format!("{} AB start {:.2}s", deck.id(), deck.ab_loop().start)
        }
        DeckCommand::AbEnd => {
            deck.set_ab_loop_end();
            format!("{} AB end {:.2}s", deck.id(), deck.ab_loop().end)
        }
        DeckCommand::AbLoop(enabled) => {
            deck.enable_ab_loop(enabled);
            format!("{} AB loop {}", deck.id(), on_off(enabled))
        }
        DeckCommand::Info => {
            let metadata = deck.metadata();
            if metadata.is_empty() {
                format!("{}: nothing loaded", deck.id())
            } else {
                format!("{}\n{}", deck_status(deck), metadata)
            }
        }
    }
}

/// Apply one command. Returns None for `quit`.
pub fn apply(controls: &EngineControls, command: ControlCommand) -> Option<String> {
    let reply = match command {
        ControlCommand::Deck(id, command) => apply_deck(controls.deck(id), command),
        ControlCommand::Crossfade(x) => {
            controls.mixer.set_crossfade(x);
            format!("crossfade {:.2}", controls.mixer.crossfade())
        }
        ControlCommand::Status => format!(
            "{}\n{}\ncrossfade {:.2}",
            deck_status(&controls.deck_a),
            deck_status(&controls.deck_b),
            controls.mixer.crossfade()
        ),
        ControlCommand::Help => HELP.to_string(),
        ControlCommand::Quit => return None,
    };
    Some(reply)
}

/// Describe events the render thread reported since the last call
fn drain_events(controls: &EngineControls) -> Vec<String> {
    DeckId::ALL
        .iter()
        .flat_map(|&id| {
            controls
                .deck(id)
                .poll_events()
                .into_iter()
                .filter_map(move |event| match event {
                    DeckEvent::ReachedEnd => Some(format!("{} reached the end", id)),
                    DeckEvent::Looped => Some(format!("{} looped", id)),
                    DeckEvent::SourceChanged { .. } => None,
                })
        })
        .collect()
}

/// Run the console until `quit` or end of input
pub fn run<R: BufRead, W: Write>(input: R, mut output: W, controls: &EngineControls) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        for event in drain_events(controls) {
            writeln!(output, "* {}", event)?;
        }

        let command = match line.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(ParseError::Empty) => continue,
            Err(e) => {
                writeln!(output, "error: {} (type help)", e)?;
                continue;
            }
        };
        log::debug!("Console command: {:?}", command);

        match apply(controls, command) {
            Some(reply) => writeln!(output, "{}", reply)?,
            None => break,
        }
        output.flush()?;
    }
    Ok(())
}
