use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

use podplay::{
    Episode, PlaybackObserver, PlaybackState, PlayerEvent, PlayerHandle, PlayerOptions,
    PlayerService, ReqwestClient, SharedObserver, SimulatedEngine, load_feed,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static PLAYING: Emoji<'_, '_> = Emoji("▶️  ", "[>] ");
static PAUSED: Emoji<'_, '_> = Emoji("⏸️  ", "[=] ");
static READY: Emoji<'_, '_> = Emoji("⏏️  ", "[-] ");
static STOPPED: Emoji<'_, '_> = Emoji("⏹️  ", "[ ] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");

/// Resolution of the terminal progress bar
const PROGRESS_STEPS: u64 = 1000;

/// Play podcast episodes from an RSS feed, controlled from stdin
#[derive(Parser, Debug)]
#[command(name = "podplay")]
#[command(about = "Play podcast episodes from an RSS feed")]
#[command(version)]
struct Args {
    /// RSS feed URL or path to local RSS file
    feed: String,

    /// Episode to select first (1 = newest)
    #[arg(short, long, default_value = "1")]
    episode: usize,

    /// Start playing as soon as the episode is loaded
    #[arg(short, long)]
    autoplay: bool,

    /// Print player events as JSON lines instead of a progress bar
    #[arg(long)]
    json: bool,

    /// Do not check that episode audio is reachable before playing
    #[arg(long)]
    offline: bool,

    /// Seconds to jump with `ff`
    #[arg(long, env = "PODPLAY_SKIP_FORWARD", default_value = "30")]
    skip_forward: u64,

    /// Seconds to jump with `rw`
    #[arg(long, env = "PODPLAY_SKIP_BACKWARD", default_value = "15")]
    skip_backward: u64,

    /// Progress refresh interval in milliseconds
    #[arg(long, env = "PODPLAY_TICK_MS", default_value = "500")]
    tick_ms: u64,

    /// Initial volume in percent
    #[arg(long, default_value = "100")]
    volume: u8,
}

/// Observer rendering the player on a terminal progress bar
struct TerminalObserver {
    bar: ProgressBar,
}

impl TerminalObserver {
    fn new() -> Result<Self> {
        let style = ProgressStyle::default_bar()
            .template("{prefix}[{bar:40.cyan/blue}] {wide_msg}")?
            .progress_chars("█▓░");

        let bar = ProgressBar::new(PROGRESS_STEPS);
        bar.set_style(style);
        bar.set_prefix(STOPPED.to_string());
        Ok(Self { bar })
    }
}

impl PlaybackObserver for TerminalObserver {
    fn notify(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::StateChanged { state } => {
                let (prefix, label) = match &state {
                    PlaybackState::Stopped => (STOPPED, "Stopped".dimmed()),
                    PlaybackState::Ready(_) => (READY, "Ready".cyan()),
                    PlaybackState::Playing(_) => (PLAYING, "Playing".green().bold()),
                    PlaybackState::Paused(_) => (PAUSED, "Paused".yellow()),
                };
                self.bar.set_prefix(prefix.to_string());
                match state.episode() {
                    Some(episode) => self
                        .bar
                        .println(format!("{prefix}{label} {}", episode.title.bold())),
                    None => self.bar.println(format!("{prefix}{label}")),
                }
            }

            PlayerEvent::Progress { snapshot } => {
                self.bar
                    .set_position((snapshot.progress * PROGRESS_STEPS as f64) as u64);
                self.bar.set_message(format!(
                    "{} / -{}",
                    snapshot.current_text.cyan(),
                    snapshot.remaining_text.dimmed()
                ));
            }

            PlayerEvent::LoadFailed { episode, reason } => {
                self.bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode.title, 40).red(),
                    reason.red()
                ));
            }
        }
    }
}

/// Observer printing one JSON object per event on stdout
struct JsonObserver;

impl PlaybackObserver for JsonObserver {
    fn notify(&self, event: PlayerEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!("failed to encode player event: {err}"),
        }
    }
}

/// A line typed on stdin
#[derive(Debug, Clone, Copy, PartialEq)]
enum Input {
    Play,
    Pause,
    Toggle,
    Stop,
    Forward,
    Backward,
    /// Percentage of the episode, 0 to 100
    Seek(f64),
    /// 1-based episode number
    Select(usize),
    Next,
    Previous,
    /// Percentage, 0 to 100
    Volume(f32),
    Status,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();

    let number = |name: &str| -> Result<f64, String> {
        argument
            .ok_or_else(|| format!("{name} needs a number"))?
            .parse::<f64>()
            .map_err(|e| format!("{name}: {e}"))
    };

    let input = match command {
        "play" => Input::Play,
        "pause" => Input::Pause,
        "p" | "toggle" => Input::Toggle,
        "stop" => Input::Stop,
        "ff" => Input::Forward,
        "rw" => Input::Backward,
        "seek" => Input::Seek(number("seek")?),
        "select" => {
            let index = number("select")?;
            if index < 1.0 || index.fract() != 0.0 {
                return Err("select needs an episode number starting at 1".to_string());
            }
            Input::Select(index as usize)
        }
        "next" | "n" => Input::Next,
        "prev" => Input::Previous,
        "vol" => Input::Volume(number("vol")? as f32),
        "status" | "s" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(input))
}

fn print_help() {
    println!(
        "{}",
        "commands: play, pause, p (toggle), stop, ff, rw, seek <0-100>, \
         select <n>, next, prev, vol <0-100>, status, quit"
            .dimmed()
    );
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn print_episodes(episodes: &[Episode]) {
    for (index, episode) in episodes.iter().enumerate() {
        let duration = episode
            .known_duration
            .map(|d| podplay::format_time(d.as_secs_f64()))
            .unwrap_or_else(|| podplay::playback::TIME_PLACEHOLDER.to_string());
        println!(
            "  {:>3}  {}  {}",
            (index + 1).to_string().cyan(),
            duration.dimmed(),
            truncate_title(&episode.title, 60)
        );
    }
}

/// Feed one line of input into the player. Returns `false` on quit.
fn dispatch(
    input: Input,
    handle: &PlayerHandle,
    episodes: &[Episode],
    current: &mut usize,
    autoplay: bool,
) -> Result<bool> {
    match input {
        Input::Play => handle.play()?,
        Input::Pause => handle.pause()?,
        Input::Toggle => handle.toggle()?,
        Input::Stop => handle.stop()?,
        Input::Forward => handle.skip_forward()?,
        Input::Backward => handle.skip_backward()?,
        Input::Seek(percent) => handle.commit_seek(percent / 100.0)?,
        Input::Select(number) => {
            let Some(episode) = episodes.get(number - 1) else {
                println!("{FAILURE}no episode {number}, the feed has {}", episodes.len());
                return Ok(true);
            };
            *current = number - 1;
            handle.select_episode(episode.clone(), true)?;
        }
        Input::Next | Input::Previous => {
            let next = if input == Input::Next {
                (*current + 1).min(episodes.len() - 1)
            } else {
                current.saturating_sub(1)
            };
            if next != *current {
                *current = next;
                handle.select_episode(episodes[next].clone(), autoplay || handle.is_playing())?;
            }
        }
        Input::Volume(percent) => handle.set_volume(percent / 100.0)?,
        Input::Status => {
            let progress = handle.progress();
            println!(
                "{HEADPHONES}{:?} {} / -{}",
                handle.state().kind(),
                progress.current_text,
                progress.remaining_text
            );
        }
        Input::Help => print_help(),
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "podplay=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let client = Arc::new(ReqwestClient::new());
    let podcast = load_feed(client.as_ref(), &args.feed)
        .await
        .with_context(|| format!("Failed to load feed {}", args.feed))?;

    if podcast.episodes.is_empty() {
        bail!("Feed '{}' has no playable episodes", podcast.title);
    }
    let Some(first) = podcast.episodes.get(args.episode.saturating_sub(1)) else {
        bail!(
            "Episode {} does not exist, the feed has {}",
            args.episode,
            podcast.episodes.len()
        );
    };

    if !args.json {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            podcast.title.bold().magenta(),
            podcast.author.as_deref().unwrap_or_default().dimmed()
        );
        print_episodes(&podcast.episodes);
        println!();
        print_help();
    }

    let durations: HashMap<Url, Duration> = podcast
        .episodes
        .iter()
        .filter_map(|episode| {
            episode
                .known_duration
                .map(|duration| (episode.source.clone(), duration))
        })
        .collect();
    let mut engine = SimulatedEngine::new().with_durations(durations);
    if !args.offline {
        engine = engine.with_probe(client.clone());
    }

    let observer: SharedObserver = if args.json {
        Arc::new(JsonObserver)
    } else {
        Arc::new(TerminalObserver::new()?)
    };

    let options = PlayerOptions {
        tick_interval: Duration::from_millis(args.tick_ms.max(10)),
        skip_forward: Duration::from_secs(args.skip_forward),
        skip_backward: Duration::from_secs(args.skip_backward),
        initial_volume: f32::from(args.volume.min(100)) / 100.0,
        ..PlayerOptions::default()
    };
    let (handle, task) = PlayerService::start(engine, observer, options);

    let mut current = args.episode.saturating_sub(1);
    handle.select_episode(first.clone(), args.autoplay)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Ok(Some(input)) => {
                if !dispatch(input, &handle, &podcast.episodes, &mut current, args.autoplay)? {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => println!("{FAILURE}{message}"),
        }
    }

    // The task may already be gone; shutdown only has to be attempted
    let _ = handle.shutdown();
    task.await.context("Player task panicked")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_input_commands() {
        assert_eq!(parse_input("play"), Ok(Some(Input::Play)));
        assert_eq!(parse_input("  p "), Ok(Some(Input::Toggle)));
        assert_eq!(parse_input("seek 42.5"), Ok(Some(Input::Seek(42.5))));
        assert_eq!(parse_input("select 3"), Ok(Some(Input::Select(3))));
        assert_eq!(parse_input("vol 80"), Ok(Some(Input::Volume(80.0))));
        assert_eq!(parse_input("q"), Ok(Some(Input::Quit)));
        assert_eq!(parse_input(""), Ok(None));
    }

    #[test]
    fn parse_input_rejects_bad_arguments() {
        assert!(parse_input("seek").is_err());
        assert!(parse_input("seek half").is_err());
        assert!(parse_input("select 0").is_err());
        assert!(parse_input("select 1.5").is_err());
        assert!(parse_input("rewind").is_err());
    }

    #[test]
    fn truncate_title_respects_char_boundaries() {
        assert_eq!(truncate_title("short", 10), "short");
        assert_eq!(truncate_title("äöüäöüäöüäöü", 8), "äöüäö...");
    }
}
