use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use footlight_core::{
    ConfigManager, ExecutionListener, FrameListener, LightingConsole, Levels, CHANNELS, MARKERS,
    SCENES,
};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Stage lighting console: 16 scenes, fades and a scripted cue list over Art-Net.
#[derive(Parser, Debug)]
#[command(name = "footlight")]
#[command(about = "Footlight lighting console")]
struct Args {
    /// Configuration file (created with defaults if missing)
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Show script, overrides the configured one
    #[arg(long)]
    show: Option<PathBuf>,

    /// Scene file, overrides the configured one
    #[arg(long)]
    scenes: Option<PathBuf>,

    /// Art-Net Source IP address
    #[arg(long, value_parser = parse_ip)]
    source_ip: Option<IpAddr>,

    /// Art-Net Destination IP address (unicast)
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port
    #[arg(long)]
    artnet_port: Option<u16>,

    /// Force broadcast mode even if destination IP is provided
    #[arg(long)]
    broadcast: bool,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

/// Operator commands read from stdin.
#[derive(Debug, PartialEq)]
enum Command {
    Go,
    Next,
    Prev,
    Marker(usize),
    Live(bool),
    Set { channel: usize, percent: u8 },
    Toggle(usize),
    Black,
    Edit(Option<usize>),
    Value { channel: usize, percent: u8 },
    Name { scene: usize, name: String },
    FadeIn(FadeAdjust),
    FadeOut(FadeAdjust),
    Reload,
    Save,
    Status,
    Quit,
}

/// Change to one of the default fade times.
#[derive(Debug, PartialEq)]
enum FadeAdjust {
    Step(i32),
    Reset,
}

fn number_in(token: &str, range: RangeInclusive<usize>, what: &str) -> Result<usize, String> {
    token
        .parse::<usize>()
        .ok()
        .filter(|n| range.contains(n))
        .ok_or_else(|| format!("{} must be {}..{}", what, range.start(), range.end()))
}

fn percent(token: &str) -> Result<u8, String> {
    number_in(token, 0..=100, "level").map(|p| p as u8)
}

fn fade_adjust(token: &str) -> Result<FadeAdjust, String> {
    match token {
        "up" | "+" => Ok(FadeAdjust::Step(1)),
        "down" | "-" => Ok(FadeAdjust::Step(-1)),
        "reset" => Ok(FadeAdjust::Reset),
        _ => Err("fade adjustment must be up, down or reset".to_string()),
    }
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let command = match tokens.as_slice() {
            [] => return Ok(None),
            ["go"] => Command::Go,
            ["next"] => Command::Next,
            ["prev"] => Command::Prev,
            ["marker", n] => Command::Marker(number_in(n, 1..=MARKERS, "marker")?),
            ["live", "on"] => Command::Live(true),
            ["live", "off"] => Command::Live(false),
            ["set", channel, level] => Command::Set {
                channel: number_in(channel, 1..=CHANNELS, "channel")?,
                percent: percent(level)?,
            },
            ["toggle", scene] => Command::Toggle(number_in(scene, 1..=SCENES, "scene")?),
            ["black"] => Command::Black,
            ["edit", "off"] => Command::Edit(None),
            ["edit", scene] => Command::Edit(Some(number_in(scene, 1..=SCENES, "scene")?)),
            ["value", channel, level] => Command::Value {
                channel: number_in(channel, 1..=CHANNELS, "channel")?,
                percent: percent(level)?,
            },
            ["name", scene, rest @ ..] => Command::Name {
                scene: number_in(scene, 1..=SCENES, "scene")?,
                name: rest.join(" "),
            },
            ["fadein", adjust] => Command::FadeIn(fade_adjust(adjust)?),
            ["fadeout", adjust] => Command::FadeOut(fade_adjust(adjust)?),
            ["reload"] => Command::Reload,
            ["save"] => Command::Save,
            ["status"] => Command::Status,
            ["quit"] | ["exit"] => Command::Quit,
            _ => return Err(format!("unknown command '{}'", line.trim())),
        };
        Ok(Some(command))
    }
}

/// Keeps the last output levels so `status` can show what the faders would.
#[derive(Default)]
struct LevelMonitor {
    levels: Mutex<Levels>,
}

impl FrameListener for LevelMonitor {
    fn frame_updated(&self, levels: &Levels) {
        *self.levels.lock() = *levels;
    }
}

fn print_upcoming(console: &LightingConsole) {
    match console.upcoming() {
        Some(cue) => {
            let index = console.cue_list().upcoming_index().unwrap_or(0);
            println!("Next cue {}/{}: {}", index + 1, console.cue_list().len(), cue.title());
            for line in cue.description() {
                println!("    {}", line);
            }
        }
        None => println!("No cues loaded"),
    }
}

fn print_status(console: &LightingConsole, monitor: &LevelMonitor) {
    print_upcoming(console);
    println!(
        "Execution: {:?}, live: {}",
        console.execution_state(),
        if console.is_live() { "on" } else { "off" }
    );
    println!(
        "Fade in {:.1}s, fade out {:.1}s",
        console.fade_defaults().fade_in().as_secs_f32(),
        console.fade_defaults().fade_out().as_secs_f32()
    );
    if let Some(scene) = console.edited_scene() {
        println!("Editing scene {} '{}'", scene, console.scenes().name(scene));
    }
    let levels = *monitor.levels.lock();
    for (i, level) in levels.iter().enumerate() {
        println!(
            "  {:>8} {:>3}%",
            console.fader_label(i + 1),
            (level * 100.0).round() as u32
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(Some(args.config.clone()));
    let mut settings = config.load_or_default();
    if let Some(show) = args.show {
        settings.show_path = show;
    }
    if let Some(scenes) = args.scenes {
        settings.scenes_path = scenes;
    }
    if let Some(source_ip) = args.source_ip {
        settings.dmx_source_ip = source_ip.to_string();
    }
    if let Some(dest_ip) = args.dest_ip {
        settings.dmx_dest_ip = Some(dest_ip.to_string());
        settings.dmx_broadcast = false;
    }
    if let Some(port) = args.artnet_port {
        settings.dmx_port = port;
    }
    if args.broadcast {
        settings.dmx_broadcast = true;
    }

    let network_config = settings.network_config();
    println!("Configuring Footlight with Art-Net settings:");
    println!("Mode: {}", network_config.get_mode_string());
    println!("Destination: {}", network_config.get_destination());
    println!("Port: {}", network_config.port);

    let monitor = Arc::new(LevelMonitor::default());
    let mut console = LightingConsole::new(settings);
    console.set_frame_listener(monitor.clone());
    console.initialize().await?;

    if let Err(e) = console.reload_show() {
        println!("!! Show not loaded: {}", e);
    }
    print_upcoming(&console);

    // Cue completions come back here so the cursor only moves on this task
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel::<()>();
    let listener: Arc<dyn ExecutionListener> = Arc::new(move || {
        let _ = finished_tx.send(());
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(()) = finished_rx.recv() => {
                console.next();
                print_upcoming(&console);
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let command = match Command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match command {
                    Command::Go => {
                        if let Err(e) = console.go(Arc::clone(&listener)) {
                            println!("{}", e);
                        }
                    }
                    Command::Next => {
                        console.next();
                        print_upcoming(&console);
                    }
                    Command::Prev => {
                        console.prev();
                        print_upcoming(&console);
                    }
                    Command::Marker(n) => {
                        console.goto_marker(n);
                        print_upcoming(&console);
                    }
                    Command::Live(live) => console.set_live(live),
                    Command::Set { channel, percent } => {
                        if let Err(e) = console
                            .set_live_level(channel, f32::from(percent) / 100.0)
                            .await
                        {
                            println!("!! {}", e);
                        }
                    }
                    Command::Toggle(scene) => {
                        let showing = console.toggle_scene(scene);
                        println!("Scene {} {}", scene, if showing { "in" } else { "out" });
                    }
                    Command::Black => console.black(),
                    Command::Edit(scene) => {
                        if let Err(e) = console.edit_scene(scene) {
                            println!("!! {}", e);
                        }
                    }
                    Command::Value { channel, percent } => {
                        if let Err(e) = console.set_scene_value(channel, f32::from(percent) / 100.0) {
                            println!("!! {}", e);
                        }
                    }
                    Command::Name { scene, name } => {
                        if let Err(e) = console.rename_scene(scene, &name) {
                            println!("!! {}", e);
                        }
                    }
                    Command::FadeIn(adjust) => {
                        let fade_in = match adjust {
                            FadeAdjust::Step(notches) => console.step_fade_in(notches),
                            FadeAdjust::Reset => {
                                console.reset_fade_times();
                                console.fade_defaults().fade_in()
                            }
                        };
                        println!("Fade in {:.1}s", fade_in.as_secs_f32());
                    }
                    Command::FadeOut(adjust) => {
                        let fade_out = match adjust {
                            FadeAdjust::Step(notches) => console.step_fade_out(notches),
                            FadeAdjust::Reset => {
                                console.reset_fade_times();
                                console.fade_defaults().fade_out()
                            }
                        };
                        println!("Fade out {:.1}s", fade_out.as_secs_f32());
                    }
                    Command::Reload => match console.reload_show() {
                        Ok(()) => print_upcoming(&console),
                        Err(e) => println!("!! Show not loaded: {}", e),
                    },
                    Command::Save => match console.save_scenes() {
                        Ok(()) => println!("Scenes saved"),
                        Err(e) => println!("!! Scenes not saved: {}", e),
                    },
                    Command::Status => print_status(&console, &monitor),
                    Command::Quit => break,
                }
            }
        }
    }

    log::info!("Operator quit");
    console.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("go"), Ok(Some(Command::Go)));
        assert_eq!(Command::parse("  "), Ok(None));
        assert_eq!(Command::parse("marker 3"), Ok(Some(Command::Marker(3))));
        assert_eq!(Command::parse("live off"), Ok(Some(Command::Live(false))));
        assert_eq!(
            Command::parse("set 16 100"),
            Ok(Some(Command::Set {
                channel: 16,
                percent: 100
            }))
        );
        assert_eq!(Command::parse("exit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_parse_scene_commands() {
        assert_eq!(Command::parse("toggle 16"), Ok(Some(Command::Toggle(16))));
        assert_eq!(Command::parse("black"), Ok(Some(Command::Black)));
        assert_eq!(Command::parse("edit 4"), Ok(Some(Command::Edit(Some(4)))));
        assert_eq!(Command::parse("edit off"), Ok(Some(Command::Edit(None))));
        assert_eq!(
            Command::parse("value 2 75"),
            Ok(Some(Command::Value {
                channel: 2,
                percent: 75
            }))
        );
        assert_eq!(
            Command::parse("name 3 Warm   wash"),
            Ok(Some(Command::Name {
                scene: 3,
                name: "Warm wash".to_string()
            }))
        );
        assert_eq!(
            Command::parse("fadein up"),
            Ok(Some(Command::FadeIn(FadeAdjust::Step(1))))
        );
        assert_eq!(
            Command::parse("fadeout -"),
            Ok(Some(Command::FadeOut(FadeAdjust::Step(-1))))
        );
        assert_eq!(
            Command::parse("fadeout reset"),
            Ok(Some(Command::FadeOut(FadeAdjust::Reset)))
        );
    }

    #[test]
    fn test_rejects_bad_commands() {
        assert!(Command::parse("marker 5").is_err());
        assert!(Command::parse("set 17 10").is_err());
        assert!(Command::parse("set 1 101").is_err());
        assert!(Command::parse("live maybe").is_err());
        assert!(Command::parse("fog").is_err());
        assert!(Command::parse("toggle 0").is_err());
        assert!(Command::parse("edit 17").is_err());
        assert!(Command::parse("value 1").is_err());
        assert!(Command::parse("fadein sideways").is_err());
        assert_eq!(
            Command::parse("set 17 10"),
            Err("channel must be 1..16".to_string())
        );
    }
}
