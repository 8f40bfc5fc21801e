use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};

pub const DEFAULT_PLAYER_COMMAND: &str = "mplayer -quiet -idle -slave";

/// Wait before restarting a player that exited, so a missing binary does not spin.
const RESTART_DELAY: Duration = Duration::from_secs(1);

struct PlayerProcess {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Plays numbered songs (`01.mp3`, `02.mp3`, ...) through an external player running in
/// slave mode, commanded over its stdin.
pub struct AudioModule {
    command: String,
    volume: u8,
    current_song: Option<u32>,
}

impl AudioModule {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            volume: 100,
            current_song: None,
        }
    }

    /// Player commands for starting `song`. The volume is re-sent since the player
    /// starts every file at full volume.
    pub fn play_commands(song: u32, volume: u8) -> Vec<String> {
        vec![
            format!("loadfile {:02}.mp3", song),
            Self::volume_command(volume),
        ]
    }

    pub fn volume_command(volume: u8) -> String {
        format!("volume {} 1", volume)
    }

    fn spawn_player(&mut self) -> Option<PlayerProcess> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next()?;

        let spawned = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                log::error!("Failed to start audio player '{}': {}", self.command, e);
                return None;
            }
        };

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            log::error!("Audio player started without pipes");
            return None;
        };

        log::info!("Audio player started: {}", self.command);
        Some(PlayerProcess {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn send_command(player: Option<&mut PlayerProcess>, command: &str) {
        let Some(player) = player else {
            log::warn!("Audio player not running, dropped command: {}", command);
            return;
        };
        let line = format!("{}\n", command);
        if let Err(e) = player.stdin.write_all(line.as_bytes()).await {
            log::error!("Audio player error on '{}': {}", command, e);
            return;
        }
        if let Err(e) = player.stdin.flush().await {
            log::error!("Audio player error on '{}': {}", command, e);
        }
    }

    async fn handle_event(&mut self, event: ModuleEvent, mut player: Option<&mut PlayerProcess>) {
        match event {
            ModuleEvent::AudioPlay { song } => {
                for command in Self::play_commands(song, self.volume) {
                    Self::send_command(player.as_deref_mut(), &command).await;
                }
                self.current_song = Some(song);
            }
            ModuleEvent::AudioStop => {
                Self::send_command(player, "stop").await;
            }
            ModuleEvent::AudioSetVolume(volume) => {
                self.volume = volume.min(100);
                Self::send_command(player, &Self::volume_command(self.volume)).await;
            }
            _ => {
                // Audio module only handles audio events
            }
        }
    }

    pub fn current_song(&self) -> Option<u32> {
        self.current_song
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }
}

async fn next_output_line(player: &mut Option<PlayerProcess>) -> Option<String> {
    match player {
        Some(player) => player.stdout.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}

async fn restart_due(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl AsyncModule for AudioModule {
    fn id(&self) -> ModuleId {
        ModuleId::Audio
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.command.trim().is_empty() {
            return Err("Audio player command is empty".into());
        }
        log::info!("Audio module initialized with '{}'", self.command);
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut player = self.spawn_player();
        let mut restart_at = match player {
            Some(_) => None,
            None => Some(Instant::now() + RESTART_DELAY),
        };

        let _ = tx
            .send(ModuleMessage::Status(format!(
                "Audio module running with '{}'",
                self.command
            )))
            .await;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(ModuleEvent::Shutdown) | None => {
                            log::info!("Audio module received shutdown signal");
                            break;
                        }
                        Some(event) => self.handle_event(event, player.as_mut()).await,
                    }
                }

                line = next_output_line(&mut player) => {
                    match line {
                        Some(line) => log::debug!("audio player: {}", line),
                        None => {
                            log::warn!("Audio player exited, restarting in {:?}", RESTART_DELAY);
                            player = None;
                            restart_at = Some(Instant::now() + RESTART_DELAY);
                            let _ = tx.try_send(ModuleMessage::Error("Audio player exited".to_string()));
                        }
                    }
                }

                _ = restart_due(restart_at) => {
                    player = self.spawn_player();
                    restart_at = match player {
                        Some(_) => None,
                        None => Some(Instant::now() + RESTART_DELAY),
                    };
                }
            }
        }

        if let Some(mut player) = player {
            Self::send_command(Some(&mut player), "quit").await;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("Audio module shutdown complete");
        Ok(())
    }
}
