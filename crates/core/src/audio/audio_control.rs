use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::modules::ModuleEvent;

/// The three things a cue can ask of the audio player.
#[async_trait]
pub trait AudioControl: Send + Sync {
    async fn play(&self, song: u32);
    async fn stop(&self);
    /// Volume in percent, 0..100.
    async fn set_volume(&self, percent: u8);
}

/// Forwards audio commands to the audio module.
#[derive(Clone)]
pub struct ModuleAudio {
    sender: mpsc::Sender<ModuleEvent>,
}

impl ModuleAudio {
    pub fn new(sender: mpsc::Sender<ModuleEvent>) -> Self {
        Self { sender }
    }

    async fn send(&self, event: ModuleEvent) {
        if let Err(e) = self.sender.send(event).await {
            log::error!("Audio module unavailable: {}", e);
        }
    }
}

#[async_trait]
impl AudioControl for ModuleAudio {
    async fn play(&self, song: u32) {
        self.send(ModuleEvent::AudioPlay { song }).await;
    }

    async fn stop(&self) {
        self.send(ModuleEvent::AudioStop).await;
    }

    async fn set_volume(&self, percent: u8) {
        self.send(ModuleEvent::AudioSetVolume(percent.min(100))).await;
    }
}

/// Physical DMX channels of an MP3 player that is controlled over DMX.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmxAudioChannels {
    pub song_select: usize,
    pub play_stop: usize,
    pub volume: usize,
}

impl Default for DmxAudioChannels {
    fn default() -> Self {
        Self {
            song_select: 50,
            play_stop: 51,
            volume: 52,
        }
    }
}

/// Songs the DMX player can select.
pub const DMX_AUDIO_MAX_SONG: u32 = 21;

/// Drives a DMX-controlled MP3 player by writing physical channels on the transmitter.
#[derive(Clone)]
pub struct DmxAudio {
    sender: mpsc::Sender<ModuleEvent>,
    channels: DmxAudioChannels,
}

impl DmxAudio {
    pub fn new(sender: mpsc::Sender<ModuleEvent>, channels: DmxAudioChannels) -> Self {
        Self { sender, channels }
    }

    /// DMX value that selects `song` on the player.
    pub fn song_value(song: u32) -> u8 {
        ((255 * song.min(DMX_AUDIO_MAX_SONG)) / DMX_AUDIO_MAX_SONG + 6).min(255) as u8
    }

    /// DMX value for a volume in percent.
    pub fn volume_value(percent: u8) -> u8 {
        ((u32::from(percent.min(100)) * 255) / 100) as u8
    }

    async fn write(&self, address: usize, value: u8) {
        if let Err(e) = self
            .sender
            .send(ModuleEvent::DirectLevel { address, value })
            .await
        {
            log::error!("DMX module unavailable for audio control: {}", e);
        }
    }
}

#[async_trait]
impl AudioControl for DmxAudio {
    async fn play(&self, song: u32) {
        // The player only picks up a new song on a stop -> play edge.
        self.write(self.channels.play_stop, 0).await;
        sleep(Duration::from_millis(50)).await;
        self.write(self.channels.song_select, Self::song_value(song))
            .await;
        self.write(self.channels.play_stop, 255).await;
    }

    async fn stop(&self) {
        self.write(self.channels.play_stop, 0).await;
    }

    async fn set_volume(&self, percent: u8) {
        self.write(self.channels.volume, Self::volume_value(percent))
            .await;
    }
}
