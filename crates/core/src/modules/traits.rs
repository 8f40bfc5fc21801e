use async_trait::async_trait;
use tokio::sync::mpsc;

/// Unique identifier for each module type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Dmx,
    Audio,
}

/// Events that can be sent to modules
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    /// Drive a logical channel (1..16) directly while in live mode
    LiveLevel { channel: usize, level: f32 },
    /// Write a physical DMX address (1..512) directly, bypassing the patch
    DirectLevel { address: usize, value: u8 },
    /// Start playing a song by number
    AudioPlay { song: u32 },
    AudioStop,
    /// Playback volume in percent (0..100)
    AudioSetVolume(u8),
    /// System events
    Shutdown,
}

/// Messages passed from modules back to the module manager
#[derive(Debug)]
pub enum ModuleMessage {
    Status(String),
    Error(String),
}

/// Trait that all async modules must implement
#[async_trait]
pub trait AsyncModule: Send + Sync {
    /// Get the unique identifier for this module
    fn id(&self) -> ModuleId;

    /// Initialize the module (called once at startup)
    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Start the module's main loop
    async fn run(
        &mut self,
        rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Shutdown the module gracefully
    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
