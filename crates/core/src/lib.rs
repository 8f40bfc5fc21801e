pub use artnet::artnet::{ArtNet, ArtNetMode, DmxOutput};
pub use artnet::network_config::NetworkConfig;
pub use audio::audio_control::{AudioControl, DmxAudio, DmxAudioChannels, ModuleAudio};
pub use config::{AudioMode, ConfigError, ConfigManager, ConfigSchema, Settings};
pub use console::LightingConsole;
pub use console_state::{ConsoleFlags, FadeDefaults};
pub use cue::cue::{Cue, CueStep};
pub use cue::cue_executor::{CueContext, CueExecutor, ExecutionState, SETTLE_TIME};
pub use cue::cue_list::{CueList, MARKERS};
pub use dmx::transmitter::{merge_max, Transmitter};
pub use error::{ArtNetError, CueError, ShowError};
pub use levels::{translate_level, Levels, CHANNELS, SCENES, UNIVERSE_SIZE};
pub use listener::{ExecutionListener, FrameListener};
// Async module system exports
pub use modules::{
    AsyncModule, AudioModule, DmxModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage,
};
pub use patch::ChannelPatch;
pub use scene::scene::{Scene, SceneBank};

mod artnet;
mod audio;
mod config;
mod console;
mod console_state;
mod cue;
mod dmx;
mod error;
mod levels;
mod listener;
mod modules;
mod patch;
mod scene;
