use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::artnet::artnet::DmxOutput;
use crate::audio::audio_control::{AudioControl, DmxAudio, ModuleAudio};
use crate::config::{AudioMode, Settings};
use crate::console_state::{ConsoleFlags, FadeDefaults};
use crate::cue::cue::Cue;
use crate::cue::cue_executor::{CueContext, CueExecutor, ExecutionState};
use crate::cue::cue_list::CueList;
use crate::error::{CueError, ShowError};
use crate::levels::{checked_channel_index, SCENES};
use crate::listener::{ExecutionListener, FrameListener};
use crate::modules::{AudioModule, DmxModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage};
use crate::scene::scene::SceneBank;

/// The console: scenes, cue list, global modes and the running modules, owned in one place.
///
/// This is the command interface the operator side calls. Navigation and mode changes are
/// meant to come from a single task; cue execution and transmission run on their own tasks.
pub struct LightingConsole {
    settings: Settings,
    scenes: Arc<SceneBank>,
    flags: Arc<ConsoleFlags>,
    fade_defaults: Arc<FadeDefaults>,
    cue_list: CueList,
    executor: Option<CueExecutor>,

    // Async module system
    module_manager: ModuleManager,
    message_handler: Option<JoinHandle<()>>,
    dmx_sender: Option<mpsc::Sender<ModuleEvent>>,

    // Used when the modules are built
    dmx_output: Option<Box<dyn DmxOutput>>,
    frame_listener: Option<Arc<dyn FrameListener>>,

    is_running: bool,
}

impl LightingConsole {
    pub fn new(settings: Settings) -> Self {
        Self {
            fade_defaults: Arc::new(settings.fade_defaults()),
            settings,
            scenes: Arc::new(SceneBank::new()),
            flags: Arc::new(ConsoleFlags::new()),
            cue_list: CueList::new(),
            executor: None,
            module_manager: ModuleManager::new(),
            message_handler: None,
            dmx_sender: None,
            dmx_output: None,
            frame_listener: None,
            is_running: false,
        }
    }

    /// Sends frames to `output` instead of opening an Art-Net socket.
    pub fn with_dmx_output(mut self, output: Box<dyn DmxOutput>) -> Self {
        self.dmx_output = Some(output);
        self
    }

    /// Registers the fader refresh hook. Takes effect at [`initialize`](Self::initialize).
    pub fn set_frame_listener(&mut self, listener: Arc<dyn FrameListener>) {
        self.frame_listener = Some(listener);
    }

    /// Restores the scenes and starts the transmitter and audio modules.
    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Initializing lighting console...");

        self.scenes.load(&self.settings.scenes_path);

        let mut dmx = DmxModule::new(
            self.settings.network_config(),
            self.settings.patch(),
            Arc::clone(&self.scenes),
            Arc::clone(&self.flags),
        );
        dmx.set_period(self.settings.transmit_period());
        if let Some(output) = self.dmx_output.take() {
            dmx = dmx.with_output(output);
        }
        if let Some(listener) = &self.frame_listener {
            dmx.set_frame_listener(Arc::clone(listener));
        }
        self.module_manager.register_module(Box::new(dmx));

        if self.settings.audio_mode == AudioMode::Mplayer {
            self.module_manager
                .register_module(Box::new(AudioModule::new(self.settings.mplayer_command.clone())));
        }

        self.module_manager
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!("Module initialization failed: {}", e))?;
        self.module_manager
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("Module start failed: {}", e))?;

        let dmx_sender = self
            .module_manager
            .sender(ModuleId::Dmx)
            .ok_or_else(|| anyhow::anyhow!("DMX module did not start"))?;

        let audio: Arc<dyn AudioControl> = match self.settings.audio_mode {
            AudioMode::Mplayer => {
                let sender = self
                    .module_manager
                    .sender(ModuleId::Audio)
                    .ok_or_else(|| anyhow::anyhow!("Audio module did not start"))?;
                Arc::new(ModuleAudio::new(sender))
            }
            AudioMode::Dmx => Arc::new(DmxAudio::new(
                dmx_sender.clone(),
                self.settings.audio_channels(),
            )),
        };

        self.executor = Some(CueExecutor::new(CueContext {
            scenes: Arc::clone(&self.scenes),
            defaults: Arc::clone(&self.fade_defaults),
            audio,
        }));
        self.dmx_sender = Some(dmx_sender);

        if let Some(mut message_rx) = self.module_manager.take_message_receiver() {
            self.message_handler = Some(tokio::spawn(async move {
                while let Some(message) = message_rx.recv().await {
                    match message {
                        ModuleMessage::Status(status) => log::debug!("{}", status),
                        ModuleMessage::Error(error) => log::error!("{}", error),
                    }
                }
            }));
        }

        self.is_running = true;
        log::info!("Lighting console initialized");
        Ok(())
    }

    /// Re-reads the show file. On a parse error the cue list is left empty and the error
    /// is returned for the operator.
    pub fn reload_show(&mut self) -> Result<(), ShowError> {
        match CueList::load(&self.settings.show_path) {
            Ok(list) => {
                self.cue_list = list;
                Ok(())
            }
            Err(e) => {
                log::error!("Show {} not loaded: {}", self.settings.show_path.display(), e);
                self.cue_list = CueList::new();
                Err(e)
            }
        }
    }

    pub fn cue_list(&self) -> &CueList {
        &self.cue_list
    }

    pub fn upcoming(&self) -> Option<Arc<Cue>> {
        self.cue_list.upcoming()
    }

    pub fn next(&mut self) {
        self.cue_list.next();
    }

    pub fn prev(&mut self) {
        self.cue_list.prev();
    }

    pub fn goto_marker(&mut self, n: usize) {
        self.cue_list.goto_marker(n);
    }

    /// Executes the upcoming cue. The cursor is not moved; the caller advances it when
    /// `listener` reports completion.
    pub fn go(&self, listener: Arc<dyn ExecutionListener>) -> Result<JoinHandle<()>, CueError> {
        let executor = self.executor.as_ref().ok_or(CueError::NotRunning)?;
        let cue = self.cue_list.upcoming().ok_or(CueError::NoCue)?;
        executor.execute(cue, listener)
    }

    pub fn execution_state(&self) -> ExecutionState {
        self.executor
            .as_ref()
            .map_or(ExecutionState::Idle, CueExecutor::state)
    }

    pub fn scenes(&self) -> &Arc<SceneBank> {
        &self.scenes
    }

    pub fn is_live(&self) -> bool {
        self.flags.is_live()
    }

    /// Live mode suspends scene accumulation; channels keep what was last set on them.
    pub fn set_live(&self, live: bool) {
        log::info!("Live mode {}", if live { "on" } else { "off" });
        self.flags.set_live(live);
    }

    /// Drives a logical channel directly. Only visible on the output while live.
    pub async fn set_live_level(&self, channel: usize, level: f32) -> Result<(), anyhow::Error> {
        let sender = self
            .dmx_sender
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Console is not running"))?;
        sender
            .send(ModuleEvent::LiveLevel { channel, level })
            .await
            .map_err(|e| anyhow::anyhow!("DMX module unavailable: {}", e))
    }

    /// Fades a scene in with the default fade-in time, or out with the default fade-out time
    /// if it is showing. Returns whether it is showing now.
    pub fn toggle_scene(&self, scene: usize) -> bool {
        let showing = self.scenes.toggle(
            scene,
            self.fade_defaults.fade_in(),
            self.fade_defaults.fade_out(),
        );
        log::info!("Scene {} {}", scene, if showing { "in" } else { "out" });
        showing
    }

    /// Immediate blackout of every scene.
    pub fn black(&self) {
        log::info!("Blackout");
        self.scenes.black();
    }

    /// Selects the one scene whose programmed values the faders edit. Leaving edit mode with
    /// `None` saves the scene file.
    pub fn edit_scene(&self, scene: Option<usize>) -> Result<(), anyhow::Error> {
        if let Some(n) = scene {
            if !(1..=SCENES).contains(&n) {
                anyhow::bail!("Scene {} does not exist", n);
            }
        }

        let was_editing = self.scenes.edited().is_some();
        self.scenes.edit_only(scene);
        self.flags.set_edit(scene.is_some());

        match scene {
            Some(n) => log::info!("Editing scene {}", n),
            None if was_editing => {
                log::info!("Edit mode off");
                self.save_scenes()?;
            }
            None => {}
        }
        Ok(())
    }

    pub fn edited_scene(&self) -> Option<usize> {
        self.scenes.edited()
    }

    /// Programs one channel of the scene being edited.
    pub fn set_scene_value(&self, channel: usize, level: f32) -> Result<(), anyhow::Error> {
        let scene = self
            .scenes
            .edited()
            .ok_or_else(|| anyhow::anyhow!("No scene is being edited"))?;
        if checked_channel_index(channel).is_none() {
            anyhow::bail!("Channel {} does not exist", channel);
        }
        self.scenes.set_value(scene, channel, level);
        Ok(())
    }

    /// Names a scene. The name is stored in the scene file, so it may not contain `;`.
    pub fn rename_scene(&self, scene: usize, name: &str) -> Result<(), anyhow::Error> {
        if !(1..=SCENES).contains(&scene) {
            anyhow::bail!("Scene {} does not exist", scene);
        }
        if name.contains([';', '\n', '\r']) {
            anyhow::bail!("Scene names may not contain ';'");
        }
        self.scenes.set_name(scene, name.trim());
        Ok(())
    }

    pub fn save_scenes(&self) -> Result<(), anyhow::Error> {
        self.scenes.save(&self.settings.scenes_path)?;
        Ok(())
    }

    pub fn fade_defaults(&self) -> &FadeDefaults {
        &self.fade_defaults
    }

    pub fn step_fade_in(&self, notches: i32) -> Duration {
        let fade_in = self.fade_defaults.step_fade_in(notches);
        log::info!("Default fade in {:.1}s", fade_in.as_secs_f32());
        fade_in
    }

    pub fn step_fade_out(&self, notches: i32) -> Duration {
        let fade_out = self.fade_defaults.step_fade_out(notches);
        log::info!("Default fade out {:.1}s", fade_out.as_secs_f32());
        fade_out
    }

    /// Restores the default fade times from the settings.
    pub fn reset_fade_times(&self) {
        let configured = self.settings.fade_defaults();
        self.fade_defaults.set_fade_in(configured.fade_in());
        self.fade_defaults.set_fade_out(configured.fade_out());
    }

    pub fn fader_label(&self, channel: usize) -> String {
        self.settings.fader_label(channel)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_running {
            return Ok(());
        }

        log::info!("Shutting down lighting console...");

        self.module_manager
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!("Module shutdown failed: {}", e))?;

        if let Some(handle) = self.message_handler.take() {
            handle.abort();
        }

        self.dmx_sender = None;
        self.executor = None;
        self.is_running = false;
        log::info!("Lighting console shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }
}
