use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::artnet::artnet::{ArtNet, DmxOutput};
use crate::artnet::network_config::NetworkConfig;
use crate::console_state::ConsoleFlags;
use crate::dmx::transmitter::Transmitter;
use crate::listener::FrameListener;
use crate::patch::ChannelPatch;
use crate::scene::scene::SceneBank;

/// About 30 frames per second.
pub const DEFAULT_TRANSMIT_PERIOD: Duration = Duration::from_millis(28);

/// Shortest period the transmitter loop accepts; `interval` cannot tick at zero.
pub const MIN_TRANSMIT_PERIOD: Duration = Duration::from_millis(1);

/// The transmitter loop: every period it merges the active scenes, builds the full
/// universe and sends it, whether or not anything changed.
pub struct DmxModule {
    output: Option<Box<dyn DmxOutput>>,
    network_config: NetworkConfig,
    scenes: Arc<SceneBank>,
    flags: Arc<ConsoleFlags>,
    transmitter: Transmitter,
    listener: Option<Arc<dyn FrameListener>>,
    period: Duration,
    frames_sent: u64,
    send_errors: u64,
}

impl DmxModule {
    pub fn new(
        network_config: NetworkConfig,
        patch: ChannelPatch,
        scenes: Arc<SceneBank>,
        flags: Arc<ConsoleFlags>,
    ) -> Self {
        Self {
            output: None,
            network_config,
            scenes,
            flags,
            transmitter: Transmitter::new(patch),
            listener: None,
            period: DEFAULT_TRANSMIT_PERIOD,
            frames_sent: 0,
            send_errors: 0,
        }
    }

    /// Sends frames somewhere other than an Art-Net socket.
    pub fn with_output(mut self, output: Box<dyn DmxOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn set_frame_listener(&mut self, listener: Arc<dyn FrameListener>) {
        self.listener = Some(listener);
    }

    /// Sets the transmit period, never shorter than [`MIN_TRANSMIT_PERIOD`].
    pub fn set_period(&mut self, period: Duration) {
        self.period = period.max(MIN_TRANSMIT_PERIOD);
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn handle_event(&mut self, event: &ModuleEvent) {
        match *event {
            ModuleEvent::LiveLevel { channel, level } => {
                self.transmitter.set_live_level(channel, level);
            }
            ModuleEvent::DirectLevel { address, value } => {
                self.transmitter.set_direct(address, value);
            }
            _ => {
                // DMX module only handles output events
            }
        }
    }
}

#[async_trait]
impl AsyncModule for DmxModule {
    fn id(&self) -> ModuleId {
        ModuleId::Dmx
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!(
            "Initializing DMX module in {} mode",
            self.network_config.get_mode_string()
        );

        if self.output.is_none() {
            let artnet = ArtNet::new(self.network_config.mode.clone(), self.network_config.port)?;
            self.output = Some(Box::new(artnet));
        }

        log::info!(
            "DMX output to {} on port {}",
            self.network_config.get_destination(),
            self.network_config.port
        );

        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let output = self.output.take().ok_or("DMX module not initialized")?;
        let universe = self.network_config.universe;

        let mut frame_interval = interval(self.period);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let frames_per_report = (Duration::from_secs(5).as_millis() / self.period.as_millis().max(1)) as u64;

        log::info!("DMX module started, sending every {:?}", self.period);

        let _ = tx
            .send(ModuleMessage::Status(format!(
                "DMX module running every {:?}",
                self.period
            )))
            .await;

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    if event == ModuleEvent::Shutdown {
                        log::info!("DMX module received shutdown signal");
                        break;
                    }
                    self.handle_event(&event);
                }

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let frame = self.transmitter.cycle(&self.scenes, self.flags.is_live(), now);

                    // Best effort: a lost frame is replaced by the next one.
                    if let Err(e) = output.send_frame(universe, frame) {
                        self.send_errors += 1;
                        log::debug!("DMX frame not sent: {}", e);
                    }

                    if self.flags.ui_refresh_enabled() {
                        if let Some(listener) = &self.listener {
                            listener.frame_updated(self.transmitter.levels());
                        }
                    }

                    self.frames_sent += 1;

                    if frames_per_report > 0 && self.frames_sent % frames_per_report == 0 {
                        let _ = tx.try_send(ModuleMessage::Status(format!(
                            "DMX: {} frames sent, {} failed",
                            self.frames_sent, self.send_errors
                        )));
                    }
                }
            }
        }

        log::info!(
            "DMX module shutting down after sending {} frames",
            self.frames_sent
        );
        self.output = Some(output);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("DMX module shutdown complete");
        Ok(())
    }
}
