use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};

const CHANNEL_CAPACITY: usize = 1000;

/// Owns the long-running modules, runs each on its own task and routes events to them.
pub struct ModuleManager {
    modules: HashMap<ModuleId, Box<dyn AsyncModule>>,
    module_handles: HashMap<ModuleId, JoinHandle<()>>,
    module_senders: HashMap<ModuleId, mpsc::Sender<ModuleEvent>>,
    message_receiver: Option<mpsc::Receiver<ModuleMessage>>,
    message_sender: mpsc::Sender<ModuleMessage>,
    running: bool,
}

impl ModuleManager {
    pub fn new() -> Self {
        let (message_sender, message_receiver) = mpsc::channel(CHANNEL_CAPACITY);

        Self {
            modules: HashMap::new(),
            module_handles: HashMap::new(),
            module_senders: HashMap::new(),
            message_receiver: Some(message_receiver),
            message_sender,
            running: false,
        }
    }

    /// Register a new module with the manager
    pub fn register_module(&mut self, module: Box<dyn AsyncModule>) {
        let id = module.id();
        self.modules.insert(id, module);
    }

    pub fn has_module(&self, id: ModuleId) -> bool {
        self.modules.contains_key(&id) || self.module_senders.contains_key(&id)
    }

    /// Initialize all registered modules
    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for (id, module) in &mut self.modules {
            match module.initialize().await {
                Ok(_) => log::info!("Module {:?} initialized successfully", id),
                Err(e) => {
                    log::error!("Failed to initialize module {:?}: {}", id, e);
                    return Err(format!("{:?} module error: {}", id, e).into());
                }
            }
        }
        Ok(())
    }

    /// Start every module on its own task
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.running {
            return Err("Module manager is already running".into());
        }

        let modules_to_start = std::mem::take(&mut self.modules);

        for (id, mut module) in modules_to_start {
            let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
            let message_tx = self.message_sender.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = module.run(event_rx, message_tx.clone()).await {
                    let _ = message_tx
                        .send(ModuleMessage::Error(format!("Module {:?} error: {}", id, e)))
                        .await;
                }
                if let Err(e) = module.shutdown().await {
                    log::error!("Module {:?} shutdown error: {}", id, e);
                }
            });

            self.module_handles.insert(id, handle);
            self.module_senders.insert(id, event_tx);
        }

        self.running = true;
        Ok(())
    }

    /// A sender for events to a running module
    pub fn sender(&self, module_id: ModuleId) -> Option<mpsc::Sender<ModuleEvent>> {
        self.module_senders.get(&module_id).cloned()
    }

    /// Send an event to a specific module
    pub async fn send_to_module(&self, module_id: ModuleId, event: ModuleEvent) -> Result<(), String> {
        if let Some(sender) = self.module_senders.get(&module_id) {
            sender
                .send(event)
                .await
                .map_err(|e| format!("Failed to send event to module {:?}: {}", module_id, e))?;
            Ok(())
        } else {
            Err(format!("Module {:?} not found", module_id))
        }
    }

    /// Broadcast an event to all modules
    pub async fn broadcast_event(&self, event: ModuleEvent) {
        for (id, sender) in &self.module_senders {
            if let Err(e) = sender.send(event.clone()).await {
                log::warn!("Failed to broadcast event to module {:?}: {}", id, e);
            }
        }
    }

    /// Get the message receiver (should only be called once)
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage>> {
        self.message_receiver.take()
    }

    /// Shutdown all modules gracefully
    pub async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.running {
            return Ok(());
        }

        log::info!("Shutting down module manager...");

        self.broadcast_event(ModuleEvent::Shutdown).await;

        for (id, handle) in std::mem::take(&mut self.module_handles) {
            log::info!("Waiting for module {:?} to shutdown...", id);
            if let Err(e) = handle.await {
                log::error!("Module {:?} shutdown error: {}", id, e);
            }
        }

        self.module_senders.clear();

        self.running = false;
        log::info!("Module manager shutdown complete");
        Ok(())
    }

    /// Check if the manager is running
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    struct EchoModule {
        received: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AsyncModule for EchoModule {
        fn id(&self) -> ModuleId {
            ModuleId::Audio
        }

        async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn run(
            &mut self,
            mut rx: mpsc::Receiver<ModuleEvent>,
            tx: mpsc::Sender<ModuleMessage>,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            while let Some(event) = rx.recv().await {
                if event == ModuleEvent::Shutdown {
                    break;
                }
                self.received.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(ModuleMessage::Status(format!("{:?}", event))).await;
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_routes_events_and_shuts_down() {
        let received = Arc::new(AtomicUsize::new(0));
        let mut manager = ModuleManager::new();
        manager.register_module(Box::new(EchoModule {
            received: Arc::clone(&received),
        }));
        assert!(manager.has_module(ModuleId::Audio));
        assert!(!manager.has_module(ModuleId::Dmx));

        manager.initialize().await.unwrap();
        manager.start().await.unwrap();
        assert!(manager.start().await.is_err());

        let mut messages = manager.take_message_receiver().unwrap();
        manager
            .send_to_module(ModuleId::Audio, ModuleEvent::AudioStop)
            .await
            .unwrap();
        assert!(manager
            .send_to_module(ModuleId::Dmx, ModuleEvent::AudioStop)
            .await
            .is_err());

        match messages.recv().await {
            Some(ModuleMessage::Status(status)) => assert_eq!(status, "AudioStop"),
            other => panic!("unexpected message: {:?}", other),
        }

        manager.shutdown().await.unwrap();
        assert!(!manager.is_running());
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }
}
