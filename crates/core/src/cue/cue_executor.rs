use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::audio::audio_control::AudioControl;
use crate::console_state::FadeDefaults;
use crate::error::CueError;
use crate::listener::ExecutionListener;
use crate::scene::scene::SceneBank;

use super::cue::Cue;

/// Pause after the last step before another trigger is accepted. Debounces the GO button.
pub const SETTLE_TIME: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    Running,
    Settling,
}

/// What cue steps act on.
#[derive(Clone)]
pub struct CueContext {
    pub scenes: Arc<SceneBank>,
    pub defaults: Arc<FadeDefaults>,
    pub audio: Arc<dyn AudioControl>,
}

/// Runs one cue at a time on its own task: `Idle -> Running -> Settling -> Idle`.
pub struct CueExecutor {
    context: CueContext,
    state: Arc<Mutex<ExecutionState>>,
}

impl CueExecutor {
    pub fn new(context: CueContext) -> Self {
        Self {
            context,
            state: Arc::new(Mutex::new(ExecutionState::Idle)),
        }
    }

    pub fn state(&self) -> ExecutionState {
        *self.state.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == ExecutionState::Idle
    }

    /// Starts executing `cue` and returns at once. `listener` is told when the executor is
    /// idle again. Refused with [`CueError::Busy`] unless idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute(
        &self,
        cue: Arc<Cue>,
        listener: Arc<dyn ExecutionListener>,
    ) -> Result<JoinHandle<()>, CueError> {
        {
            let mut state = self.state.lock();
            if *state != ExecutionState::Idle {
                return Err(CueError::Busy);
            }
            *state = ExecutionState::Running;
        }

        let context = self.context.clone();
        let state = Arc::clone(&self.state);

        Ok(tokio::spawn(async move {
            log::info!("Executing cue '{}'", cue.title());
            for step in cue.steps() {
                log::debug!("Cue '{}': {:?}", cue.title(), step);
                step.execute(&context).await;
            }

            *state.lock() = ExecutionState::Settling;
            sleep(SETTLE_TIME).await;
            *state.lock() = ExecutionState::Idle;

            log::info!("Cue '{}' finished", cue.title());
            listener.execution_finished();
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::cue::cue_list::CueList;

    #[derive(Default)]
    struct RecordingAudio {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AudioControl for RecordingAudio {
        async fn play(&self, song: u32) {
            self.calls.lock().push(format!("play {}", song));
        }

        async fn stop(&self) {
            self.calls.lock().push("stop".to_string());
        }

        async fn set_volume(&self, percent: u8) {
            self.calls.lock().push(format!("volume {}", percent));
        }
    }

    fn executor() -> (CueExecutor, CueContext, Arc<RecordingAudio>) {
        let audio = Arc::new(RecordingAudio::default());
        let context = CueContext {
            scenes: Arc::new(SceneBank::new()),
            defaults: Arc::new(FadeDefaults::default()),
            audio: audio.clone(),
        };
        (CueExecutor::new(context.clone()), context, audio)
    }

    fn first_cue(script: &str) -> Arc<Cue> {
        CueList::parse(script).unwrap().upcoming().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_steps_in_order_then_settles() {
        let (executor, context, audio) = executor();
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let listener: Arc<dyn ExecutionListener> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cue = first_cue("CUE One\n\nVOLUME 30\nSCENE 2 UP 1\nDELAY 1.5\nPLAY 4\nSTOP\n");
        let start = Instant::now();
        let handle = executor.execute(cue, Arc::clone(&listener)).unwrap();
        assert_eq!(executor.state(), ExecutionState::Running);

        sleep(Duration::from_millis(1550)).await;
        assert_eq!(executor.state(), ExecutionState::Settling);
        assert!(context.scenes.is_showing(2));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        handle.await.unwrap();
        assert_eq!(executor.state(), ExecutionState::Idle);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= Duration::from_millis(1700));
        assert_eq!(*audio.calls.lock(), ["volume 30", "play 4", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_trigger_is_refused_until_idle() {
        let (executor, _context, _audio) = executor();
        let listener: Arc<dyn ExecutionListener> = Arc::new(|| {});
        let cue = first_cue("CUE One\n\nDELAY 1\n");

        let handle = executor
            .execute(Arc::clone(&cue), Arc::clone(&listener))
            .unwrap();
        assert_eq!(
            executor
                .execute(Arc::clone(&cue), Arc::clone(&listener))
                .unwrap_err(),
            CueError::Busy
        );

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(
            executor
                .execute(Arc::clone(&cue), Arc::clone(&listener))
                .unwrap_err(),
            CueError::Busy
        );

        handle.await.unwrap();
        assert!(executor.is_idle());
        executor.execute(cue, listener).unwrap().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_fade_is_read_when_step_runs() {
        let (executor, context, _audio) = executor();
        let cue = first_cue("CUE One\n\nSCENE 1 UP\nSCENE 3 DOWN\n");

        context.defaults.set_fade_in(Duration::from_millis(700));
        context.defaults.set_fade_out(Duration::from_millis(900));
        executor
            .execute(cue, Arc::new(|| {}))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(
            context.scenes.with_scene(1, |s| s.fade_duration()),
            Duration::from_millis(700)
        );
        assert_eq!(
            context.scenes.with_scene(3, |s| s.fade_duration()),
            Duration::from_millis(900)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_black_fades_every_scene_out() {
        let (executor, context, _audio) = executor();
        context.scenes.set_value(5, 1, 1.0);
        context.scenes.fade_in(5, Duration::ZERO);
        context.scenes.fade_in(9, Duration::ZERO);

        executor
            .execute(first_cue("CUE Out\n\nBLACK\n"), Arc::new(|| {}))
            .unwrap()
            .await
            .unwrap();

        for scene in 1..=16 {
            assert!(!context.scenes.is_showing(scene));
            assert!(!context.scenes.must_accumulate(scene));
        }
        assert_eq!(context.scenes.actual_values(5)[0], 0.0);
    }
}
