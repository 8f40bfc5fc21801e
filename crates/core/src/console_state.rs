use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Global operating modes of the console.
///
/// Written only from the operator side; the transmitter and cue tasks just read them.
#[derive(Debug, Default)]
pub struct ConsoleFlags {
    live: AtomicBool,
    edit: AtomicBool,
}

impl ConsoleFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live mode: channels are driven directly and scene accumulation is suspended.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::Relaxed);
    }

    /// Edit mode: a scene is being programmed on the faders.
    pub fn is_edit(&self) -> bool {
        self.edit.load(Ordering::Relaxed)
    }

    pub fn set_edit(&self, edit: bool) {
        self.edit.store(edit, Ordering::Relaxed);
    }

    /// Fader refresh from the output is suppressed while the operator drives them directly.
    pub fn ui_refresh_enabled(&self) -> bool {
        !self.is_live() && !self.is_edit()
    }
}

/// One notch of operator adjustment of a default fade time.
pub const FADE_STEP: Duration = Duration::from_millis(200);

/// Longest default fade the operator can dial in.
pub const MAX_DEFAULT_FADE: Duration = Duration::from_secs(10);

fn stepped(current: &AtomicU64, notches: i32) -> Duration {
    let step = FADE_STEP.as_millis() as i64;
    let max = MAX_DEFAULT_FADE.as_millis() as i64;
    let mut result = 0;
    let _ = current.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |ms| {
        result = (ms as i64 + i64::from(notches) * step).clamp(0, max) as u64;
        Some(result)
    });
    Duration::from_millis(result)
}

/// Fade times used by scene steps and scene toggles that do not name their own.
///
/// Read at the moment a step executes, so changes apply to cues already loaded.
#[derive(Debug)]
pub struct FadeDefaults {
    fade_in_ms: AtomicU64,
    fade_out_ms: AtomicU64,
}

impl FadeDefaults {
    pub fn new(fade_in: Duration, fade_out: Duration) -> Self {
        Self {
            fade_in_ms: AtomicU64::new(fade_in.as_millis() as u64),
            fade_out_ms: AtomicU64::new(fade_out.as_millis() as u64),
        }
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms.load(Ordering::Relaxed))
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms.load(Ordering::Relaxed))
    }

    pub fn set_fade_in(&self, fade_in: Duration) {
        self.fade_in_ms
            .store(fade_in.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_fade_out(&self, fade_out: Duration) {
        self.fade_out_ms
            .store(fade_out.as_millis() as u64, Ordering::Relaxed);
    }

    /// Moves the fade-in time by `notches` of [`FADE_STEP`], kept within 0..=10s.
    pub fn step_fade_in(&self, notches: i32) -> Duration {
        stepped(&self.fade_in_ms, notches)
    }

    /// Moves the fade-out time by `notches` of [`FADE_STEP`], kept within 0..=10s.
    pub fn step_fade_out(&self, notches: i32) -> Duration {
        stepped(&self.fade_out_ms, notches)
    }
}

impl Default for FadeDefaults {
    fn default() -> Self {
        Self::new(Duration::from_millis(1200), Duration::from_millis(3000))
    }
}
