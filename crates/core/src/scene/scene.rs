use std::fmt;

use parking_lot::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

use crate::levels::{channel_index, clamp_level, Levels, CHANNELS, SCENES};

/// One stored look: the programmed fader positions of all channels plus the state of the
/// fade currently running on it.
///
/// All methods that depend on time take an explicit `now`, so the interpolation can be
/// driven by any clock. Scenes live inside a [`SceneBank`] which serializes access.
#[derive(Clone, Debug)]
pub struct Scene {
    number: usize,
    name: String,
    values: Levels,
    edit: bool,
    showing: bool,
    fade_start: Option<Instant>,
    fade_duration: Duration,
}

impl Scene {
    /// Creates a dark, hidden scene. The number is clamped to 1..=16.
    pub fn new(number: usize) -> Self {
        Self {
            number: number.clamp(1, SCENES),
            name: String::new(),
            values: [0.0; CHANNELS],
            edit: false,
            showing: false,
            fade_start: None,
            fade_duration: Duration::ZERO,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// In edit mode the scene always reports its programmed values, whatever its fade state.
    pub fn set_edit(&mut self, edit: bool) {
        self.edit = edit;
    }

    pub fn is_edit(&self) -> bool {
        self.edit
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn fade_duration(&self) -> Duration {
        self.fade_duration
    }

    /// Sets a programmed level. The channel is clamped to 1..=16, the value to 0..1.
    pub fn set_value(&mut self, channel: usize, value: f32) {
        self.values[channel_index(channel)] = clamp_level(value);
    }

    /// Returns a programmed level. The channel is clamped to 1..=16.
    pub fn value(&self, channel: usize) -> f32 {
        self.values[channel_index(channel)]
    }

    pub fn values(&self) -> Levels {
        self.values
    }

    /// Starts fading the scene in over `duration`, beginning at `now`.
    pub fn fade_in(&mut self, duration: Duration, now: Instant) {
        self.fade_duration = duration;
        self.fade_start = Some(now);
        self.showing = true;
    }

    /// Starts fading the scene out over `duration`, beginning at `now`.
    pub fn fade_out(&mut self, duration: Duration, now: Instant) {
        self.fade_duration = duration;
        self.fade_start = Some(now);
        self.showing = false;
    }

    /// Fraction of the current fade that has elapsed at `now`, in 0..=1.
    fn fade_progress(&self, now: Instant) -> f32 {
        if self.fade_duration.is_zero() {
            return 1.0;
        }
        let Some(start) = self.fade_start else {
            return 1.0;
        };
        let elapsed = now.saturating_duration_since(start).min(self.fade_duration);
        (elapsed.as_secs_f64() / self.fade_duration.as_secs_f64()) as f32
    }

    /// The levels this scene contributes at `now`, respecting edit mode and the running fade.
    pub fn actual_values(&self, now: Instant) -> Levels {
        if self.edit {
            return self.values;
        }

        let progress = self.fade_progress(now);
        let factor = if self.showing {
            progress
        } else {
            1.0 - progress
        };

        let mut levels = [0.0; CHANNELS];
        for (level, value) in levels.iter_mut().zip(self.values.iter()) {
            *level = value * factor;
        }
        levels
    }

    /// True if the scene is showing, being edited, or still fading out at `now`.
    pub fn must_accumulate(&self, now: Instant) -> bool {
        if self.showing || self.edit {
            return true;
        }
        match self.fade_start {
            Some(start) => now < start + self.fade_duration,
            None => false,
        }
    }

    /// Restores name and levels from a line written by the `Display` impl.
    ///
    /// The line must hold the name followed by exactly 16 integer levels (0..1000). On any
    /// mismatch the scene is left untouched and `false` is returned.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(';').collect();
        if fields.len() != CHANNELS + 1 {
            return false;
        }

        let mut values = [0.0; CHANNELS];
        for (value, field) in values.iter_mut().zip(&fields[1..]) {
            match field.trim().parse::<i32>() {
                Ok(v) => *value = clamp_level(v as f32 / 1000.0),
                Err(_) => return false,
            }
        }

        self.name = fields[0].to_string();
        self.values = values;
        true
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for value in &self.values {
            write!(f, ";{}", (f64::from(*value) * 1000.0) as i32)?;
        }
        Ok(())
    }
}

/// The 16 scenes of the console.
///
/// Every read and write goes through one lock shared by all scenes, so a transmitter cycle
/// that holds the guard sees a consistent snapshot while cue steps and operator edits run on
/// other tasks.
pub struct SceneBank {
    scenes: Mutex<[Scene; SCENES]>,
}

impl SceneBank {
    pub fn new() -> Self {
        Self {
            scenes: Mutex::new(std::array::from_fn(|i| Scene::new(i + 1))),
        }
    }

    /// Locks all scenes at once. Index 0 is scene 1.
    pub fn lock(&self) -> MutexGuard<'_, [Scene; SCENES]> {
        self.scenes.lock()
    }

    /// Runs `f` on one scene under the shared lock. The scene number is clamped to 1..=16.
    pub fn with_scene<R>(&self, scene: usize, f: impl FnOnce(&mut Scene) -> R) -> R {
        let mut scenes = self.scenes.lock();
        f(&mut scenes[scene.clamp(1, SCENES) - 1])
    }

    pub fn set_value(&self, scene: usize, channel: usize, value: f32) {
        self.with_scene(scene, |s| s.set_value(channel, value));
    }

    pub fn value(&self, scene: usize, channel: usize) -> f32 {
        self.with_scene(scene, |s| s.value(channel))
    }

    pub fn set_name(&self, scene: usize, name: impl Into<String>) {
        let name = name.into();
        self.with_scene(scene, |s| s.set_name(name));
    }

    pub fn name(&self, scene: usize) -> String {
        self.with_scene(scene, |s| s.name().to_string())
    }

    /// Puts `scene` into edit mode and every other scene out of it. `None` ends editing.
    pub fn edit_only(&self, scene: Option<usize>) {
        for s in self.scenes.lock().iter_mut() {
            s.set_edit(Some(s.number()) == scene);
        }
    }

    /// Number of the scene being edited.
    pub fn edited(&self) -> Option<usize> {
        self.scenes
            .lock()
            .iter()
            .find(|s| s.is_edit())
            .map(Scene::number)
    }

    /// Fades a hidden scene in over `fade_in`, a showing one out over `fade_out`.
    /// Returns whether the scene is showing afterwards.
    pub fn toggle(&self, scene: usize, fade_in: Duration, fade_out: Duration) -> bool {
        let now = Instant::now();
        self.with_scene(scene, |s| {
            if s.is_showing() {
                s.fade_out(fade_out, now);
            } else {
                s.fade_in(fade_in, now);
            }
            s.is_showing()
        })
    }

    pub fn fade_in(&self, scene: usize, duration: Duration) {
        let now = Instant::now();
        self.with_scene(scene, |s| s.fade_in(duration, now));
    }

    pub fn fade_out(&self, scene: usize, duration: Duration) {
        let now = Instant::now();
        self.with_scene(scene, |s| s.fade_out(duration, now));
    }

    /// Immediate blackout: every scene fades out with zero duration.
    pub fn black(&self) {
        let now = Instant::now();
        for scene in self.scenes.lock().iter_mut() {
            scene.fade_out(Duration::ZERO, now);
        }
    }

    pub fn actual_values(&self, scene: usize) -> Levels {
        let now = Instant::now();
        self.with_scene(scene, |s| s.actual_values(now))
    }

    pub fn must_accumulate(&self, scene: usize) -> bool {
        let now = Instant::now();
        self.with_scene(scene, |s| s.must_accumulate(now))
    }

    pub fn is_showing(&self, scene: usize) -> bool {
        self.with_scene(scene, |s| s.is_showing())
    }
}

impl Default for SceneBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn programmed(value: f32) -> Scene {
        let mut scene = Scene::new(1);
        for channel in 1..=CHANNELS {
            scene.set_value(channel, value);
        }
        scene
    }

    #[test]
    fn test_new_scene_clamps_number() {
        assert_eq!(Scene::new(0).number(), 1);
        assert_eq!(Scene::new(7).number(), 7);
        assert_eq!(Scene::new(40).number(), 16);
    }

    #[test]
    fn test_set_value_clamps() {
        let mut scene = Scene::new(1);
        for channel in 1..=CHANNELS {
            for v in [-3.0, -0.01, 0.0, 0.42, 1.0, 1.7, 100.0] {
                scene.set_value(channel, v);
                assert_eq!(scene.value(channel), v.clamp(0.0, 1.0));
            }
        }
    }

    #[test]
    fn test_out_of_range_channel_is_clamped() {
        let mut scene = Scene::new(1);
        scene.set_value(0, 0.3);
        assert_eq!(scene.value(1), 0.3);
        scene.set_value(40, 0.6);
        assert_eq!(scene.value(16), 0.6);
        assert_eq!(scene.value(99), 0.6);
    }

    #[test]
    fn test_fade_in_ramps_up() {
        let mut scene = programmed(0.8);
        let start = Instant::now();
        scene.fade_in(Duration::from_millis(1000), start);

        assert!(scene.actual_values(start)[0].abs() < 1e-6);
        let half = scene.actual_values(start + Duration::from_millis(500))[0];
        assert!((half - 0.4).abs() < 1e-4);
        assert_eq!(scene.actual_values(start + Duration::from_millis(1000))[0], 0.8);
        assert_eq!(scene.actual_values(start + Duration::from_secs(5))[0], 0.8);

        let mut last = 0.0;
        for ms in (0..=1000).step_by(50) {
            let level = scene.actual_values(start + Duration::from_millis(ms))[0];
            assert!(level >= last);
            last = level;
        }
    }

    #[test]
    fn test_fade_out_ramps_down() {
        let mut scene = programmed(0.6);
        let start = Instant::now();
        scene.fade_out(Duration::from_millis(2000), start);

        assert!((scene.actual_values(start)[3] - 0.6).abs() < 1e-6);
        let mut last = 1.0;
        for ms in (0..=2000).step_by(100) {
            let level = scene.actual_values(start + Duration::from_millis(ms))[3];
            assert!(level <= last);
            last = level;
        }
        assert_eq!(scene.actual_values(start + Duration::from_millis(2000))[3], 0.0);
    }

    #[test]
    fn test_zero_duration_fades_are_immediate() {
        let mut scene = programmed(0.5);
        let now = Instant::now();
        scene.fade_in(Duration::ZERO, now);
        assert_eq!(scene.actual_values(now), [0.5; CHANNELS]);
        scene.fade_out(Duration::ZERO, now);
        assert_eq!(scene.actual_values(now), [0.0; CHANNELS]);
    }

    #[test]
    fn test_edit_shows_programmed_values() {
        let mut scene = programmed(0.7);
        let now = Instant::now();
        scene.fade_out(Duration::ZERO, now);
        scene.set_edit(true);
        assert_eq!(scene.actual_values(now), [0.7; CHANNELS]);
    }

    #[test]
    fn test_must_accumulate() {
        let mut scene = programmed(1.0);
        let start = Instant::now();
        assert!(!scene.must_accumulate(start));

        scene.fade_in(Duration::from_millis(300), start);
        assert!(scene.must_accumulate(start + Duration::from_secs(10)));

        scene.fade_out(Duration::from_millis(300), start);
        assert!(scene.must_accumulate(start + Duration::from_millis(299)));
        assert!(!scene.must_accumulate(start + Duration::from_millis(300)));

        scene.set_edit(true);
        assert!(scene.must_accumulate(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_line_round_trip() {
        let mut scene = Scene::new(4);
        scene.set_name("Warm wash");
        for channel in 1..=CHANNELS {
            scene.set_value(channel, channel as f32 / 17.0);
        }

        let line = scene.to_string();
        assert!(line.starts_with("Warm wash;"));

        let mut restored = Scene::new(4);
        assert!(restored.parse_line(&line));
        assert_eq!(restored.name(), "Warm wash");
        for channel in 1..=CHANNELS {
            assert!((restored.value(channel) - scene.value(channel)).abs() <= 0.001);
        }
    }

    #[test]
    fn test_display_truncates_to_thousandths() {
        let mut scene = Scene::new(1);
        scene.set_value(1, 0.5);
        scene.set_value(2, 0.9999);
        assert!(scene.to_string().starts_with(";500;999;0;"));
    }

    #[test]
    fn test_parse_line_rejects_wrong_field_count() {
        let mut scene = programmed(0.25);
        scene.set_name("Keep");
        assert!(!scene.parse_line("Other;1;2;3"));
        assert!(!scene.parse_line("Other;1;2;3;4;5;6;7;8;9;10;11;12;13;14;15;16;17"));
        assert!(!scene.parse_line("Other;1;2;3;4;5;6;7;8;9;10;11;12;13;14;15;x"));
        assert_eq!(scene.name(), "Keep");
        assert_eq!(scene.values(), [0.25; CHANNELS]);
    }

    #[test]
    fn test_bank_black_fades_out_everything() {
        let bank = SceneBank::new();
        for n in 1..=SCENES {
            bank.set_value(n, 1, 1.0);
            bank.fade_in(n, Duration::ZERO);
        }
        bank.black();
        for n in 1..=SCENES {
            assert!(!bank.is_showing(n));
            assert_eq!(bank.actual_values(n), [0.0; CHANNELS]);
            assert!(!bank.must_accumulate(n));
        }
    }

    #[test]
    fn test_bank_edit_is_exclusive() {
        let bank = SceneBank::new();
        bank.edit_only(Some(3));
        bank.edit_only(Some(5));
        assert_eq!(bank.edited(), Some(5));
        assert!(!bank.with_scene(3, |s| s.is_edit()));

        bank.edit_only(None);
        assert_eq!(bank.edited(), None);
        assert!(bank.lock().iter().all(|s| !s.is_edit()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bank_toggle_uses_matching_fade() {
        let bank = SceneBank::new();
        bank.set_value(2, 1, 1.0);

        assert!(bank.toggle(2, Duration::from_millis(1000), Duration::from_millis(4000)));
        assert_eq!(bank.with_scene(2, |s| s.fade_duration()), Duration::from_millis(1000));
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(bank.actual_values(2)[0], 1.0);

        assert!(!bank.toggle(2, Duration::from_millis(1000), Duration::from_millis(4000)));
        assert_eq!(bank.with_scene(2, |s| s.fade_duration()), Duration::from_millis(4000));
        tokio::time::advance(Duration::from_millis(2000)).await;
        assert!((bank.actual_values(2)[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_bank_scene_numbers_are_fixed() {
        let bank = SceneBank::new();
        let scenes = bank.lock();
        for (i, scene) in scenes.iter().enumerate() {
            assert_eq!(scene.number(), i + 1);
        }
    }
}
