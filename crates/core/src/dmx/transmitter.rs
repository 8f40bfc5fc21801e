use tokio::time::Instant;

use crate::levels::{checked_channel_index, clamp_level, translate_level, Levels, CHANNELS, UNIVERSE_SIZE};
use crate::patch::ChannelPatch;
use crate::scene::scene::SceneBank;

/// Per-cycle output state: the merged logical levels and the DMX frame built from them.
///
/// Owned by the DMX module task; nothing else writes to it.
pub struct Transmitter {
    patch: ChannelPatch,
    accumulator: Levels,
    frame: [u8; UNIVERSE_SIZE],
}

/// Channel-wise maximum. A scene fading in over one fading out never dips below either.
pub fn merge_max(accumulator: &mut Levels, contribution: &Levels) {
    for (acc, level) in accumulator.iter_mut().zip(contribution.iter()) {
        if *level > *acc {
            *acc = *level;
        }
    }
}

impl Transmitter {
    pub fn new(patch: ChannelPatch) -> Self {
        Self {
            patch,
            accumulator: [0.0; CHANNELS],
            frame: [0; UNIVERSE_SIZE],
        }
    }

    /// Rebuilds the logical levels from every scene that currently contributes light.
    ///
    /// All scenes are read under one lock so the result is consistent for `now`.
    pub fn accumulate(&mut self, scenes: &SceneBank, now: Instant) {
        self.accumulator = [0.0; CHANNELS];
        let scenes = scenes.lock();
        for scene in scenes.iter() {
            if !scene.must_accumulate(now) {
                continue;
            }
            merge_max(&mut self.accumulator, &scene.actual_values(now));
        }
    }

    /// Drives a logical channel directly. Only meaningful in live mode, where accumulation
    /// is skipped and the value stays until changed.
    pub fn set_live_level(&mut self, channel: usize, level: f32) {
        if let Some(index) = checked_channel_index(channel) {
            self.accumulator[index] = clamp_level(level);
        }
    }

    /// Writes a physical DMX address (1..=512) directly, bypassing the patch.
    pub fn set_direct(&mut self, address: usize, value: u8) {
        if (1..=UNIVERSE_SIZE).contains(&address) {
            self.frame[address - 1] = value;
        }
    }

    /// Copies the logical levels into the frame through the patch.
    pub fn render(&mut self) -> &[u8; UNIVERSE_SIZE] {
        for (offset, level) in self.patch.offsets().zip(self.accumulator.iter()) {
            self.frame[offset] = translate_level(*level);
        }
        &self.frame
    }

    /// One output cycle. In live mode the held levels are used as they are.
    pub fn cycle(&mut self, scenes: &SceneBank, live: bool, now: Instant) -> &[u8; UNIVERSE_SIZE] {
        if !live {
            self.accumulate(scenes, now);
        }
        self.render()
    }

    pub fn levels(&self) -> &Levels {
        &self.accumulator
    }

    pub fn frame(&self) -> &[u8; UNIVERSE_SIZE] {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Duration;

    use super::*;

    #[test]
    fn test_merge_takes_channel_maximum() {
        let mut acc = [0.0; CHANNELS];
        let mut a = [0.0; CHANNELS];
        let mut b = [0.0; CHANNELS];
        a[0] = 0.3;
        a[1] = 0.8;
        b[0] = 0.5;
        b[1] = 0.2;
        merge_max(&mut acc, &a);
        merge_max(&mut acc, &b);
        assert_eq!(acc[0], 0.5);
        assert_eq!(acc[1], 0.8);
    }

    #[test]
    fn test_accumulates_only_contributing_scenes() {
        let scenes = SceneBank::new();
        let now = Instant::now();
        scenes.with_scene(1, |s| {
            s.set_value(1, 0.3);
            s.set_value(2, 0.8);
            s.fade_in(Duration::ZERO, now);
        });
        scenes.with_scene(2, |s| {
            s.set_value(1, 0.5);
            s.set_value(2, 0.2);
            s.fade_in(Duration::ZERO, now);
        });
        // Programmed but never shown.
        scenes.set_value(3, 1, 1.0);

        let mut transmitter = Transmitter::new(ChannelPatch::identity());
        transmitter.accumulate(&scenes, now);
        assert_eq!(transmitter.levels()[0], 0.5);
        assert_eq!(transmitter.levels()[1], 0.8);
    }

    #[test]
    fn test_render_applies_patch() {
        let mut addresses: [u16; CHANNELS] = std::array::from_fn(|i| i as u16 + 1);
        addresses[0] = 100;
        let scenes = SceneBank::new();
        let now = Instant::now();
        scenes.with_scene(5, |s| {
            s.set_value(1, 1.0);
            s.fade_in(Duration::ZERO, now);
        });

        let mut transmitter = Transmitter::new(ChannelPatch::new(addresses));
        let frame = transmitter.cycle(&scenes, false, now);
        assert_eq!(frame[99], 255);
        assert_eq!(frame[0], 0);
        assert_eq!(frame.len(), UNIVERSE_SIZE);
    }

    #[test]
    fn test_live_mode_keeps_direct_levels() {
        let scenes = SceneBank::new();
        let now = Instant::now();
        scenes.with_scene(1, |s| {
            s.set_value(2, 1.0);
            s.fade_in(Duration::ZERO, now);
        });

        let mut transmitter = Transmitter::new(ChannelPatch::identity());
        transmitter.set_live_level(1, 0.5);
        transmitter.set_live_level(99, 1.0);
        let frame = transmitter.cycle(&scenes, true, now);
        assert_eq!(frame[0], 128);
        assert_eq!(frame[1], 0);

        let frame = transmitter.cycle(&scenes, false, now);
        assert_eq!(frame[0], 0);
        assert_eq!(frame[1], 255);
    }

    #[test]
    fn test_direct_writes_outside_patch_survive_cycles() {
        let scenes = SceneBank::new();
        let mut transmitter = Transmitter::new(ChannelPatch::identity());
        transmitter.set_direct(51, 255);
        transmitter.set_direct(0, 1);
        transmitter.set_direct(513, 1);
        let frame = transmitter.cycle(&scenes, false, Instant::now());
        assert_eq!(frame[50], 255);
    }
}
