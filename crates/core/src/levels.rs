/// Number of logical channels (faders) on the console.
pub const CHANNELS: usize = 16;

/// Number of stored scenes.
pub const SCENES: usize = 16;

/// Size of one DMX universe; every frame carries the full payload.
pub const UNIVERSE_SIZE: usize = 512;

/// One 0..1 level per logical channel, index 0 is channel 1.
pub type Levels = [f32; CHANNELS];

/// Clamps a 1-based logical channel number into 1..=CHANNELS and returns its array index.
pub fn channel_index(channel: usize) -> usize {
    channel.clamp(1, CHANNELS) - 1
}

/// Returns the array index of a 1-based logical channel, or `None` if it is out of range.
pub fn checked_channel_index(channel: usize) -> Option<usize> {
    if (1..=CHANNELS).contains(&channel) {
        Some(channel - 1)
    } else {
        None
    }
}

/// Clamps a level into 0..1. NaN is treated as dark.
pub fn clamp_level(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Translates a logical 0..1 level to the DMX 0..255 range.
///
/// Linear for now; a pre-heat or non-linear dimmer curve would go here.
pub fn translate_level(level: f32) -> u8 {
    ((level * 255.0).round() as i32 & 0xFF) as u8
}
