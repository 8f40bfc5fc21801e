use serde::{Deserialize, Serialize};

use crate::levels::{CHANNELS, UNIVERSE_SIZE};

/// Maps each logical channel (1..16) to a physical DMX address (1..512).
///
/// Loaded once from the settings and read-only afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPatch {
    addresses: [u16; CHANNELS],
}

impl ChannelPatch {
    /// Builds a patch from 1-based addresses. Addresses are clamped to 1..=512.
    pub fn new(addresses: [u16; CHANNELS]) -> Self {
        Self {
            addresses: addresses.map(|a| a.clamp(1, UNIVERSE_SIZE as u16)),
        }
    }

    /// Channel n on address n.
    pub fn identity() -> Self {
        Self::new(std::array::from_fn(|i| i as u16 + 1))
    }

    /// Physical address (1..=512) of a logical channel, `None` if the channel is out of range.
    pub fn address(&self, channel: usize) -> Option<u16> {
        if (1..=CHANNELS).contains(&channel) {
            Some(self.addresses[channel - 1])
        } else {
            None
        }
    }

    /// Zero-based frame buffer offsets, index 0 is channel 1.
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.addresses.iter().map(|a| *a as usize - 1)
    }

    pub fn addresses(&self) -> &[u16; CHANNELS] {
        &self.addresses
    }
}

impl Default for ChannelPatch {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_patch() {
        let patch = ChannelPatch::identity();
        assert_eq!(patch.address(1), Some(1));
        assert_eq!(patch.address(16), Some(16));
        assert_eq!(patch.address(0), None);
        assert_eq!(patch.address(17), None);
    }

    #[test]
    fn test_addresses_are_clamped() {
        let mut addresses = [1; CHANNELS];
        addresses[0] = 0;
        addresses[1] = 600;
        let patch = ChannelPatch::new(addresses);
        assert_eq!(patch.address(1), Some(1));
        assert_eq!(patch.address(2), Some(512));
        assert_eq!(patch.offsets().nth(1), Some(511));
    }
}
