use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use artnet_protocol::{ArtCommand, Output};
use serde::{Deserialize, Serialize};

use crate::error::ArtNetError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ArtNetMode {
    Broadcast,
    /// Specify from (interface) + to (destination) addresses
    Unicast(SocketAddr, SocketAddr),
}

/// Anything a full DMX frame can be sent to.
pub trait DmxOutput: Send + Sync {
    fn send_frame(&self, universe: u8, data: &[u8]) -> Result<(), ArtNetError>;
}

pub struct ArtNet {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl ArtNet {
    pub fn new(mode: ArtNetMode, port: u16) -> Result<Self, ArtNetError> {
        match mode {
            ArtNetMode::Broadcast => {
                let socket = UdpSocket::bind(("0.0.0.0", 0))?;
                socket.set_broadcast(true)?;
                let destination = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port);
                log::debug!("Art-Net broadcast to {}", destination);
                Ok(Self {
                    socket,
                    destination,
                })
            }
            ArtNetMode::Unicast(src, destination) => {
                log::debug!(
                    "Art-Net unicast from interface {} to destination {}",
                    src,
                    destination
                );
                let socket = UdpSocket::bind(src)?;
                socket.set_broadcast(false)?;
                Ok(Self {
                    socket,
                    destination,
                })
            }
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl DmxOutput for ArtNet {
    fn send_frame(&self, universe: u8, data: &[u8]) -> Result<(), ArtNetError> {
        let command = ArtCommand::Output(Output {
            port_address: universe.into(),
            data: data.to_vec().into(),
            ..Output::default()
        });

        let bytes = command
            .write_to_buffer()
            .map_err(|e| ArtNetError::Encode(format!("{:?}", e)))?;
        self.socket.send_to(&bytes, self.destination)?;
        Ok(())
    }
}
