pub mod artnet;
pub mod network_config;
