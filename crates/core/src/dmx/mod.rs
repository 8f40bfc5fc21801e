pub mod transmitter;
