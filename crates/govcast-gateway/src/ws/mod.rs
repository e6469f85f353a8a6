pub mod connection;
pub mod handshake;
pub mod message;
pub mod send;
