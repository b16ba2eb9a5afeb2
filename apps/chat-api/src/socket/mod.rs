pub mod events;
pub mod handshake;
pub mod rooms;
pub mod server;
