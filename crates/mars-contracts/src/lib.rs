pub mod chat;
pub mod events;
pub mod models;
pub mod params;
pub mod playback;
pub mod session;
