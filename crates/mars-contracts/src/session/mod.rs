mod history;
mod manifest;

pub use history::{SessionEntry, SessionHistory};
pub use manifest::{SessionManifest, TurnEntry};
