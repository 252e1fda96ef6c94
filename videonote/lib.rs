pub mod bilibili;
pub mod classify;
pub mod dbus;
pub mod error;
pub mod note;
pub mod player;
pub mod resolve;
pub mod router;
pub mod server;
pub mod session;
pub mod settings;
pub mod store;

pub use classify::{classify, clean, SourceKind};
pub use error::App;
pub use resolve::{PlayItem, Resolver, SubtitleTrack};
pub use router::{ActionKind, CommandRouter, PlayerCommand, Stamp};
