//! Command routing between the host and a player that may not exist yet.
//!
//! The router is a plain state machine: it never awaits. Resolution, player
//! mounting and persistence are requested through [`Effect`]s and their
//! outcomes are fed back in by the session task.

use crate::error::App;
use crate::player::PlayerController;
use crate::resolve::{display_url, PlayItem, SubtitleTrack};
use crate::server::subtitle_redirect;
use crate::store::ResumeStore;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::PathBuf;

pub type StampCallback = Box<dyn FnOnce(Stamp) + Send>;

pub enum PlayerCommand {
    Play {
        url: String,
        seek_seconds: Option<f64>,
    },
    Seek {
        offset_seconds: f64,
    },
    SeekTo {
        seconds: f64,
    },
    Toggle,
    GetStamp(StampCallback),
    Action(ActionKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    OpenLocalFile(PathBuf),
    AddSubtitles(Vec<PathBuf>),
    CaptureSnapshot,
    Close,
}

/// Work the router cannot do itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Resolve(String),
    MountPlayer,
    Persist,
    CaptureSnapshot,
    Notice(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    pub source_url: Option<String>,
    pub play_item: Option<PlayItem>,
    pub seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    NoPlayer,
    PlayerReady,
}

pub struct CommandRouter {
    store: ResumeStore,
    server_port: u16,
    player: Option<Box<dyn PlayerController>>,
    active_url: Option<String>,
    item: Option<PlayItem>,
    loaded: bool,
    pending_seek: Option<f64>,
    playing: bool,
}

impl CommandRouter {
    pub fn new(store: ResumeStore, server_port: u16) -> Self {
        Self {
            store,
            server_port,
            player: None,
            active_url: None,
            item: None,
            loaded: false,
            pending_seek: None,
            playing: false,
        }
    }

    pub fn state(&self) -> RouterState {
        if self.player.is_some() {
            RouterState::PlayerReady
        } else {
            RouterState::NoPlayer
        }
    }

    pub fn active_url(&self) -> Option<&str> {
        self.active_url.as_deref()
    }

    pub fn active_item(&self) -> Option<&PlayItem> {
        self.item.as_ref()
    }

    pub fn pending_seek(&self) -> Option<f64> {
        self.pending_seek
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn store(&self) -> &ResumeStore {
        &self.store
    }

    pub fn handle(&mut self, command: PlayerCommand) -> Vec<Effect> {
        match command {
            PlayerCommand::Play { url, seek_seconds } => self.play(&url, seek_seconds),
            PlayerCommand::Seek { offset_seconds } => {
                let now = self.loaded_player().and_then(|p| p.current_time());
                match now {
                    Some(now) => self.seek_to((now + offset_seconds).max(0.0)),
                    None => debug!("Dropping seek by {offset_seconds}s, nothing is playing"),
                }
                Vec::new()
            }
            PlayerCommand::SeekTo { seconds } => {
                if self.loaded_player().is_some() {
                    self.seek_to(seconds);
                } else {
                    debug!("Dropping seek to {seconds}s, nothing is playing");
                }
                Vec::new()
            }
            PlayerCommand::Toggle => {
                self.toggle();
                Vec::new()
            }
            PlayerCommand::GetStamp(callback) => {
                callback(self.stamp());
                Vec::new()
            }
            PlayerCommand::Action(kind) => self.action(kind),
        }
    }

    /// Current source, item and position. All empty while no player exists.
    pub fn stamp(&self) -> Stamp {
        let Some(player) = self.player.as_deref() else {
            return Stamp::default();
        };
        Stamp {
            source_url: self.active_url.clone(),
            play_item: self.item.clone(),
            seconds: if self.loaded {
                player.current_time()
            } else {
                None
            },
        }
    }

    fn play(&mut self, url: &str, seek_seconds: Option<f64>) -> Vec<Effect> {
        let url = url.trim();
        let Some(display) = display_url(url) else {
            warn!("Refusing to play {url:?}");
            return vec![Effect::Notice(
                App::InvalidSource(url.to_string()).to_string(),
            )];
        };
        let seconds = seek_seconds.unwrap_or_else(|| self.store.start_position(&display));

        if self.loaded && self.active_url.as_deref() == Some(url) {
            info!("{url} already loaded, seeking to {seconds}s");
            self.seek_to(seconds);
            self.set_playing(true);
            return Vec::new();
        }

        let mut effects = Vec::new();
        if self.remember_position() {
            effects.push(Effect::Persist);
        }
        // The outgoing item stops here, whatever becomes of the new resolution.
        if let Some(player) = self.player.as_deref_mut().filter(|_| self.loaded) {
            log_failure(player.set_playing(false), "pause outgoing item");
        }
        info!("Activating {url} at {seconds}s");
        self.active_url = Some(url.to_string());
        self.item = None;
        self.loaded = false;
        self.playing = true;
        self.pending_seek = Some(seconds);
        if self.player.is_none() {
            effects.push(Effect::MountPlayer);
        }
        effects.push(Effect::Resolve(url.to_string()));
        effects
    }

    /// Installs the outcome of a resolution, unless a newer play command took
    /// over in the meantime.
    pub fn on_resolved(&mut self, url: &str, result: Result<PlayItem, App>) -> Vec<Effect> {
        if self.active_url.as_deref() != Some(url) {
            debug!("Discarding stale resolution of {url}");
            return Vec::new();
        }
        match result {
            Ok(item) => {
                self.item = Some(item);
                self.load_into_player();
                Vec::new()
            }
            Err(e) => {
                error!("Failed to resolve {url}: {e}");
                self.active_url = None;
                self.pending_seek = None;
                self.playing = false;
                vec![Effect::Notice(e.to_string())]
            }
        }
    }

    pub fn on_player_ready(&mut self, player: Box<dyn PlayerController>) {
        info!("Player ready");
        self.player = Some(player);
        self.loaded = false;
        self.load_into_player();
    }

    /// The player's view went away.
    pub fn teardown(&mut self) -> Vec<Effect> {
        info!("Tearing down player");
        self.release()
    }

    pub fn clear_source(&mut self) -> Vec<Effect> {
        info!("Clearing source");
        self.release()
    }

    fn release(&mut self) -> Vec<Effect> {
        self.remember_position();
        self.player = None;
        self.active_url = None;
        self.item = None;
        self.loaded = false;
        self.pending_seek = None;
        self.playing = false;
        vec![Effect::Persist]
    }

    fn action(&mut self, kind: ActionKind) -> Vec<Effect> {
        match kind {
            ActionKind::OpenLocalFile(path) => self.play(&path.to_string_lossy(), None),
            ActionKind::AddSubtitles(paths) => self.add_subtitles(&paths),
            ActionKind::CaptureSnapshot => vec![Effect::CaptureSnapshot],
            ActionKind::Close => self.teardown(),
        }
    }

    fn add_subtitles(&mut self, paths: &[PathBuf]) -> Vec<Effect> {
        let Some(item) = self.item.as_mut() else {
            return vec![Effect::Notice(
                "Player is not working right now".to_string(),
            )];
        };
        for path in paths {
            let label = path
                .file_name()
                .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy());
            item.subtitles.push(SubtitleTrack::subtitles(
                label,
                subtitle_redirect(self.server_port, &path.to_string_lossy()),
            ));
        }
        if let Some(player) = self.player.as_deref_mut().filter(|_| self.loaded) {
            let position = player.current_time();
            if let Err(e) = player.load(&item.playing_url, &item.subtitles) {
                error!("Failed to reload with subtitles: {e}");
                return Vec::new();
            }
            if let Some(position) = position {
                log_failure(player.seek_to(position), "seek");
            }
            log_failure(player.set_playing(self.playing), "resume");
        }
        Vec::new()
    }

    fn load_into_player(&mut self) {
        let (Some(player), Some(item)) = (self.player.as_deref_mut(), self.item.as_ref()) else {
            return;
        };
        if self.loaded {
            return;
        }
        if let Err(e) = player.load(&item.playing_url, &item.subtitles) {
            error!("Player failed to load {}: {e}", item.display_url);
            return;
        }
        self.loaded = true;
        if let Some(seconds) = self.pending_seek.take() {
            log_failure(player.seek_to(seconds), "seek");
        }
        log_failure(player.set_playing(self.playing), "start playback");
    }

    fn loaded_player(&self) -> Option<&dyn PlayerController> {
        self.player.as_deref().filter(|_| self.loaded)
    }

    fn seek_to(&mut self, seconds: f64) {
        if let Some(player) = self.player.as_deref_mut().filter(|_| self.loaded) {
            log_failure(player.seek_to(seconds), "seek");
        }
    }

    fn toggle(&mut self) {
        if self.player.is_none() {
            debug!("Ignoring toggle without a player");
            return;
        }
        self.set_playing(!self.playing);
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        if let Some(player) = self.player.as_deref_mut().filter(|_| self.loaded) {
            log_failure(player.set_playing(playing), "toggle playback");
        }
    }

    fn remember_position(&mut self) -> bool {
        let Some(item) = self.item.as_ref() else {
            return false;
        };
        let Some(seconds) = self.loaded_player().and_then(|p| p.current_time()) else {
            return false;
        };
        debug!("Remembering {} at {seconds}s", item.display_url);
        let display = item.display_url.clone();
        self.store.set(&display, seconds);
        true
    }
}

fn log_failure(result: Result<(), App>, what: &str) {
    if let Err(e) = result {
        error!("Failed to {what}: {e}");
    }
}
