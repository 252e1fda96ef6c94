//! The single task that owns the router. Every state change goes through its
//! queue, so the router itself needs no locking.

use crate::error::App;
use crate::player::{PlayerController, PlayerHost};
use crate::resolve::{PlayItem, Resolver};
use crate::router::{ActionKind, CommandRouter, Effect, PlayerCommand, Stamp};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{self, JoinHandle};

pub enum Message {
    Command(PlayerCommand),
    PlayerReady(Box<dyn PlayerController>),
    Resolved {
        url: String,
        result: Result<PlayItem, App>,
    },
    Teardown,
    ClearSource,
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Message>,
    notices: watch::Receiver<Option<String>>,
}

impl SessionHandle {
    pub async fn send(&self, command: PlayerCommand) -> Result<(), App> {
        self.tx.send(Message::Command(command)).await?;
        Ok(())
    }

    pub async fn play(&self, url: &str, seek_seconds: Option<f64>) -> Result<(), App> {
        self.send(PlayerCommand::Play {
            url: url.to_string(),
            seek_seconds,
        })
        .await
    }

    pub async fn seek(&self, offset_seconds: f64) -> Result<(), App> {
        self.send(PlayerCommand::Seek { offset_seconds }).await
    }

    pub async fn seek_to(&self, seconds: f64) -> Result<(), App> {
        self.send(PlayerCommand::SeekTo { seconds }).await
    }

    pub async fn toggle(&self) -> Result<(), App> {
        self.send(PlayerCommand::Toggle).await
    }

    pub async fn action(&self, kind: ActionKind) -> Result<(), App> {
        self.send(PlayerCommand::Action(kind)).await
    }

    pub async fn add_subtitles(&self, paths: Vec<PathBuf>) -> Result<(), App> {
        self.action(ActionKind::AddSubtitles(paths)).await
    }

    pub async fn stamp(&self) -> Result<Stamp, App> {
        let (reply, receiver) = oneshot::channel();
        let callback = Box::new(move |stamp: Stamp| {
            let _ = reply.send(stamp);
        });
        self.send(PlayerCommand::GetStamp(callback)).await?;
        Ok(receiver.await?)
    }

    pub async fn player_ready(&self, player: Box<dyn PlayerController>) -> Result<(), App> {
        self.tx.send(Message::PlayerReady(player)).await?;
        Ok(())
    }

    pub async fn teardown(&self) -> Result<(), App> {
        self.tx.send(Message::Teardown).await?;
        Ok(())
    }

    pub async fn clear_source(&self) -> Result<(), App> {
        self.tx.send(Message::ClearSource).await?;
        Ok(())
    }

    pub fn last_notice(&self) -> Option<String> {
        self.notices.borrow().clone()
    }

    /// Tears the player down, persists and stops the session task.
    pub async fn shutdown(&self) -> Result<(), App> {
        let (done, receiver) = oneshot::channel();
        self.tx.send(Message::Shutdown(done)).await?;
        Ok(receiver.await?)
    }
}

struct Session {
    router: CommandRouter,
    resolver: Arc<Resolver>,
    host: Box<dyn PlayerHost>,
    tx: mpsc::Sender<Message>,
    notices: watch::Sender<Option<String>>,
}

pub fn spawn(
    router: CommandRouter,
    resolver: Resolver,
    host: Box<dyn PlayerHost>,
) -> (SessionHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(32);
    let (notices, notice_receiver) = watch::channel(None);
    let session = Session {
        router,
        resolver: Arc::new(resolver),
        host,
        tx: tx.clone(),
        notices,
    };
    let handle = task::spawn(session.run(rx));
    (
        SessionHandle {
            tx,
            notices: notice_receiver,
        },
        handle,
    )
}

impl Session {
    async fn run(mut self, mut rx: mpsc::Receiver<Message>) {
        while let Some(message) = rx.recv().await {
            let effects = match message {
                Message::Command(command) => self.router.handle(command),
                Message::PlayerReady(player) => {
                    self.router.on_player_ready(player);
                    Vec::new()
                }
                Message::Resolved { url, result } => self.router.on_resolved(&url, result),
                Message::Teardown => self.router.teardown(),
                Message::ClearSource => self.router.clear_source(),
                Message::Shutdown(done) => {
                    let effects = self.router.teardown();
                    self.apply(effects).await;
                    info!("Session stopped");
                    let _ = done.send(());
                    return;
                }
            };
            self.apply(effects).await;
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Resolve(url) => self.spawn_resolution(url),
                Effect::MountPlayer => match self.host.mount() {
                    Ok(player) => self.router.on_player_ready(player),
                    Err(e) => self.notice(format!("Failed to open the player: {e}")),
                },
                Effect::Persist => {
                    if let Err(e) = self.router.store().save().await {
                        error!("Failed to save settings: {e}");
                    }
                }
                Effect::CaptureSnapshot => {
                    if let Some(notice) = self.host.capture_snapshot() {
                        self.notice(notice);
                    }
                }
                Effect::Notice(notice) => self.notice(notice),
            }
        }
    }

    fn spawn_resolution(&self, url: String) {
        let resolver = Arc::clone(&self.resolver);
        let tx = self.tx.clone();
        task::spawn(async move {
            let result = resolver.resolve(&url).await;
            if tx.send(Message::Resolved { url, result }).await.is_err() {
                warn!("Session closed before resolution finished");
            }
        });
    }

    fn notice(&self, notice: String) {
        warn!("{notice}");
        self.notices.send_replace(Some(notice));
    }
}
