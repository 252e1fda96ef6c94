use crate::router::ActionKind;
use crate::session::SessionHandle;
use log::info;
use std::path::PathBuf;
use tokio::sync::watch;
use zbus::{fdo, interface, ConnectionBuilder};

pub const SERVICE_NAME: &str = "org.videonote.Player";
pub const OBJECT_PATH: &str = "/org/videonote/Player";

#[derive(Clone)]
pub struct PlayerDBus {
    session: SessionHandle,
    stop_signal: watch::Sender<()>,
}

#[interface(name = "org.videonote.Player")]
impl PlayerDBus {
    async fn test_connection(&self) -> fdo::Result<()> {
        Ok(())
    }

    async fn play(&self, url: String) -> fdo::Result<()> {
        Ok(self.session.play(&url, None).await?)
    }

    async fn play_at(&self, url: String, seconds: f64) -> fdo::Result<()> {
        Ok(self.session.play(&url, Some(seconds)).await?)
    }

    async fn seek(&self, offset: f64) -> fdo::Result<()> {
        Ok(self.session.seek(offset).await?)
    }

    async fn seek_to(&self, seconds: f64) -> fdo::Result<()> {
        Ok(self.session.seek_to(seconds).await?)
    }

    async fn toggle(&self) -> fdo::Result<()> {
        Ok(self.session.toggle().await?)
    }

    /// Current stamp as JSON; every field is null while no player exists.
    async fn stamp(&self) -> fdo::Result<String> {
        let stamp = self.session.stamp().await?;
        serde_json::to_string(&stamp).map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    async fn open_file(&self, path: String) -> fdo::Result<()> {
        Ok(self
            .session
            .action(ActionKind::OpenLocalFile(PathBuf::from(path)))
            .await?)
    }

    async fn add_subtitles(&self, paths: Vec<String>) -> fdo::Result<()> {
        Ok(self
            .session
            .add_subtitles(paths.into_iter().map(PathBuf::from).collect())
            .await?)
    }

    async fn snapshot(&self) -> fdo::Result<()> {
        Ok(self.session.action(ActionKind::CaptureSnapshot).await?)
    }

    async fn close(&self) -> fdo::Result<()> {
        Ok(self.session.action(ActionKind::Close).await?)
    }

    async fn clear_source(&self) -> fdo::Result<()> {
        Ok(self.session.clear_source().await?)
    }

    async fn last_notice(&self) -> fdo::Result<String> {
        Ok(self.session.last_notice().unwrap_or_default())
    }

    async fn stop(&self) -> fdo::Result<()> {
        self.stop_signal
            .send(())
            .map_err(|e| fdo::Error::Failed(e.to_string()))
    }
}

pub async fn run_dbus_server(
    session: SessionHandle,
    stop_signal: watch::Sender<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let player_dbus = PlayerDBus {
        session,
        stop_signal: stop_signal.clone(),
    };

    let _connection = ConnectionBuilder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, player_dbus)?
        .build()
        .await?;

    let mut stop_receiver = stop_signal.subscribe();
    if stop_receiver.changed().await.is_ok() {
        info!("Stop requested, releasing {SERVICE_NAME}");
    }
    Ok(())
}
