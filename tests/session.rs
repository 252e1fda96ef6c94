use std::sync::{Arc, Mutex};
use std::time::Duration;
use videonote::bilibili::Bilibili;
use videonote::player::{PlayerController, PlayerHost};
use videonote::router::CommandRouter;
use videonote::store::ResumeStore;
use videonote::{session, App, Resolver, Stamp, SubtitleTrack};

#[derive(Clone, Default)]
struct SharedPlayer {
    url: Arc<Mutex<Option<String>>>,
    position: Arc<Mutex<f64>>,
}

impl PlayerController for SharedPlayer {
    fn load(&mut self, url: &str, _tracks: &[SubtitleTrack]) -> Result<(), App> {
        *self.url.lock().unwrap() = Some(url.to_string());
        *self.position.lock().unwrap() = 0.0;
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), App> {
        *self.position.lock().unwrap() = seconds;
        Ok(())
    }

    fn current_time(&self) -> Option<f64> {
        self.url
            .lock()
            .unwrap()
            .as_ref()
            .map(|_| *self.position.lock().unwrap())
    }

    fn set_playing(&mut self, _playing: bool) -> Result<(), App> {
        Ok(())
    }
}

struct TestHost {
    player: SharedPlayer,
    mounts: Arc<Mutex<usize>>,
}

impl PlayerHost for TestHost {
    fn mount(&mut self) -> Result<Box<dyn PlayerController>, App> {
        *self.mounts.lock().unwrap() += 1;
        Ok(Box::new(self.player.clone()))
    }
}

struct FailingHost;

impl PlayerHost for FailingHost {
    fn mount(&mut self) -> Result<Box<dyn PlayerController>, App> {
        Err(App::Player("no display".to_string()))
    }
}

async fn wait_for_item(handle: &session::SessionHandle) -> Stamp {
    for _ in 0..100 {
        let stamp = handle.stamp().await.unwrap();
        if stamp.play_item.is_some() {
            return stamp;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("item never loaded");
}

fn resolver() -> Resolver {
    Resolver::new(
        5500,
        Bilibili::new(None)
            .unwrap()
            .with_api_base("http://127.0.0.1:9"),
    )
}

#[tokio::test]
async fn plays_local_file_and_persists_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let settings_path = dir.path().join("settings.toml");
    let store = ResumeStore::load(&settings_path).await.unwrap();
    let player = SharedPlayer::default();
    let mounts = Arc::new(Mutex::new(0));
    let host = TestHost {
        player: player.clone(),
        mounts: Arc::clone(&mounts),
    };
    let (handle, task) = session::spawn(CommandRouter::new(store, 5500), resolver(), Box::new(host));

    handle.play("/videos/lecture.mp4", Some(7.0)).await.unwrap();
    let stamp = wait_for_item(&handle).await;

    assert_eq!(stamp.source_url.as_deref(), Some("/videos/lecture.mp4"));
    assert_eq!(
        player.url.lock().unwrap().as_deref(),
        Some("http://127.0.0.1:5500/video?path=%2Fvideos%2Flecture.mp4")
    );
    assert_eq!(stamp.seconds, Some(7.0));

    handle.seek(5.0).await.unwrap();
    handle.play("/videos/lecture.mp4", Some(30.0)).await.unwrap();
    assert_eq!(handle.stamp().await.unwrap().seconds, Some(30.0));
    assert_eq!(*mounts.lock().unwrap(), 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap();

    let reloaded = ResumeStore::load(&settings_path).await.unwrap();
    assert_eq!(reloaded.get("/videos/lecture.mp4"), Some(30.0));
}

#[tokio::test]
async fn resolution_failure_becomes_the_last_notice() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResumeStore::load(dir.path().join("settings.toml"))
        .await
        .unwrap();
    let host = TestHost {
        player: SharedPlayer::default(),
        mounts: Arc::default(),
    };
    let (handle, task) = session::spawn(CommandRouter::new(store, 5500), resolver(), Box::new(host));

    handle
        .play("https://www.bilibili.com/video/BV1GJ411x7h7", None)
        .await
        .unwrap();

    let mut notice = None;
    for _ in 0..200 {
        notice = handle.last_notice();
        if notice.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(notice.is_some_and(|n| n.starts_with("Resolution error")));
    assert_eq!(handle.stamp().await.unwrap().play_item, None);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn mount_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = ResumeStore::load(dir.path().join("settings.toml"))
        .await
        .unwrap();
    let (handle, task) =
        session::spawn(CommandRouter::new(store, 5500), resolver(), Box::new(FailingHost));

    handle.play("/videos/a.mp4", None).await.unwrap();
    assert_eq!(handle.stamp().await.unwrap(), Stamp::default());
    assert!(handle
        .last_notice()
        .is_some_and(|n| n.contains("no display")));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
