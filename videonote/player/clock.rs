use super::PlayerController;
use crate::error::App;
use crate::resolve::SubtitleTrack;
use log::info;
use std::time::Instant;

/// Headless player: nothing is decoded, the position follows the wall clock
/// while playing. Enough for taking timestamps against a video watched
/// elsewhere.
#[derive(Debug, Default)]
pub struct ClockPlayer {
    url: Option<String>,
    offset: f64,
    started: Option<Instant>,
}

impl ClockPlayer {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.started.is_some()
    }
}

impl PlayerController for ClockPlayer {
    fn load(&mut self, url: &str, tracks: &[SubtitleTrack]) -> Result<(), App> {
        info!("Loaded {url} with {} subtitle track(s)", tracks.len());
        self.url = Some(url.to_string());
        self.offset = 0.0;
        self.started = None;
        Ok(())
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), App> {
        if self.url.is_none() {
            return Err(App::Player("Nothing loaded".to_string()));
        }
        self.offset = seconds.max(0.0);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn current_time(&self) -> Option<f64> {
        self.url.as_ref()?;
        let running = self.started.map_or(0.0, |s| s.elapsed().as_secs_f64());
        Some(self.offset + running)
    }

    fn set_playing(&mut self, playing: bool) -> Result<(), App> {
        match (playing, self.started) {
            (true, None) => self.started = Some(Instant::now()),
            (false, Some(started)) => {
                self.offset += started.elapsed().as_secs_f64();
                self.started = None;
            }
            _ => {}
        }
        Ok(())
    }
}
