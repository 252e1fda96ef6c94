use super::PlayerController;
use crate::bilibili::{REFERER_VALUE, USER_AGENT_VALUE};
use crate::error::App;
use crate::resolve::SubtitleTrack;
use futures_util::stream::StreamExt;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, Element, MessageView, SeekFlags, State};
use log::{error, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task;

const BILIBILI_HOSTS: &[&str] = &["bilivideo", "hdslb", "bilibili"];

/// Where the pipeline stands after a `load`. Seeks asked for before preroll
/// completes are kept here and sent when the bus reports `AsyncDone`.
#[derive(Debug, Default)]
struct Preroll {
    done: bool,
    seek: Option<f64>,
}

impl Preroll {
    /// Holds the seek back while the pipeline is still prerolling.
    fn defer(&mut self, seconds: f64) -> bool {
        if self.done {
            return false;
        }
        self.seek = Some(seconds.max(0.0));
        true
    }

    /// Marks the preroll finished and hands out the seek held back, if any.
    fn finish(&mut self) -> Option<f64> {
        self.done = true;
        self.seek.take()
    }
}

/// `playbin` based player. Only the first subtitle track is attached, as
/// `suburi`. No call blocks on the pipeline.
pub struct GstPlayer {
    playbin: Element,
    preroll: Arc<Mutex<Preroll>>,
}

impl GstPlayer {
    pub fn new() -> Result<Self, App> {
        gstreamer::init().map_err(|e| App::Player(e.to_string()))?;
        let playbin = gstreamer::ElementFactory::make("playbin")
            .build()
            .map_err(|_| App::Player("Failed to create playbin element".to_string()))?;

        playbin.connect("source-setup", false, |values| {
            if let Some(source) = values.get(1).and_then(|v| v.get::<Element>().ok()) {
                set_bilibili_headers(&source);
            }
            None
        });

        let player = Self {
            playbin,
            preroll: Arc::default(),
        };
        player.listen_to_bus()?;
        info!("GStreamer player created successfully.");
        Ok(player)
    }

    fn listen_to_bus(&self) -> Result<(), App> {
        let bus = self
            .playbin
            .bus()
            .ok_or_else(|| App::Player("Failed to get GStreamer bus".to_string()))?;

        let playbin = self.playbin.clone();
        let preroll = Arc::clone(&self.preroll);
        task::spawn(bus.stream().for_each(move |msg| {
            match msg.view() {
                MessageView::AsyncDone(_) => {
                    let seek = preroll
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .finish();
                    if let Some(seconds) = seek {
                        if let Err(e) = seek_playbin(&playbin, seconds) {
                            warn!("Deferred seek to {seconds}s failed: {e}");
                        }
                    }
                }
                MessageView::Eos(_) => info!("End of stream reached"),
                MessageView::Error(err) => {
                    error!("Error from GStreamer pipeline: {}", err.error());
                }
                _ => (),
            }
            std::future::ready(())
        }));
        Ok(())
    }

    fn preroll(&self) -> std::sync::MutexGuard<'_, Preroll> {
        self.preroll.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: State) -> Result<(), App> {
        self.playbin
            .set_state(state)
            .map(|_| ())
            .map_err(|e| App::Player(format!("Failed to set pipeline to {state:?}: {e}")))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seek_playbin(playbin: &Element, seconds: f64) -> Result<(), App> {
    let position = ClockTime::from_nseconds((seconds.max(0.0) * 1e9) as u64);
    playbin
        .seek_simple(SeekFlags::FLUSH | SeekFlags::KEY_UNIT, position)
        .map_err(|e| App::Player(e.to_string()))
}

// CDN hosts refuse requests without the site's referer.
fn set_bilibili_headers(source: &Element) {
    if source.find_property("location").is_none() || source.find_property("extra-headers").is_none()
    {
        return;
    }
    let location: Option<String> = source.property("location");
    if !location.is_some_and(|l| BILIBILI_HOSTS.iter().any(|host| l.contains(host))) {
        return;
    }
    let mut headers = gstreamer::Structure::new_empty("headers");
    headers.set("Referer", REFERER_VALUE);
    source.set_property("extra-headers", &headers);
    if source.find_property("user-agent").is_some() {
        source.set_property("user-agent", USER_AGENT_VALUE);
    }
}

impl PlayerController for GstPlayer {
    fn load(&mut self, url: &str, tracks: &[SubtitleTrack]) -> Result<(), App> {
        self.set_state(State::Null)?;
        *self.preroll() = Preroll::default();
        self.playbin.set_property("uri", url);
        self.playbin
            .set_property("suburi", tracks.first().map(|t| t.src_url.as_str()));
        // Returns at once; the bus task sees the preroll finish.
        self.set_state(State::Paused)
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), App> {
        if self.preroll().defer(seconds) {
            return Ok(());
        }
        seek_playbin(&self.playbin, seconds)
    }

    #[allow(clippy::cast_precision_loss)]
    fn current_time(&self) -> Option<f64> {
        if let Some(seconds) = self.preroll().seek {
            return Some(seconds);
        }
        self.playbin
            .query_position::<ClockTime>()
            .map(|t| t.nseconds() as f64 / 1e9)
    }

    fn set_playing(&mut self, playing: bool) -> Result<(), App> {
        self.set_state(if playing {
            State::Playing
        } else {
            State::Paused
        })
    }
}

impl Drop for GstPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.playbin.set_state(State::Null) {
            error!("Failed to stop pipeline: {e}");
        }
    }
}
