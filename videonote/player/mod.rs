//! The player seen from the router: something that can load a URL, seek,
//! report its position and play or pause. How it renders is not our business.

mod clock;
#[cfg(feature = "gst")]
mod gst;

use crate::error::App;
use crate::resolve::SubtitleTrack;

pub use clock::ClockPlayer;
#[cfg(feature = "gst")]
pub use gst::GstPlayer;

pub trait PlayerController: Send {
    fn load(&mut self, url: &str, tracks: &[SubtitleTrack]) -> Result<(), App>;
    fn seek_to(&mut self, seconds: f64) -> Result<(), App>;
    fn current_time(&self) -> Option<f64>;
    fn set_playing(&mut self, playing: bool) -> Result<(), App>;
}

/// Owner of the player's surface. Mounting is asked for when a play command
/// arrives with no player around; the result comes back as a ready player.
pub trait PlayerHost: Send {
    fn mount(&mut self) -> Result<Box<dyn PlayerController>, App>;

    /// Returns a notice for the user when snapshots are not possible.
    fn capture_snapshot(&mut self) -> Option<String> {
        Some("Current player is not supported for taking snapshot!".to_string())
    }
}

/// Mounts the GStreamer player when built with `gst`, the headless clock
/// otherwise.
#[derive(Debug, Default)]
pub struct DefaultHost;

impl PlayerHost for DefaultHost {
    fn mount(&mut self) -> Result<Box<dyn PlayerController>, App> {
        #[cfg(feature = "gst")]
        {
            Ok(Box::new(GstPlayer::new()?))
        }
        #[cfg(not(feature = "gst"))]
        {
            Ok(Box::new(ClockPlayer::default()))
        }
    }
}
