use crate::bilibili::Bilibili;
use crate::classify::{classify, clean, unquote, SourceKind};
use crate::error::App;
use crate::server::local_video_redirect;
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub label: String,
    pub src_url: String,
    pub kind: String,
}

impl SubtitleTrack {
    pub fn subtitles(label: impl Into<String>, src_url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            src_url: src_url.into(),
            kind: "subtitles".to_string(),
        }
    }
}

/// A source ready for the player. `playing_url` is handed over untouched;
/// `display_url` is what gets shown, written into notes and used as the
/// resume key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayItem {
    pub playing_url: String,
    pub display_url: String,
    pub subtitles: Vec<SubtitleTrack>,
    pub source_kind: SourceKind,
}

/// The stable identity of a source, computed without any I/O.
pub fn display_url(source: &str) -> Option<String> {
    match classify(source) {
        SourceKind::LocalFile => Some(unquote(source).to_string()),
        SourceKind::Platform => Some(source.trim().to_string()),
        SourceKind::GenericUrl => Some(clean(source)),
        SourceKind::Invalid => None,
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    port: u16,
    bilibili: Bilibili,
}

impl Resolver {
    pub fn new(port: u16, bilibili: Bilibili) -> Self {
        Self { port, bilibili }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Turns a raw source into a [`PlayItem`]. Nothing is cached: platform
    /// stream addresses expire, so every activation resolves again.
    pub async fn resolve(&self, source: &str) -> Result<PlayItem, App> {
        let kind = classify(source);
        let item = match kind {
            SourceKind::LocalFile => {
                let path = unquote(source);
                PlayItem {
                    playing_url: local_video_redirect(self.port, path),
                    display_url: path.to_string(),
                    subtitles: Vec::new(),
                    source_kind: kind,
                }
            }
            SourceKind::Platform => {
                let page_url = source.trim();
                let stream = self.bilibili.resolve(page_url).await?;
                PlayItem {
                    playing_url: stream.stream_url,
                    display_url: page_url.to_string(),
                    subtitles: stream.subtitles,
                    source_kind: kind,
                }
            }
            SourceKind::GenericUrl => {
                let cleaned = clean(source);
                PlayItem {
                    playing_url: cleaned.clone(),
                    display_url: cleaned,
                    subtitles: Vec::new(),
                    source_kind: kind,
                }
            }
            SourceKind::Invalid => return Err(App::InvalidSource(source.trim().to_string())),
        };
        info!("Resolved {} as {:?}", item.display_url, item.source_kind);
        Ok(item)
    }
}
