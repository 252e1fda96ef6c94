mod subtitles;

use crate::error::App;
use crate::resolve::SubtitleTrack;
use log::{info, warn};
use regex::Regex;
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

pub const API_BASE: &str = "https://api.bilibili.com";
pub const USER_AGENT_VALUE: &str = "Mozilla/5.0 BiliDroid/..* (bbcallen@gmail.com)";
pub const REFERER_VALUE: &str = "https://www.bilibili.com";

static BVID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"BV[0-9A-Za-z]{10}").expect("static regex"));

/// What a bilibili page resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformStream {
    pub stream_url: String,
    pub subtitles: Vec<SubtitleTrack>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct VideoPage {
    bvid: String,
    page: u32,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn into_data(self, what: &str) -> Result<T, App> {
        if self.code != 0 {
            return Err(App::Resolution(format!(
                "{what} failed with code {}: {}",
                self.code, self.message
            )));
        }
        self.data
            .ok_or_else(|| App::Resolution(format!("{what} returned no data")))
    }
}

#[derive(Deserialize)]
struct ViewData {
    cid: i64,
    #[serde(default)]
    pages: Vec<PageData>,
}

#[derive(Deserialize)]
struct PageData {
    cid: i64,
    page: u32,
}

#[derive(Deserialize)]
struct PlayUrlData {
    #[serde(default)]
    quality: i64,
    #[serde(default)]
    durl: Vec<Durl>,
}

#[derive(Deserialize)]
struct Durl {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Clone)]
pub struct Bilibili {
    client: Client,
    api_base: String,
}

impl Bilibili {
    pub fn new(timeout: Option<Duration>) -> Result<Self, App> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            api_base: API_BASE.to_string(),
        })
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetches the page metadata, picks the progressive stream and collects
    /// whatever subtitles the page offers. Never retries.
    pub async fn resolve(&self, page_url: &str) -> Result<PlatformStream, App> {
        let page = self.locate(page_url).await?;
        let cid = self.fetch_cid(&page).await?;
        let stream_url = self.fetch_stream_url(&page.bvid, cid).await?;
        let subtitles = self.fetch_subtitles(&page.bvid, cid).await;
        info!(
            "Resolved {} (page {}) with {} subtitle track(s)",
            page.bvid,
            page.page,
            subtitles.len()
        );
        Ok(PlatformStream {
            stream_url,
            subtitles,
        })
    }

    async fn locate(&self, page_url: &str) -> Result<VideoPage, App> {
        if let Some(page) = parse_video_page(page_url) {
            return Ok(page);
        }
        // Short links only reveal the video after their redirect.
        let response = self.get(page_url).send().await?.error_for_status()?;
        parse_video_page(response.url().as_str()).ok_or_else(|| {
            App::Resolution(format!("No bilibili video id found behind {page_url}"))
        })
    }

    async fn fetch_cid(&self, page: &VideoPage) -> Result<i64, App> {
        let url = format!("{}/x/web-interface/view?bvid={}", self.api_base, page.bvid);
        let view: ViewData = self.fetch_json(&url, "Video info").await?;
        Ok(view
            .pages
            .iter()
            .find(|p| p.page == page.page)
            .map_or(view.cid, |p| p.cid))
    }

    async fn fetch_stream_url(&self, bvid: &str, cid: i64) -> Result<String, App> {
        let url = format!(
            "{}/x/player/playurl?bvid={bvid}&cid={cid}&qn=127&fnval=0&fourk=1&platform=html5&high_quality=1",
            self.api_base
        );
        let play: PlayUrlData = self.fetch_json(&url, "Play url").await?;
        let stream_url = play
            .durl
            .into_iter()
            .map(|d| d.url)
            .find(|u| !u.is_empty())
            .ok_or_else(|| App::Resolution(format!("No playable stream for {bvid}")))?;
        info!("Selected quality {} stream for {bvid}", play.quality);
        Ok(stream_url)
    }

    async fn fetch_subtitles(&self, bvid: &str, cid: i64) -> Vec<SubtitleTrack> {
        let url = format!("{}/x/player/v2?bvid={bvid}&cid={cid}", self.api_base);
        let manifest: subtitles::PlayerData = match self.fetch_json(&url, "Subtitle list").await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Subtitles unavailable for {bvid}: {e}");
                return Vec::new();
            }
        };

        let mut tracks = Vec::new();
        for entry in manifest.entries() {
            let src = absolute_subtitle_url(&entry.subtitle_url);
            match self.fetch_raw::<subtitles::BccSubtitle>(&src).await {
                Ok(body) => tracks.push(SubtitleTrack::subtitles(
                    entry.label(),
                    subtitles::vtt_data_url(&subtitles::to_webvtt(&body)),
                )),
                Err(e) => warn!("Skipping subtitle {} of {bvid}: {e}", entry.lan),
            }
        }
        tracks
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, App> {
        self.fetch_raw::<ApiResponse<T>>(url).await?.into_data(what)
    }

    async fn fetch_raw<T: DeserializeOwned>(&self, url: &str) -> Result<T, App> {
        let response = self.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(REFERER, REFERER_VALUE)
    }
}

fn parse_video_page(page_url: &str) -> Option<VideoPage> {
    let bvid = BVID.find(page_url)?.as_str().to_string();
    let page = Url::parse(page_url)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "p")
                .and_then(|(_, v)| v.parse::<u32>().ok())
        })
        .filter(|p| *p > 0)
        .unwrap_or(1);
    Some(VideoPage { bvid, page })
}

fn absolute_subtitle_url(src: &str) -> String {
    if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    }
}
