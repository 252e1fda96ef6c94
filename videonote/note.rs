//! `video-note` blocks as written into documents.

use regex::Regex;
use std::sync::LazyLock;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+:\d+:\d+|\d+:\d+").expect("static regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoNote {
    pub url: Option<String>,
    pub title: Option<String>,
    pub ts: Option<String>,
}

impl VideoNote {
    pub fn seconds(&self) -> Option<u64> {
        self.ts.as_deref().and_then(parse_timestamp)
    }

    pub fn render(&self) -> String {
        let mut lines = vec!["```video-note".to_string()];
        if let Some(ts) = &self.ts {
            lines.push(format!("ts: {ts}"));
        }
        if let Some(url) = &self.url {
            lines.push(format!("url: {url}"));
        }
        if let Some(title) = &self.title {
            lines.push(format!("title: {title}"));
        }
        lines.push("```".to_string());
        lines.join("\n") + "\n"
    }
}

/// First `hh:mm:ss` or `mm:ss` in the text, in seconds.
pub fn parse_timestamp(text: &str) -> Option<u64> {
    let found = TIMESTAMP.find(text)?.as_str();
    let parts: Vec<u64> = found.split(':').map(str::parse).collect::<Result<_, _>>().ok()?;
    let (hh, mm, ss) = match parts.as_slice() {
        [mm, ss] => (0, *mm, *ss),
        [hh, mm, ss] => (*hh, *mm, *ss),
        _ => return None,
    };
    hh.checked_mul(3600)?
        .checked_add(mm.checked_mul(60)?)?
        .checked_add(ss)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, secs) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
