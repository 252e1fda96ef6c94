use serde::Deserialize;
use std::fmt::Write;

#[derive(Deserialize)]
pub(super) struct PlayerData {
    #[serde(default)]
    subtitle: Option<SubtitleInfo>,
}

impl PlayerData {
    pub(super) fn entries(&self) -> &[SubtitleEntry] {
        self.subtitle
            .as_ref()
            .map(|s| s.subtitles.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct SubtitleInfo {
    #[serde(default)]
    subtitles: Vec<SubtitleEntry>,
}

#[derive(Deserialize)]
pub(super) struct SubtitleEntry {
    #[serde(default)]
    pub(super) lan: String,
    #[serde(default)]
    lan_doc: String,
    pub(super) subtitle_url: String,
}

impl SubtitleEntry {
    pub(super) fn label(&self) -> &str {
        if self.lan_doc.is_empty() {
            &self.lan
        } else {
            &self.lan_doc
        }
    }
}

/// Subtitle body as served by bilibili's subtitle CDN.
#[derive(Deserialize)]
pub(super) struct BccSubtitle {
    #[serde(default)]
    body: Vec<BccLine>,
}

#[derive(Deserialize)]
struct BccLine {
    from: f64,
    to: f64,
    content: String,
}

pub(super) fn to_webvtt(subtitle: &BccSubtitle) -> String {
    let mut vtt = String::from("WEBVTT\n");
    for (index, line) in subtitle.body.iter().enumerate() {
        let _ = write!(
            vtt,
            "\n{}\n{} --> {}\n{}\n",
            index + 1,
            vtt_time(line.from),
            vtt_time(line.to),
            line.content
        );
    }
    vtt
}

pub(super) fn vtt_data_url(vtt: &str) -> String {
    format!("data:text/vtt;charset=utf-8,{}", urlencoding::encode(vtt))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn vtt_time(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1000 % 60,
        millis % 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_bcc_body_to_webvtt() {
        let bcc: BccSubtitle = serde_json::from_str(
            r#"{"body":[{"from":0.5,"to":2.25,"content":"你好"},{"from":3661.0,"to":3662.5,"content":"bye"}]}"#,
        )
        .unwrap();
        assert_eq!(
            to_webvtt(&bcc),
            "WEBVTT\n\n1\n00:00:00.500 --> 00:00:02.250\n你好\n\n2\n01:01:01.000 --> 01:01:02.500\nbye\n"
        );
    }

    #[test]
    fn empty_manifest_has_no_entries() {
        let data: PlayerData = serde_json::from_str(r#"{"subtitle":null}"#).unwrap();
        assert!(data.entries().is_empty());
        let data: PlayerData = serde_json::from_str("{}").unwrap();
        assert!(data.entries().is_empty());
    }
}
