//! Source classification and URL clean-up.
//!
//! Everything here is pure: no file system access and no network. A source is
//! checked in a fixed order: absolute path syntax, bilibili page, then a URL the
//! player can load on its own.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    LocalFile,
    Platform,
    GenericUrl,
    Invalid,
}

static WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]:[\\/]").expect("static regex"));

const PLAYABLE_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "youtube-nocookie.com",
    "vimeo.com",
    "soundcloud.com",
    "facebook.com",
    "fb.watch",
    "streamable.com",
    "wistia.com",
    "wistia.net",
    "twitch.tv",
    "dailymotion.com",
    "dai.ly",
    "mixcloud.com",
    "vidyard.com",
    "kaltura.com",
];

const PLAYABLE_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "webm", "ogv", "ogg", "oga", "mp3", "m4a", "m4b", "mpga", "wav", "weba",
    "aac", "spx", "flac", "m3u8", "mpd", "flv",
];

const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "dclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "igshid",
    "si",
    "feature",
    "spm_id_from",
    "from_spmid",
    "vd_source",
    "share_source",
    "share_medium",
    "share_plat",
    "share_session_id",
    "share_tag",
    "share_from",
    "unique_k",
    "bbid",
    "buvid",
    "is_story_h5",
    "seid",
];

pub fn classify(source: &str) -> SourceKind {
    let source = source.trim();
    if is_local_file(source) {
        SourceKind::LocalFile
    } else if is_platform_url(source) {
        SourceKind::Platform
    } else if can_play(source) {
        SourceKind::GenericUrl
    } else {
        SourceKind::Invalid
    }
}

/// Strips one pair of surrounding double quotes, as pasted by file managers.
pub fn unquote(source: &str) -> &str {
    let source = source.trim();
    match source.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if !inner.is_empty() => inner,
        _ => source,
    }
}

pub fn is_local_file(source: &str) -> bool {
    let path = unquote(source);
    (path.starts_with('/') && !path.starts_with("//"))
        || path.starts_with(r"\\")
        || WINDOWS_PATH.is_match(path)
}

pub fn is_platform_url(source: &str) -> bool {
    let Some(url) = web_url(source) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    if host_matches(host, "b23.tv") {
        return url.path().len() > 1;
    }
    host_matches(host, "bilibili.com") && url.path().starts_with("/video/")
}

/// Whether the player can load the URL as is: a known streaming site or a
/// direct link to a media file.
pub fn can_play(source: &str) -> bool {
    let Some(url) = web_url(source) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    if PLAYABLE_HOSTS.iter().any(|known| host_matches(host, known)) {
        return true;
    }
    url.path_segments()
        .and_then(Iterator::last)
        .and_then(|segment| segment.rsplit_once('.'))
        .is_some_and(|(_, ext)| {
            PLAYABLE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Removes tracking query parameters. Applying it twice gives the same result
/// as applying it once.
pub fn clean(source: &str) -> String {
    let source = source.trim();
    let Some(mut url) = web_url(source) else {
        return source.to_string();
    };
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !is_tracking(k)).collect();

    if kept.len() != pairs.len() {
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }
    url.to_string()
}

fn is_tracking(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

fn web_url(source: &str) -> Option<Url> {
    let url = Url::parse(source.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn host_matches(host: &str, domain: &str) -> bool {
    host.eq_ignore_ascii_case(domain)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn absolute_paths_are_local_files() {
        assert_eq!(classify("/Users/x/movie.mp4"), SourceKind::LocalFile);
        assert_eq!(classify("\"/Users/x/my movie.mp4\""), SourceKind::LocalFile);
        assert_eq!(classify(r"C:\Videos\clip.mkv"), SourceKind::LocalFile);
        assert_eq!(classify(r"\\nas\share\clip.mp4"), SourceKind::LocalFile);
    }

    #[test]
    fn bilibili_pages_are_platform_urls() {
        assert_eq!(
            classify("https://www.bilibili.com/video/BV1GJ411x7h7?p=2"),
            SourceKind::Platform
        );
        assert_eq!(classify("https://b23.tv/abc123"), SourceKind::Platform);
        assert_eq!(
            classify("https://www.bilibili.com/anime/"),
            SourceKind::Invalid
        );
    }

    #[test]
    fn playable_urls_are_generic() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            SourceKind::GenericUrl
        );
        assert_eq!(
            classify("https://cdn.example.org/media/talk.MP4"),
            SourceKind::GenericUrl
        );
        assert_eq!(classify("https://example.org/page.html"), SourceKind::Invalid);
        assert_eq!(classify("relative/movie.mp4"), SourceKind::Invalid);
        assert_eq!(classify(""), SourceKind::Invalid);
        assert_eq!(classify("//cdn.example.org/a.mp4"), SourceKind::Invalid);
    }

    #[test]
    fn unquote_only_strips_matching_quotes() {
        assert_eq!(unquote("\"/a/b.mp4\""), "/a/b.mp4");
        assert_eq!(unquote("\"/a/b.mp4"), "\"/a/b.mp4");
        assert_eq!(unquote("\"\""), "\"\"");
    }

    #[test]
    fn clean_drops_tracking_parameters() {
        assert_eq!(
            clean("https://youtu.be/dQw4w9WgXcQ?si=abcdef&t=42"),
            "https://youtu.be/dQw4w9WgXcQ?t=42"
        );
        assert_eq!(
            clean("https://example.org/v.mp4?utm_source=x&utm_medium=y"),
            "https://example.org/v.mp4"
        );
        assert_eq!(
            clean("https://example.org/v.mp4?quality=hd"),
            "https://example.org/v.mp4?quality=hd"
        );
    }

    proptest! {
        #[test]
        fn classify_is_deterministic(source in ".*") {
            prop_assert_eq!(classify(&source), classify(&source));
        }

        #[test]
        fn clean_is_idempotent(
            url in r"https://[a-z]{1,8}\.(com|tv)/[a-z0-9/._-]{0,12}(\?[a-z_]{1,8}=[a-z0-9%+ ]{0,6}(&[a-z_]{1,8}=[a-z0-9]{0,5}){0,3})?(#[a-z0-9=]{0,5})?"
        ) {
            let once = clean(&url);
            prop_assert_eq!(clean(&once), once);
        }

        #[test]
        fn clean_is_idempotent_on_arbitrary_input(source in ".*") {
            let once = clean(&source);
            prop_assert_eq!(clean(&once), once);
        }
    }
}
