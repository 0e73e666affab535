//! File name rules: cleaning, cache identifiers, captions.
//!
//! The cache key of a submission is derived from its cleaned file name with
//! the extension replaced by the target container, so an `.mkv` upload and
//! a later `.mp4` upload of the same title share one cache entry.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::queue::DEFAULT_FILE_NAME;

/// Extensions accepted as video submissions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mkv", "avi", "mov", "mp4", "m4v", "flv", "webm", "ts", "mts", "wmv", "vob", "dat", "rm",
    "rmvb", "divx", "mpg",
];

/// Canonical spelling of recognized source tags.
const SOURCE_TAGS: &[&str] = &[
    "CAM", "Ts", "DVDRip", "TVRip", "HDTV", "IPTV", "WEB-DL", "WEBRip", "HDRip", "BDRip", "BRRip",
    "BluRay",
];

static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*_]"#).unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RESOLUTION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(144|240|360|480|600|720|1080|2160)p\b").unwrap());

static SOURCE_TAG: Lazy<Regex> = Lazy::new(|| {
    let alternatives = SOURCE_TAGS.join("|");
    Regex::new(&format!(r"(?i)\b({alternatives})\b")).unwrap()
});

static EMPTY_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]").unwrap());

/// Quality tags found in a file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoTags {
    /// Resolution such as `1080p`.
    pub resolution: Option<String>,
    /// Source such as `BluRay` or `WEB-DL`.
    pub source: Option<String>,
}

/// Replace characters that are unsafe in file names (and `_`) with spaces,
/// collapse runs of whitespace and trim.
pub fn clean_file_name(name: &str) -> String {
    let replaced = ILLEGAL_CHARS.replace_all(name, " ");
    WHITESPACE.replace_all(replaced.trim(), " ").into_owned()
}

/// Split a file name into stem and lowercase extension.
pub fn split_extension(name: &str) -> (&str, Option<String>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && !ext.contains(' ') => {
            (stem, Some(ext.to_ascii_lowercase()))
        }
        _ => (name, None),
    }
}

/// Cache identifier for a submitted file name.
///
/// The cleaned stem with the target container as extension. Empty names fall
/// back to the default file name.
pub fn normalized_id(file_name: &str, target_container: &str) -> String {
    let cleaned = clean_file_name(file_name);
    let (stem, _) = split_extension(&cleaned);
    let stem = stem.trim();
    let stem = if stem.is_empty() {
        split_extension(DEFAULT_FILE_NAME).0
    } else {
        stem
    };
    format!("{}.{}", stem, target_container.to_ascii_lowercase())
}

/// Whether a file must be re-encoded to reach the target container.
pub fn needs_normalization(file_name: &str, target_container: &str) -> bool {
    match split_extension(file_name).1 {
        Some(ext) => !ext.eq_ignore_ascii_case(target_container),
        None => true,
    }
}

/// Whether the file name carries a supported video extension.
pub fn is_supported_video(file_name: &str) -> bool {
    split_extension(file_name)
        .1
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Find the first resolution and source tag in a name.
pub fn detect_tags(name: &str) -> VideoTags {
    let resolution = RESOLUTION_TAG
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("{}p", m.as_str()));
    let source = SOURCE_TAG.find(name).map(|m| canonical_source(m.as_str()));
    VideoTags { resolution, source }
}

fn canonical_source(found: &str) -> String {
    SOURCE_TAGS
        .iter()
        .find(|tag| tag.eq_ignore_ascii_case(found))
        .map(|tag| (*tag).to_string())
        .unwrap_or_else(|| found.to_string())
}

/// Title of a file: cleaned stem without its quality tags.
pub fn title_of(file_name: &str) -> String {
    let cleaned = clean_file_name(file_name);
    let (stem, _) = split_extension(&cleaned);

    let without_resolution = RESOLUTION_TAG.replace(stem, "");
    let without_source = SOURCE_TAG.replace(&without_resolution, "");
    let without_brackets = EMPTY_BRACKETS.replace_all(&without_source, "");
    let collapsed = WHITESPACE.replace_all(without_brackets.trim(), " ");
    collapsed
        .trim_matches(|c: char| c == '-' || c == '.' || c.is_whitespace())
        .to_string()
}

/// Caption shown with a delivered video.
pub fn build_caption(file_name: &str) -> String {
    let tags = detect_tags(&clean_file_name(file_name));
    let mut title = title_of(file_name);
    if title.is_empty() {
        title = split_extension(DEFAULT_FILE_NAME).0.to_string();
    }

    let mut caption = format!("**{title}**");
    let mut details = Vec::new();
    if let Some(resolution) = &tags.resolution {
        details.push(format!("**Resolution:** {resolution}"));
    }
    if let Some(source) = &tags.source {
        details.push(format!("**Quality:** {source}"));
    }
    if !details.is_empty() {
        caption.push_str("\n\n");
        caption.push_str(&details.join("\n"));
    }
    caption
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_file_name() {
        assert_eq!(clean_file_name("My_Movie: Part*2?.mkv"), "My Movie Part 2 .mkv");
        assert_eq!(clean_file_name("  a__b  "), "a b");
        assert_eq!(clean_file_name(r#"x<y>z"w/v\u|t"#), "x y z w v u t");
    }

    #[test]
    fn test_normalized_id_replaces_extension() {
        assert_eq!(normalized_id("Some_Film.1080p.mkv", "mp4"), "Some Film.1080p.mp4");
        assert_eq!(normalized_id("Some Film.1080p.mp4", "mp4"), "Some Film.1080p.mp4");
        assert_eq!(normalized_id("clip", "mp4"), "clip.mp4");
    }

    #[test]
    fn test_normalized_id_empty_name_falls_back() {
        assert_eq!(normalized_id("", "mp4"), "video.mp4");
        assert_eq!(normalized_id("???", "mp4"), "video.mp4");
    }

    #[test]
    fn test_needs_normalization() {
        assert!(needs_normalization("a.mkv", "mp4"));
        assert!(needs_normalization("a", "mp4"));
        assert!(!needs_normalization("a.MP4", "mp4"));
        assert!(!needs_normalization("a.mp4", "mp4"));
    }

    #[test]
    fn test_is_supported_video() {
        assert!(is_supported_video("a.mkv"));
        assert!(is_supported_video("a.RMVB"));
        assert!(is_supported_video("clip.ts"));
        assert!(!is_supported_video("notes.txt"));
        assert!(!is_supported_video("mkv"));
    }

    #[test]
    fn test_detect_tags_case_insensitive() {
        let tags = detect_tags("Film 2020 1080P bluray x264");
        assert_eq!(tags.resolution.as_deref(), Some("1080p"));
        assert_eq!(tags.source.as_deref(), Some("BluRay"));
    }

    #[test]
    fn test_detect_tags_whole_words_only() {
        let tags = detect_tags("Tsunami Warning");
        assert_eq!(tags, VideoTags::default());

        let tags = detect_tags("Show S01 WEB-DL 720p");
        assert_eq!(tags.resolution.as_deref(), Some("720p"));
        assert_eq!(tags.source.as_deref(), Some("WEB-DL"));
    }

    #[test]
    fn test_build_caption_with_tags() {
        let caption = build_caption("The_Film 720p HDTV.mkv");
        assert_eq!(
            caption,
            "**The Film**\n\n**Resolution:** 720p\n**Quality:** HDTV"
        );
    }

    #[test]
    fn test_build_caption_without_tags() {
        assert_eq!(build_caption("holiday clip.mov"), "**holiday clip**");
    }

    #[test]
    fn test_title_strips_empty_brackets() {
        assert_eq!(title_of("Film (1080p) [BluRay].mkv"), "Film");
    }
}
