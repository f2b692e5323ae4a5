//! Output filename rendering.
//!
//! Turns a template such as `{artist} - {title}` plus track metadata into a
//! safe file name. Supported placeholders: `{title}`, `{artist}`, `{album}`,
//! `{album_artist}`, `{track}`, `{disc}`, `{year}`. Anything else in braces
//! is left as written, and placeholder-like text inside metadata values is
//! never expanded.

use crate::model::{Quality, TrackMetadata};

/// Template used when neither the request nor the config provides one
pub const DEFAULT_TEMPLATE: &str = "{artist} - {title}";

/// Longest file stem we produce, in characters
const MAX_STEM_CHARS: usize = 200;

/// Renders the output file name for a track.
///
/// Implement this to replace the naming scheme without touching the pipeline.
pub trait FilenameRenderer: Send + Sync {
    /// File stem (no extension) for `metadata` rendered through `template`
    fn render(&self, template: &str, metadata: &TrackMetadata) -> String;

    /// Full file name including the quality's extension
    fn file_name(&self, template: &str, metadata: &TrackMetadata, quality: Quality) -> String {
        format!("{}{}", self.render(template, metadata), quality.extension())
    }
}

/// Placeholder substitution followed by sanitisation
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl FilenameRenderer for TemplateRenderer {
    fn render(&self, template: &str, metadata: &TrackMetadata) -> String {
        let template = if template.trim().is_empty() {
            DEFAULT_TEMPLATE
        } else {
            template
        };

        let number = |n: u32| {
            if n > 0 {
                format!("{:02}", n)
            } else {
                String::new()
            }
        };

        // Single left-to-right pass, so substituted values are never rescanned
        let mut rendered = String::with_capacity(template.len() + 64);
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open..];
            let Some(close) = after.find('}') else {
                rest = after;
                break;
            };

            let value = match &after[1..close] {
                "title" => Some(metadata.title.clone()),
                "artist" => Some(metadata.artist.clone()),
                "album_artist" => Some(metadata.album_artist.clone()),
                "album" => Some(metadata.album.clone()),
                "track" => Some(number(metadata.track_number)),
                "disc" => Some(number(metadata.disc_number)),
                "year" => Some(metadata.year().unwrap_or_default().to_string()),
                _ => None,
            };
            match value {
                Some(value) => {
                    rendered.push_str(&value);
                    rest = &after[close + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = &after[1..];
                }
            }
        }
        rendered.push_str(rest);

        sanitize_filename(&rendered)
    }
}

/// Sanitizes a filename by replacing invalid characters.
///
/// Path separators, reserved punctuation and control characters become `_`,
/// runs of `_` collapse, surrounding spaces and dots are trimmed, and the
/// result is capped in length. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c: char| c == ' ' || c == '.');
    let capped: String = trimmed.chars().take(MAX_STEM_CHARS).collect();
    let capped = capped.trim_end_matches(|c: char| c == ' ' || c == '.');

    if capped.is_empty() {
        "untitled".to_string()
    } else {
        capped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_metadata;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC"), "AC_DC");
        assert_eq!(sanitize_filename("Track: Title"), "Track_ Title");
        assert_eq!(sanitize_filename("Valid Name"), "Valid Name");
        assert_eq!(sanitize_filename("Artist?"), "Artist_");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
        assert_eq!(sanitize_filename("pipe|test"), "pipe_test");
    }

    #[test]
    fn test_sanitize_collapses_and_trims() {
        assert_eq!(sanitize_filename("a//b"), "a_b");
        assert_eq!(sanitize_filename("  ..name.. "), "name");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
        assert_eq!(sanitize_filename("..."), "untitled");
        assert_eq!(sanitize_filename(""), "untitled");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_default_template() {
        let name = TemplateRenderer.file_name(DEFAULT_TEMPLATE, &mock_metadata(), Quality::Mp3320);
        assert_eq!(name, "Test Artist - Test Song.mp3");
    }

    #[test]
    fn test_all_placeholders() {
        let name = TemplateRenderer.render(
            "{year} {album_artist} - {album} - {disc}-{track} {title}",
            &mock_metadata(),
        );
        assert_eq!(name, "2021 Test Artist - Test Album - 01-03 Test Song");
    }

    #[test]
    fn test_blank_template_falls_back_to_default() {
        let name = TemplateRenderer.file_name("  ", &mock_metadata(), Quality::Opus256);
        assert_eq!(name, "Test Artist - Test Song.opus");
    }

    #[test]
    fn test_placeholder_text_in_metadata_is_literal() {
        let meta = TrackMetadata {
            title: "{artist} Anthem".to_string(),
            artist: "Band {title}".to_string(),
            ..Default::default()
        };
        assert_eq!(
            TemplateRenderer.render(DEFAULT_TEMPLATE, &meta),
            "Band {title} - {artist} Anthem"
        );
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let name = TemplateRenderer.render("{genre} {title} {", &mock_metadata());
        assert_eq!(name, "{genre} Test Song {");
    }

    #[test]
    fn test_metadata_separators_are_sanitized() {
        let meta = TrackMetadata {
            artist: "AC/DC".to_string(),
            title: "Who Made Who?".to_string(),
            ..Default::default()
        };
        assert_eq!(TemplateRenderer.render(DEFAULT_TEMPLATE, &meta), "AC_DC - Who Made Who_");
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Generate valid filename characters (excluding path separators and invalid chars)
    fn valid_filename_char() -> impl Strategy<Value = char> {
        prop::char::range('0', 'z').prop_filter("no invalid chars", |c| {
            !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '_')
        })
    }

    fn valid_filename() -> impl Strategy<Value = String> {
        prop::collection::vec(valid_filename_char(), 1..50)
            .prop_map(|chars| chars.into_iter().collect())
    }

    /// Strings that might contain invalid characters
    fn arbitrary_filename() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 ./:*?\"<>|_\t-]{0,80}").unwrap()
    }

    proptest! {
        #[test]
        fn sanitize_removes_invalid_chars(input in arbitrary_filename()) {
            let sanitized = sanitize_filename(&input);
            for c in ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\t'] {
                prop_assert!(!sanitized.contains(c), "Found {:?} in: {}", c, sanitized);
            }
        }

        #[test]
        fn sanitize_never_empty_or_padded(input in arbitrary_filename()) {
            let sanitized = sanitize_filename(&input);
            prop_assert!(!sanitized.is_empty());
            prop_assert!(!sanitized.starts_with(' ') && !sanitized.ends_with(' '));
            prop_assert!(!sanitized.starts_with('.') && !sanitized.ends_with('.'));
            prop_assert!(!sanitized.contains("__"));
        }

        #[test]
        fn sanitize_preserves_valid_names(input in valid_filename()) {
            let sanitized = sanitize_filename(&input);
            prop_assert_eq!(input, sanitized);
        }
    }
}
