//! Video-hosting link helpers.
//!
//! Video ids are exactly 11 characters drawn from `[A-Za-z0-9_-]`.

/// Length of a video id
const VIDEO_ID_LEN: usize = 11;

/// Whether `value` has the shape of a video id
pub fn is_video_id(value: &str) -> bool {
    value.len() == VIDEO_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Whether `url` points at the video-hosting service
pub fn is_youtube_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("youtube.com/") || lower.contains("youtu.be/")
}

/// Extract the video id from watch, short, embed or legacy `/v/` URLs
pub fn extract_video_id(url: &str) -> Option<String> {
    let candidate = if let Some((_, rest)) = url.split_once("youtu.be/") {
        rest
    } else if let Some((_, query)) = url.split_once('?') {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
            .or_else(|| path_segment_after(url, "/embed/"))
            .or_else(|| path_segment_after(url, "/v/"))?
    } else {
        path_segment_after(url, "/embed/").or_else(|| path_segment_after(url, "/v/"))?
    };

    let id: String = candidate
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();

    is_video_id(&id).then_some(id)
}

fn path_segment_after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    url.split_once(marker).map(|(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_id() {
        assert!(is_video_id("dQw4w9WgXcQ"));
        assert!(is_video_id("a-b_c-d_e-f"));
        assert!(!is_video_id("dQw4w9WgXc"));
        assert!(!is_video_id("dQw4w9WgXcQQ"));
        assert!(!is_video_id("dQw4w9WgXc!"));
        assert!(!is_video_id("4uLU6hMCjMI75M1A2tKUQC"));
    }

    #[test]
    fn test_extract_video_id_forms() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=4"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/v/dQw4w9WgXcQ?version=3"), id);
        assert_eq!(extract_video_id("https://music.youtube.com/watch?v=dQw4w9WgXcQ"), id);
    }

    #[test]
    fn test_extract_video_id_rejects_other_urls() {
        assert_eq!(extract_video_id("https://www.deezer.com/track/3135556"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_watch_url_and_detection() {
        let url = watch_url("dQw4w9WgXcQ");
        assert!(is_youtube_url(&url));
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!is_youtube_url("https://open.spotify.com/track/abc"));
    }
}
