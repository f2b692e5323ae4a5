//! Lyrics lookup (LRCLIB)
//!
//! Fetches time-synced lyrics when available, plain lyrics otherwise, and
//! renders them as an LRC document.
//!
//! API: https://lrclib.net/docs

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::AssetError;
use crate::transport::HttpTransport;

/// What to look lyrics up by
#[derive(Debug, Clone, Default)]
pub struct LyricsQuery {
    pub track_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub duration: Option<Duration>,
}

/// One lyric line. `start_ms` is 0 for unsynced lyrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsLine {
    pub start_ms: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lyrics {
    pub lines: Vec<LyricsLine>,
    /// Whether `start_ms` values are meaningful
    pub synced: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    #[serde(default)]
    instrumental: bool,
    #[serde(default)]
    plain_lyrics: Option<String>,
    #[serde(default)]
    synced_lyrics: Option<String>,
}

/// LRCLIB client
pub struct LyricsClient {
    transport: Arc<HttpTransport>,
    base_url: String,
}

impl LyricsClient {
    pub fn new(transport: Arc<HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    /// Exact lookup, falling back to a search when there is no exact match
    pub async fn fetch(&self, query: &LyricsQuery) -> Result<Lyrics, AssetError> {
        if query.track_name.trim().is_empty() {
            return Err(AssetError::NotFound("lyrics (no track name)".to_string()));
        }

        match self.get_exact(query).await {
            Err(AssetError::NotFound(_)) => {
                tracing::debug!(track = %query.track_name, "No exact lyrics match, searching");
                self.search(query).await
            }
            other => other,
        }
    }

    async fn get_exact(&self, query: &LyricsQuery) -> Result<Lyrics, AssetError> {
        let mut url = format!(
            "{}/api/get?artist_name={}&track_name={}",
            self.base_url,
            urlencoding::encode(&query.artist_name),
            urlencoding::encode(&query.track_name),
        );
        if !query.album_name.is_empty() {
            url.push_str("&album_name=");
            url.push_str(&urlencoding::encode(&query.album_name));
        }
        if let Some(duration) = query.duration {
            let _ = write!(url, "&duration={}", duration.as_secs());
        }

        let record: LrclibRecord = self
            .transport
            .get_json(&url, self.transport.default_policy())
            .await
            .map_err(not_found_on_404)?;
        to_lyrics(record)
    }

    async fn search(&self, query: &LyricsQuery) -> Result<Lyrics, AssetError> {
        let url = format!(
            "{}/api/search?artist_name={}&track_name={}",
            self.base_url,
            urlencoding::encode(&query.artist_name),
            urlencoding::encode(&query.track_name),
        );

        let records: Vec<LrclibRecord> = self
            .transport
            .get_json(&url, self.transport.default_policy())
            .await
            .map_err(not_found_on_404)?;

        // Prefer a synced record, then any record with text
        let best = records
            .iter()
            .position(|r| r.synced_lyrics.as_deref().is_some_and(|s| !s.trim().is_empty()))
            .or_else(|| {
                records
                    .iter()
                    .position(|r| r.plain_lyrics.as_deref().is_some_and(|s| !s.trim().is_empty()))
            });

        match best {
            Some(index) => to_lyrics(records.into_iter().nth(index).ok_or_else(no_lyrics)?),
            None => Err(no_lyrics()),
        }
    }
}

fn no_lyrics() -> AssetError {
    AssetError::NotFound("lyrics".to_string())
}

fn not_found_on_404(e: crate::transport::TransportError) -> AssetError {
    match e.status() {
        Some(404) => no_lyrics(),
        _ => AssetError::Transport(e),
    }
}

fn to_lyrics(record: LrclibRecord) -> Result<Lyrics, AssetError> {
    if record.instrumental {
        return Err(AssetError::NotFound("lyrics (instrumental)".to_string()));
    }

    if let Some(synced) = record.synced_lyrics.as_deref() {
        let lines = parse_lrc(synced);
        if !lines.is_empty() {
            return Ok(Lyrics { lines, synced: true });
        }
    }

    let lines: Vec<LyricsLine> = record
        .plain_lyrics
        .as_deref()
        .unwrap_or_default()
        .lines()
        .map(|text| LyricsLine {
            start_ms: 0,
            text: text.trim().to_string(),
        })
        .collect();

    if lines.iter().all(|l| l.text.is_empty()) {
        return Err(no_lyrics());
    }
    Ok(Lyrics {
        lines,
        synced: false,
    })
}

/// Parse LRC text into timed lines, ordered by start time.
///
/// Metadata tags (`[ar:...]`) are skipped; a line with several timestamps
/// yields one entry per timestamp.
pub fn parse_lrc(text: &str) -> Vec<LyricsLine> {
    let mut lines = Vec::new();

    for raw in text.lines() {
        let mut rest = raw.trim();
        let mut stamps = Vec::new();
        while let Some(after_open) = rest.strip_prefix('[') {
            let Some((tag, tail)) = after_open.split_once(']') else {
                break;
            };
            match parse_timestamp(tag) {
                Some(ms) => stamps.push(ms),
                None => break,
            }
            rest = tail;
        }

        let text = rest.trim();
        for start_ms in stamps {
            lines.push(LyricsLine {
                start_ms,
                text: text.to_string(),
            });
        }
    }

    lines.sort_by_key(|line| line.start_ms);
    lines
}

/// `mm:ss`, `mm:ss.x`, `mm:ss.xx` or `mm:ss.xxx` to milliseconds.
/// None when the tag is not a timestamp or the value overflows.
fn parse_timestamp(tag: &str) -> Option<u64> {
    let (minutes, seconds) = tag.split_once(':')?;
    let minutes: u64 = minutes.parse().ok()?;
    let (secs, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let secs: u64 = secs.parse().ok()?;

    let fraction_ms = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().ok()? * 100,
        2 => fraction.parse::<u64>().ok()? * 10,
        3 => fraction.parse::<u64>().ok()?,
        _ => return None,
    };

    minutes
        .checked_mul(60_000)?
        .checked_add(secs.checked_mul(1000)?)?
        .checked_add(fraction_ms)
}

/// Render lyrics as an LRC document with title and artist headers
pub fn to_lrc(lyrics: &Lyrics, title: &str, artist: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[ti:{title}]");
    let _ = writeln!(out, "[ar:{artist}]");
    let _ = writeln!(out, "[by:songbridge]");
    out.push('\n');

    for line in &lyrics.lines {
        if lyrics.synced {
            let minutes = line.start_ms / 60_000;
            let seconds = (line.start_ms % 60_000) / 1000;
            let centis = (line.start_ms % 1000) / 10;
            let _ = writeln!(out, "[{minutes:02}:{seconds:02}.{centis:02}]{}", line.text);
        } else {
            let _ = writeln!(out, "{}", line.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Reply, TestServer, test_network_config};

    #[test]
    fn test_parse_lrc() {
        let lines = parse_lrc("[ar:Someone]\n[00:12.34]First\n[00:05.00][01:00.5]Chorus\nno tag");
        assert_eq!(
            lines,
            vec![
                LyricsLine { start_ms: 5_000, text: "Chorus".into() },
                LyricsLine { start_ms: 12_340, text: "First".into() },
                LyricsLine { start_ms: 60_500, text: "Chorus".into() },
            ]
        );
    }

    #[test]
    fn test_parse_timestamp_precisions() {
        assert_eq!(parse_timestamp("01:02"), Some(62_000));
        assert_eq!(parse_timestamp("01:02.123"), Some(62_123));
        assert_eq!(parse_timestamp("ar:Artist"), None);
        assert_eq!(parse_timestamp("00:01.1234"), None);
    }

    #[test]
    fn test_oversized_timestamp_is_not_a_line() {
        assert_eq!(parse_timestamp("999999999999999999:00.00"), None);
        assert_eq!(parse_timestamp("00:99999999999999999"), None);

        let lines = parse_lrc("[999999999999999999:00.00]boom\n[00:01.00]ok");
        assert_eq!(
            lines,
            vec![LyricsLine {
                start_ms: 1000,
                text: "ok".into()
            }]
        );
    }

    #[test]
    fn test_to_lrc_synced() {
        let lyrics = Lyrics {
            lines: vec![LyricsLine { start_ms: 72_340, text: "Hello".into() }],
            synced: true,
        };
        let lrc = to_lrc(&lyrics, "Song", "Artist");
        assert!(lrc.starts_with("[ti:Song]\n[ar:Artist]\n[by:songbridge]\n"));
        assert!(lrc.contains("[01:12.34]Hello\n"));
    }

    #[test]
    fn test_to_lrc_plain() {
        let lyrics = Lyrics {
            lines: vec![LyricsLine { start_ms: 0, text: "Just words".into() }],
            synced: false,
        };
        assert!(to_lrc(&lyrics, "S", "A").ends_with("\nJust words\n"));
    }

    fn client_for(server: &TestServer) -> LyricsClient {
        let transport = Arc::new(HttpTransport::new(&test_network_config()).unwrap());
        LyricsClient::new(transport, server.base_url())
    }

    fn query() -> LyricsQuery {
        LyricsQuery {
            track_name: "Test Song".into(),
            artist_name: "Test Artist".into(),
            album_name: String::new(),
            duration: Some(Duration::from_secs(215)),
        }
    }

    #[tokio::test]
    async fn test_fetch_synced() {
        let server = TestServer::start(vec![(
            "/api/get",
            vec![Reply::json(
                200,
                r#"{"instrumental": false, "plainLyrics": "Hi", "syncedLyrics": "[00:01.00]Hi"}"#,
            )],
        )])
        .await;

        let lyrics = client_for(&server).fetch(&query()).await.unwrap();
        assert!(lyrics.synced);
        assert_eq!(lyrics.lines[0].start_ms, 1000);

        let req = &server.requests()[0];
        assert!(req.path.contains("track_name=Test%20Song"));
        assert!(req.path.contains("duration=215"));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_search() {
        let server = TestServer::start(vec![
            ("/api/get", vec![Reply::text(404, "not found")]),
            (
                "/api/search",
                vec![Reply::json(200, r#"[{"plainLyrics": "line one\nline two"}]"#)],
            ),
        ])
        .await;

        let lyrics = client_for(&server).fetch(&query()).await.unwrap();
        assert!(!lyrics.synced);
        assert_eq!(lyrics.lines.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = TestServer::start(vec![
            ("/api/get", vec![Reply::text(404, "not found")]),
            ("/api/search", vec![Reply::json(200, "[]")]),
        ])
        .await;

        let err = client_for(&server).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_instrumental_has_no_lyrics() {
        let server = TestServer::start(vec![(
            "/api/get",
            vec![Reply::json(200, r#"{"instrumental": true}"#)],
        )])
        .await;

        let err = client_for(&server).fetch(&query()).await.unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }
}
