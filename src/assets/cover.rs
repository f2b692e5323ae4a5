//! Cover art download
//!
//! Fetches album artwork from the source catalog's image CDN. Catalog image
//! URLs encode the size in a fixed token, which can be swapped for the
//! largest available rendition.

use std::sync::Arc;

use super::AssetError;
use crate::transport::HttpTransport;

/// Known CDN size tokens (300px, 640px, 64px) and the max-resolution token
const SIZE_TOKENS: [&str; 3] = ["ab67616d00001e02", "ab67616d0000b273", "ab67616d00004851"];
const MAX_SIZE_TOKEN: &str = "ab67616d000082c1";

/// Downloaded cover art
#[derive(Debug, Clone)]
pub struct CoverArt {
    /// Image data (JPEG, PNG or WebP)
    pub data: Vec<u8>,
    /// MIME type detected from the data
    pub mime_type: String,
    /// Source URL
    pub url: String,
}

/// Rewrite a catalog image URL to its max-resolution rendition.
/// URLs without a known size token are returned unchanged.
pub fn max_quality_url(url: &str) -> String {
    SIZE_TOKENS
        .into_iter()
        .find(|token| url.contains(token))
        .map(|token| url.replacen(token, MAX_SIZE_TOKEN, 1))
        .unwrap_or_else(|| url.to_string())
}

/// Identify an image by its magic bytes
fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// Cover art client
pub struct CoverClient {
    transport: Arc<HttpTransport>,
}

impl CoverClient {
    pub fn new(transport: Arc<HttpTransport>) -> Self {
        Self { transport }
    }

    /// Download cover art, optionally upgrading to the largest rendition
    pub async fn fetch(&self, url: &str, max_quality: bool) -> Result<CoverArt, AssetError> {
        let url = if max_quality {
            max_quality_url(url)
        } else {
            url.to_string()
        };

        let request = self
            .transport
            .get(&url)
            .timeout(self.transport.request_timeout())
            .build()
            .map_err(|e| AssetError::Transport(e.into()))?;
        let response = self
            .transport
            .send(request, self.transport.default_policy())
            .await
            .map_err(|e| match e.status() {
                Some(404) => AssetError::NotFound("cover art".to_string()),
                _ => AssetError::Transport(e),
            })?;

        let data = response
            .bytes()
            .await
            .map_err(|e| AssetError::Transport(e.into()))?
            .to_vec();

        let mime_type = sniff_mime(&data).ok_or(AssetError::InvalidImage)?;
        tracing::debug!(bytes = data.len(), mime_type, "Fetched cover art");

        Ok(CoverArt {
            data,
            mime_type: mime_type.to_string(),
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Reply, TestServer, test_network_config};

    const PNG_BYTES: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_max_quality_url_rewrites_known_tokens() {
        let base = "https://i.scdn.co/image/";
        for token in SIZE_TOKENS {
            let url = format!("{base}{token}0a1b2c3d");
            assert_eq!(
                max_quality_url(&url),
                format!("{base}{MAX_SIZE_TOKEN}0a1b2c3d")
            );
        }
    }

    #[test]
    fn test_max_quality_url_passes_through_unknown() {
        let url = "https://e-cdns-images.dzcdn.net/images/cover/abc/500x500.jpg";
        assert_eq!(max_quality_url(url), url);
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime(&PNG_BYTES), Some("image/png"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"<html>"), None);
    }

    #[tokio::test]
    async fn test_fetch_cover() {
        let server = TestServer::start(vec![(
            "/image/",
            vec![Reply::bytes(200, "image/png", PNG_BYTES.to_vec())],
        )])
        .await;
        let transport = Arc::new(HttpTransport::new(&test_network_config()).unwrap());
        let client = CoverClient::new(transport);

        let url = server.url("/image/ab67616d00001e02abc");
        let cover = client.fetch(&url, true).await.unwrap();

        assert_eq!(cover.mime_type, "image/png");
        assert_eq!(cover.data, PNG_BYTES.to_vec());
        assert!(cover.url.contains(MAX_SIZE_TOKEN));
        assert!(server.requests()[0].path.contains(MAX_SIZE_TOKEN));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_image() {
        let server =
            TestServer::start(vec![("/image/", vec![Reply::text(200, "<html>")])]).await;
        let transport = Arc::new(HttpTransport::new(&test_network_config()).unwrap());
        let client = CoverClient::new(transport);

        let err = client.fetch(&server.url("/image/x"), false).await.unwrap_err();
        assert!(matches!(err, AssetError::InvalidImage));
    }

    #[tokio::test]
    async fn test_fetch_missing_cover() {
        let server = TestServer::start(vec![]).await;
        let transport = Arc::new(HttpTransport::new(&test_network_config()).unwrap());
        let client = CoverClient::new(transport);

        let err = client.fetch(&server.url("/image/x"), false).await.unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }
}
