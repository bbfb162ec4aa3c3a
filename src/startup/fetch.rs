use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::error::{LoadError, LoadResult};

/// Fetches resource bodies for the network-backed strategies.
///
/// `http`/`https` URLs go through a shared client. `file://` URLs and plain
/// paths are read from disk. With an `asset_root`, plain paths (including
/// ones starting with `/`) resolve against it; without one they are used as
/// filesystem paths.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    asset_root: Option<PathBuf>,
}

enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl AssetFetcher {
    pub fn new(asset_root: Option<PathBuf>, request_timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(request_timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    "Failed to build HTTP client with {:?} timeout, using defaults: {}",
                    request_timeout, e
                );
                reqwest::Client::new()
            }
        };

        Self { client, asset_root }
    }

    pub fn with_client(client: reqwest::Client, asset_root: Option<PathBuf>) -> Self {
        Self { client, asset_root }
    }

    pub fn asset_root(&self) -> Option<&Path> {
        self.asset_root.as_deref()
    }

    /// Fetch the full body. Any non-success outcome is a transport error.
    pub async fn fetch(&self, url: &str) -> LoadResult<Vec<u8>> {
        match self.locate(url)? {
            Location::Remote(remote) => self.fetch_remote(url, remote).await,
            Location::Local(path) => {
                debug!("Reading {} from {}", url, path.display());
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| LoadError::transport(url, format!("{}: {}", path.display(), e)))
            }
        }
    }

    /// Fetch and interpret the body as UTF-8 text.
    pub async fn fetch_text(&self, url: &str) -> LoadResult<String> {
        let bytes = self.fetch(url).await?;
        String::from_utf8(bytes).map_err(|e| LoadError::decode(url, e.to_string()))
    }

    async fn fetch_remote(&self, original: &str, remote: Url) -> LoadResult<Vec<u8>> {
        let response = self
            .client
            .get(remote)
            .send()
            .await
            .map_err(|e| LoadError::transport(original, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::transport(original, format!("HTTP {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::transport(original, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn locate(&self, url: &str) -> LoadResult<Location> {
        if url.trim().is_empty() {
            return Err(LoadError::transport(url, "empty URL"));
        }

        if let Ok(parsed) = Url::parse(url) {
            match parsed.scheme() {
                "http" | "https" => return Ok(Location::Remote(parsed)),
                "file" => {
                    return parsed
                        .to_file_path()
                        .map(Location::Local)
                        .map_err(|_| LoadError::transport(url, "invalid file URL"));
                }
                // Single-letter schemes are Windows drive prefixes, not URLs
                scheme if scheme.len() > 1 => {
                    return Err(LoadError::transport(url, format!("unsupported scheme '{}'", scheme)));
                }
                _ => {}
            }
        }

        let Some(root) = self.asset_root.as_deref() else {
            return Ok(Location::Local(PathBuf::from(url)));
        };

        // Site-absolute URLs like "/_config.toml" are relative to the asset root
        Ok(Location::Local(root.join(url.trim_start_matches('/'))))
    }
}

impl Default for AssetFetcher {
    fn default() -> Self {
        Self::new(None, Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fetch_relative_to_asset_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hi").unwrap();

        let fetcher = AssetFetcher::new(Some(dir.path().to_path_buf()), Duration::from_secs(1));
        assert_eq!(fetcher.fetch_text("hello.txt").await.unwrap(), "hi");
        assert_eq!(fetcher.fetch_text("/hello.txt").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_site_absolute_path_stays_under_asset_root() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("live2d")).unwrap();
        std::fs::write(dir.path().join("live2d").join("a.skel"), "skel").unwrap();
        std::fs::write(dir.path().join("_config.toml"), "title = \"x\"").unwrap();

        let fetcher = AssetFetcher::new(Some(dir.path().to_path_buf()), Duration::from_secs(1));
        assert_eq!(fetcher.fetch_text("/_config.toml").await.unwrap(), "title = \"x\"");
        assert_eq!(fetcher.fetch_text("/live2d/a.skel").await.unwrap(), "skel");

        // Without a root the same URL is a filesystem path
        let err = AssetFetcher::default().fetch("/_config.toml").await.unwrap_err();
        assert_eq!(err.category(), "transport");
    }

    #[tokio::test]
    async fn test_absolute_path_without_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "plain").unwrap();

        let fetcher = AssetFetcher::default();
        assert_eq!(fetcher.fetch_text(path.to_str().unwrap()).await.unwrap(), "plain");
    }

    #[tokio::test]
    async fn test_fetch_file_url() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let fetcher = AssetFetcher::default();
        assert_eq!(fetcher.fetch(url.as_str()).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_file_is_transport_error() {
        let dir = tempdir().unwrap();
        let fetcher = AssetFetcher::new(Some(dir.path().to_path_buf()), Duration::from_secs(1));

        let err = fetcher.fetch("nope.png").await.unwrap_err();
        assert_eq!(err.category(), "transport");

        let err = fetcher.fetch("").await.unwrap_err();
        assert_eq!(err.category(), "transport");

        let err = fetcher.fetch("ftp://example.com/a").await.unwrap_err();
        assert_eq!(err.category(), "transport");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decode_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0xfd]).unwrap();

        let fetcher = AssetFetcher::new(Some(dir.path().to_path_buf()), Duration::from_secs(1));
        let err = fetcher.fetch_text("bad.txt").await.unwrap_err();
        assert_eq!(err.category(), "decode");
    }
}
