//! Resumable tile downloads with retry.
//!
//! - HTTP Range requests to resume `.partial` files
//! - Exponential backoff between attempts
//! - Bounded concurrency across a tile list

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use futures::{stream, StreamExt};
use grid_processor::TileSource;
use reqwest::{header, Client, Response, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub initial_retry_delay: Duration,
    /// Maximum retry delay
    pub max_retry_delay: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Downloads running at once
    pub max_concurrent: usize,
    /// Directory for completed downloads; partial files live beside them
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_retry_delay: Duration::from_secs(2),
            max_retry_delay: Duration::from_secs(120),
            request_timeout: Duration::from_secs(600), // 10 minutes
            max_concurrent: 4,
            output_dir: PathBuf::from("data/downloads"),
        }
    }
}

/// Download progress information.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    pub started_at: Instant,
    pub retry_count: u32,
}

impl DownloadProgress {
    fn new() -> Self {
        Self {
            total_bytes: None,
            downloaded_bytes: 0,
            started_at: Instant::now(),
            retry_count: 0,
        }
    }

    pub fn percent_complete(&self) -> Option<f64> {
        self.total_bytes
            .filter(|&t| t > 0)
            .map(|t| (self.downloaded_bytes as f64 / t as f64) * 100.0)
    }

    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.downloaded_bytes as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Outcome of a batch download.
#[derive(Debug, Default)]
pub struct DownloadSummary {
    pub completed: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

/// Manages downloads with resumption and retry support.
pub struct DownloadManager {
    client: Client,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Fetch every source into the output directory, `max_concurrent` at a
    /// time. Local paths are passed through untouched.
    pub async fn download_all(&self, sources: &[TileSource]) -> Result<DownloadSummary> {
        fs::create_dir_all(&self.config.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.config.output_dir.display()))?;

        let results: Vec<(String, Result<PathBuf>)> = stream::iter(sources)
            .map(|source| async move {
                let result = match source {
                    TileSource::Path(path) => Ok(path.clone()),
                    TileSource::Url(url) => match source.file_name() {
                        Some(name) => self.download(url, &name).await,
                        None => Err(anyhow!("URL has no file name: {}", url)),
                    },
                };
                (source.to_string(), result)
            })
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let mut summary = DownloadSummary::default();
        for (source, result) in results {
            match result {
                Ok(path) => summary.completed.push(path),
                Err(e) => {
                    warn!(source = %source, error = %e, "Download failed");
                    summary.failed.push((source, format!("{:#}", e)));
                }
            }
        }
        summary.completed.sort();
        Ok(summary)
    }

    /// Download a file with automatic retry and resumption.
    ///
    /// Returns the path to the completed download.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn download(&self, url: &str, filename: &str) -> Result<PathBuf> {
        let temp_path = self.config.output_dir.join(format!("{}.partial", filename));
        let final_path = self.config.output_dir.join(filename);

        if final_path.exists() {
            info!(path = %final_path.display(), "File already exists, skipping download");
            return Ok(final_path);
        }

        let mut progress = DownloadProgress::new();
        let mut retry_count = 0;
        let mut delay = self.config.initial_retry_delay;

        loop {
            match self.download_with_resume(url, &temp_path, &mut progress).await {
                Ok(()) => {
                    if let Some(expected) = progress.total_bytes {
                        let actual = fs::metadata(&temp_path).await?.len();
                        if actual != expected {
                            return Err(anyhow!(
                                "Download size mismatch: expected {} bytes, got {}",
                                expected,
                                actual
                            ));
                        }
                    }

                    fs::rename(&temp_path, &final_path)
                        .await
                        .with_context(|| format!("Failed to move {}", temp_path.display()))?;

                    info!(
                        path = %final_path.display(),
                        bytes = progress.downloaded_bytes,
                        kb_per_sec = progress.bytes_per_second() / 1024.0,
                        "Download completed"
                    );
                    return Ok(final_path);
                }
                Err(e) => {
                    retry_count += 1;
                    progress.retry_count = retry_count;

                    if retry_count > self.config.max_retries {
                        return Err(anyhow!(
                            "Download failed after {} retries: {}",
                            retry_count,
                            e
                        ));
                    }

                    warn!(
                        error = %e,
                        retry = retry_count,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Download failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, self.config.max_retry_delay);
                }
            }
        }
    }

    /// Download with HTTP Range support for resumption.
    async fn download_with_resume(
        &self,
        url: &str,
        temp_path: &Path,
        progress: &mut DownloadProgress,
    ) -> Result<()> {
        let (content_length, supports_range) = self.probe(url).await?;
        if progress.total_bytes.is_none() {
            progress.total_bytes = content_length;
        }

        loop {
            let resume_from = if temp_path.exists() {
                fs::metadata(temp_path).await?.len()
            } else {
                0
            };

            if let Some(total) = progress.total_bytes {
                if resume_from >= total && total > 0 {
                    progress.downloaded_bytes = total;
                    return Ok(());
                }
            }

            let mut request = self.client.get(url);
            if resume_from > 0 && supports_range {
                info!(resume_from, total = ?progress.total_bytes, "Resuming download");
                request = request.header(header::RANGE, format!("bytes={}-", resume_from));
                progress.downloaded_bytes = resume_from;
            } else if resume_from > 0 {
                warn!("Server does not support range requests, restarting download");
                fs::remove_file(temp_path).await.ok();
                progress.downloaded_bytes = 0;
            }

            let response = request.send().await.context("HTTP request failed")?;

            match response.status() {
                StatusCode::OK => {
                    if resume_from > 0 {
                        fs::remove_file(temp_path).await.ok();
                        progress.downloaded_bytes = 0;
                    }
                }
                StatusCode::PARTIAL_CONTENT => {
                    debug!("Received partial content, resuming download");
                }
                StatusCode::RANGE_NOT_SATISFIABLE => {
                    if let Some(total) = progress.total_bytes {
                        if resume_from >= total {
                            return Ok(());
                        }
                    }
                    fs::remove_file(temp_path).await.ok();
                    progress.downloaded_bytes = 0;
                    continue;
                }
                status => {
                    return Err(anyhow!("HTTP error: {}", status));
                }
            }

            if progress.total_bytes.is_none() {
                progress.total_bytes = content_length_of(&response);
            }

            return stream_to_file(response, temp_path, progress).await;
        }
    }

    /// HEAD request: content length and whether ranges are accepted.
    async fn probe(&self, url: &str) -> Result<(Option<u64>, bool)> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .context("HEAD request failed")?;

        if !response.status().is_success() {
            return Ok((None, false));
        }

        // Assume range support if the header is missing
        let supports_range = response
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v != "none")
            .unwrap_or(true);

        Ok((content_length_of(&response), supports_range))
    }
}

fn content_length_of(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

/// Append the response body to `path`.
async fn stream_to_file(response: Response, path: &Path, progress: &mut DownloadProgress) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .context("Failed to open output file")?;

    let mut stream = response.bytes_stream();
    let mut bytes_since_log = 0u64;
    let log_interval = 10_000_000;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading response chunk")?;
        file.write_all(&chunk).await.context("Error writing to file")?;

        progress.downloaded_bytes += chunk.len() as u64;
        bytes_since_log += chunk.len() as u64;

        if bytes_since_log >= log_interval {
            bytes_since_log = 0;
            if let Some(percent) = progress.percent_complete() {
                debug!(
                    downloaded = progress.downloaded_bytes,
                    total = ?progress.total_bytes,
                    percent = format!("{:.1}%", percent),
                    "Download progress"
                );
            }
        }
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 server: HEAD always succeeds, the first
    /// `fail_first` GETs answer 500.
    async fn spawn_server(body: Vec<u8>, fail_first: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let gets = Arc::new(AtomicUsize::new(0));
        let counter = gets.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = body.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: none\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let response = if request.starts_with(b"HEAD") {
                        head.into_bytes()
                    } else if counter.fetch_add(1, Ordering::SeqCst) < fail_first {
                        b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_vec()
                    } else {
                        let mut r = head.into_bytes();
                        r.extend_from_slice(&body);
                        r
                    };
                    socket.write_all(&response).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });

        (format!("http://{}", addr), gets)
    }

    fn test_config(dir: &Path) -> DownloadConfig {
        DownloadConfig {
            max_retries: 2,
            initial_retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(40),
            request_timeout: Duration::from_secs(10),
            max_concurrent: 2,
            output_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_progress_percent() {
        let progress = DownloadProgress {
            total_bytes: Some(1000),
            downloaded_bytes: 500,
            started_at: Instant::now(),
            retry_count: 0,
        };
        assert_eq!(progress.percent_complete(), Some(50.0));
    }

    #[test]
    fn test_progress_no_total() {
        let progress = DownloadProgress::new();
        assert_eq!(progress.percent_complete(), None);
    }

    #[tokio::test]
    async fn test_download_completes() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"lat3940_lon-106-105 tile bytes".to_vec();
        let (base, _) = spawn_server(body.clone(), 0).await;

        let manager = DownloadManager::new(test_config(dir.path())).unwrap();
        let path = manager
            .download(&format!("{}/ph/lat3940_lon-106-105.tif", base), "lat3940_lon-106-105.tif")
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert!(!dir.path().join("lat3940_lon-106-105.tif.partial").exists());
    }

    #[tokio::test]
    async fn test_download_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (base, gets) = spawn_server(b"ok".to_vec(), 2).await;

        let manager = DownloadManager::new(test_config(dir.path())).unwrap();
        let path = manager.download(&format!("{}/a.tif", base), "a.tif").await.unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"ok");
        assert_eq!(gets.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_download_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let (base, gets) = spawn_server(b"never".to_vec(), usize::MAX).await;

        let manager = DownloadManager::new(test_config(dir.path())).unwrap();
        let err = manager.download(&format!("{}/a.tif", base), "a.tif").await.unwrap_err();

        assert!(err.to_string().contains("after 3 retries"));
        assert_eq!(gets.load(Ordering::SeqCst), 3);
        assert!(!dir.path().join("a.tif").exists());
    }

    #[tokio::test]
    async fn test_existing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tif"), b"cached").unwrap();

        let manager = DownloadManager::new(test_config(dir.path())).unwrap();
        // Nothing listens on this port, so any request would fail.
        let path = manager.download("http://127.0.0.1:9/a.tif", "a.tif").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_download_all_mixes_sources() {
        let dir = tempfile::tempdir().unwrap();
        let (base, _) = spawn_server(b"tile".to_vec(), 0).await;
        let local = dir.path().join("local.zarr");

        let manager = DownloadManager::new(test_config(&dir.path().join("out"))).unwrap();
        let summary = manager
            .download_all(&[
                TileSource::Url(format!("{}/t1.tif", base)),
                TileSource::Url(format!("{}/t2.tif", base)),
                TileSource::Path(local.clone()),
                TileSource::Url(format!("{}/", base)),
            ])
            .await
            .unwrap();

        assert_eq!(summary.completed.len(), 3);
        assert!(summary.completed.contains(&local));
        assert!(dir.path().join("out").join("t2.tif").exists());
        assert_eq!(summary.failed.len(), 1);
    }
}
