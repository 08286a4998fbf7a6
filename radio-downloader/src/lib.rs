//! radio-downloader - résolution d'une piste en fichier MP3 local
//!
//! Chaque source (`youtube`, `jiosaavn`, `soundcloud`, `fallback`/`local`) a
//! sa propre stratégie de récupération, mais toutes passent par le même
//! [`radio_cache::FileCache`] : un hit de cache court-circuite tout
//! téléchargement, et un téléchargement réussi est admis dans le cache
//! avant que son chemin ne soit renvoyé à l'appelant.

mod error;
mod jiosaavn;
mod subprocess;

pub use error::{DownloadError, Result};

use radio_cache::{sanitize_title, FileCache};
use radio_store::UrlType;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct MediaDownloaderConfig {
    pub tracks_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ytdlp_path: String,
    pub cookies_path: PathBuf,
}

impl Default for MediaDownloaderConfig {
    fn default() -> Self {
        Self {
            tracks_dir: PathBuf::from("media/tracks"),
            ffmpeg_path: "ffmpeg".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            cookies_path: PathBuf::from("config/cookies.txt"),
        }
    }
}

pub struct MediaDownloader {
    cache: Arc<FileCache>,
    http: reqwest::Client,
    config: MediaDownloaderConfig,
}

impl MediaDownloader {
    pub fn new(cache: Arc<FileCache>, config: MediaDownloaderConfig) -> Self {
        Self {
            cache,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Résout `(url, title, url_type)` en chemin de fichier MP3 local.
    ///
    /// `fallback`/`local` court-circuitent le cache et renvoient `url`
    /// inchangé, tel quel.
    pub async fn fetch(&self, url: &str, title: &str, url_type: UrlType) -> Result<PathBuf> {
        if matches!(url_type, UrlType::Fallback | UrlType::Local) {
            return Ok(PathBuf::from(url));
        }

        if let Some(cached) = self.cache.lookup(title).await? {
            tracing::debug!(%title, "cache hit, skipping download");
            return Ok(cached);
        }

        tokio::fs::create_dir_all(&self.config.tracks_dir).await?;
        let sanitized = sanitize_title(title);

        let downloaded = match url_type {
            UrlType::Youtube | UrlType::Soundcloud => {
                self.download_via_ytdlp(url, &sanitized).await?
            }
            UrlType::Jiosaavn => self.download_jiosaavn(url, &sanitized).await?,
            UrlType::Fallback | UrlType::Local => unreachable!("handled above"),
        };

        let cached_path = self.cache.admit(&downloaded, title).await?;
        tracing::info!(%title, path = %cached_path.display(), "downloaded and cached track");
        Ok(cached_path)
    }

    async fn download_via_ytdlp(&self, url: &str, sanitized_title: &str) -> Result<PathBuf> {
        let output = self.config.tracks_dir.join(format!("{sanitized_title}.mp3"));

        let without_cookies = subprocess::run(self.ytdlp_command(url, &output, false), "yt-dlp").await;
        if without_cookies.is_ok() {
            return Ok(output);
        }

        if self.cookie_jar_has_valid_lines().await {
            tracing::warn!("youtube extraction without cookies failed, retrying with cookies");
            subprocess::run(self.ytdlp_command(url, &output, true), "yt-dlp").await?;
            return Ok(output);
        }

        Err(without_cookies.unwrap_err())
    }

    fn ytdlp_command(&self, url: &str, output: &std::path::Path, use_cookies: bool) -> Command {
        let mut cmd = Command::new(&self.config.ytdlp_path);
        cmd.arg("-f")
            .arg("bestaudio/best")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("192K")
            .arg("--ffmpeg-location")
            .arg(&self.config.ffmpeg_path)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("-o")
            .arg(output);

        if use_cookies {
            cmd.arg("--cookies").arg(&self.config.cookies_path);
        }

        cmd.arg(url);
        cmd
    }

    async fn download_jiosaavn(&self, encrypted_url: &str, sanitized_title: &str) -> Result<PathBuf> {
        let stream_url = jiosaavn::decrypt_to_320kbps_url(encrypted_url)?;

        let temp_path = self
            .config
            .tracks_dir
            .join(format!("temp_{sanitized_title}.mp3"));
        let output = self.config.tracks_dir.join(format!("{sanitized_title}.mp3"));

        let bytes = self.http.get(&stream_url).send().await?.bytes().await?;
        tokio::fs::write(&temp_path, &bytes).await?;

        let mut cmd = Command::new(&self.config.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(&temp_path)
            .arg("-acodec")
            .arg("libmp3lame")
            .arg("-aq")
            .arg("6")
            .arg(&output);

        let result = subprocess::run(cmd, "ffmpeg").await;
        let _ = tokio::fs::remove_file(&temp_path).await;
        result?;

        Ok(output)
    }

    async fn cookie_jar_has_valid_lines(&self) -> bool {
        let Ok(content) = tokio::fs::read_to_string(&self.config.cookies_path).await else {
            return false;
        };
        content.lines().any(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#') && line.contains(".youtube.com")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_and_local_bypass_cache_and_download() {
        let temp = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(temp.path().join("cache"), 1024 * 1024).unwrap());
        let downloader = MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                tracks_dir: temp.path().join("tracks"),
                ..Default::default()
            },
        );

        let path = downloader
            .fetch("/media/fallback/song.mp3", "Song", UrlType::Fallback)
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from("/media/fallback/song.mp3"));
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_download() {
        let temp = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(temp.path().join("cache"), 1024 * 1024).unwrap());

        let src = temp.path().join("incoming.mp3");
        tokio::fs::write(&src, b"already downloaded").await.unwrap();
        let cached_path = cache.admit(&src, "Known Song").await.unwrap();

        let downloader = MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                tracks_dir: temp.path().join("tracks"),
                ..Default::default()
            },
        );

        let path = downloader
            .fetch("https://example/x", "Known Song", UrlType::Youtube)
            .await
            .unwrap();
        assert_eq!(path, cached_path);
    }

    #[tokio::test]
    async fn cookie_jar_detects_valid_youtube_cookie_lines() {
        let temp = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(temp.path().join("cache"), 1024 * 1024).unwrap());
        let cookies_path = temp.path().join("cookies.txt");
        tokio::fs::write(
            &cookies_path,
            "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tNAME\tvalue\n",
        )
        .await
        .unwrap();

        let downloader = MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                cookies_path,
                ..Default::default()
            },
        );

        assert!(downloader.cookie_jar_has_valid_lines().await);
    }

    #[tokio::test]
    async fn missing_cookie_jar_is_not_valid() {
        let temp = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileCache::new(temp.path().join("cache"), 1024 * 1024).unwrap());

        let downloader = MediaDownloader::new(
            cache,
            MediaDownloaderConfig {
                cookies_path: temp.path().join("does-not-exist.txt"),
                ..Default::default()
            },
        );

        assert!(!downloader.cookie_jar_has_valid_lines().await);
    }
}
