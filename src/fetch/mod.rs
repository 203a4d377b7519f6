//! 解決済みメディアのダウンロード
//!
//! 直接URLはそのまま保存し、マニフェストは映像/音声トラックを一時ファイルに落として
//! 外部ツールで1ファイルに結合する。

mod direct;
mod manifest;
mod remux;

use std::path::{Path, PathBuf};

use reqwest::Client;
use tracing::info;
use url::Url;

use crate::browser::Cookie;
use crate::config::PROGNAME;
use crate::error::ArchiveError;
use crate::site::MediaReference;

pub use direct::{cookie_header, fetch_direct};
pub use manifest::{fetch_manifest, write_track, Manifest, Segment, Track};
pub use remux::remux;

/// 認証付きHTTP取得と保存
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    remux_tool: PathBuf,
    /// トラック一時ファイルの置き場所（None ならOS既定）
    temp_dir: Option<PathBuf>,
}

impl Fetcher {
    pub fn new(proxy: Option<&str>, remux_tool: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let mut builder = Client::builder();
        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ArchiveError::Config(format!("invalid proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ArchiveError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            remux_tool: remux_tool.into(),
            temp_dir: None,
        })
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub async fn fetch(
        &self,
        reference: &MediaReference,
        cookies: &[Cookie],
        referrer: Option<&str>,
        dest: &Path,
    ) -> Result<(), ArchiveError> {
        match reference {
            MediaReference::Direct(url) => {
                fetch_direct(&self.client, url, cookies, referrer, dest).await?;
                Ok(())
            }
            MediaReference::Manifest(url) => {
                self.fetch_from_manifest(url, cookies, referrer, dest).await
            }
        }
    }

    /// 最高ビットレートの映像・音声を取得して結合
    async fn fetch_from_manifest(
        &self,
        url: &str,
        cookies: &[Cookie],
        referrer: Option<&str>,
        dest: &Path,
    ) -> Result<(), ArchiveError> {
        let manifest_url = Url::parse(url)
            .map_err(|e| ArchiveError::Manifest(format!("invalid manifest URL '{}': {}", url, e)))?;
        let manifest = fetch_manifest(&self.client, &manifest_url, cookies, referrer).await?;

        let video = manifest
            .best_video()
            .ok_or_else(|| ArchiveError::Manifest("no video track".into()))?;

        let Some(audio) = manifest.best_audio() else {
            // 音声トラックが無ければ映像だけをそのまま保存
            info!("Manifest has no audio track, saving video only");
            let mut file = tokio::fs::File::create(dest).await?;
            write_track(&self.client, &manifest, &manifest_url, video, &mut file).await?;
            return Ok(());
        };

        // 一時ファイルは drop 時に削除される
        let video_file = self.temp_track("video")?;
        let audio_file = self.temp_track("audio")?;

        info!("Downloading video stream to {}", video_file.path().display());
        let mut out = tokio::fs::File::from_std(video_file.reopen()?);
        write_track(&self.client, &manifest, &manifest_url, video, &mut out).await?;
        drop(out);

        info!("Downloading audio stream to {}", audio_file.path().display());
        let mut out = tokio::fs::File::from_std(audio_file.reopen()?);
        write_track(&self.client, &manifest, &manifest_url, audio, &mut out).await?;
        drop(out);

        remux(&self.remux_tool, video_file.path(), audio_file.path(), dest).await
    }

    fn temp_track(&self, kind: &str) -> Result<tempfile::NamedTempFile, ArchiveError> {
        let prefix = format!("{}-{}-", PROGNAME, kind);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".mp4");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        file.map_err(ArchiveError::from)
    }
}
