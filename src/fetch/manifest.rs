//! master.json マニフェストからのトラック再構成
//!
//! 映像/音声はそれぞれ init_segment (base64) と分割セグメントで配信される。
//! トラックのURLは「マニフェストURL → base_url → トラックの base_url」の順で解決する。

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::browser::Cookie;
use crate::error::ArchiveError;

use super::direct::{append_body, authorized_get};

#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub init_segment: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub video: Vec<Track>,
    #[serde(default)]
    pub audio: Vec<Track>,
}

impl Manifest {
    pub fn parse(data: &[u8]) -> Result<Self, ArchiveError> {
        serde_json::from_slice(data)
            .map_err(|e| ArchiveError::Manifest(format!("invalid master.json: {}", e)))
    }

    /// 最高ビットレートの映像トラック
    pub fn best_video(&self) -> Option<&Track> {
        self.video.iter().max_by_key(|t| t.bitrate)
    }

    /// 最高ビットレートの音声トラック
    pub fn best_audio(&self) -> Option<&Track> {
        self.audio.iter().max_by_key(|t| t.bitrate)
    }

    /// トラックのセグメント基準URL
    pub fn track_base(&self, manifest_url: &Url, track: &Track) -> Result<Url, ArchiveError> {
        manifest_url
            .join(&self.base_url)
            .and_then(|base| base.join(&track.base_url))
            .map_err(|e| ArchiveError::Manifest(format!("bad base URL for track {}: {}", track.id, e)))
    }
}

impl Track {
    pub fn init_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        if self.init_segment.is_empty() {
            return Ok(Vec::new());
        }
        base64::engine::general_purpose::STANDARD
            .decode(self.init_segment.as_bytes())
            .map_err(|e| ArchiveError::Manifest(format!("bad init segment in track {}: {}", self.id, e)))
    }
}

/// マニフェストを取得して解析
pub async fn fetch_manifest(
    client: &Client,
    url: &Url,
    cookies: &[Cookie],
    referrer: Option<&str>,
) -> Result<Manifest, ArchiveError> {
    debug!("Fetching manifest {}", url);
    let response = authorized_get(client, url.as_str(), cookies, referrer)
        .send()
        .await
        .map_err(|e| ArchiveError::Fetch(format!("{}: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(ArchiveError::Manifest(format!(
            "{} answered {}",
            url,
            response.status()
        )));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| ArchiveError::Fetch(format!("{}: {}", url, e)))?;
    Manifest::parse(&body)
}

/// init セグメント + 全セグメントを順に `file` へ書く
pub async fn write_track(
    client: &Client,
    manifest: &Manifest,
    manifest_url: &Url,
    track: &Track,
    file: &mut tokio::fs::File,
) -> Result<u64, ArchiveError> {
    let base = manifest.track_base(manifest_url, track)?;
    info!(
        "Downloading track {} ({} bps, {} segments)",
        track.id,
        track.bitrate,
        track.segments.len()
    );

    let init = track.init_bytes()?;
    file.write_all(&init)
        .await
        .map_err(|e| ArchiveError::Fetch(format!("write failed: {}", e)))?;
    let mut written = init.len() as u64;

    for segment in &track.segments {
        let segment_url = base
            .join(&segment.url)
            .map_err(|e| ArchiveError::Manifest(format!("bad segment URL {}: {}", segment.url, e)))?;
        let response = client
            .get(segment_url.as_str())
            .send()
            .await
            .map_err(|e| ArchiveError::Fetch(format!("{}: {}", segment_url, e)))?;
        if !response.status().is_success() {
            return Err(ArchiveError::Fetch(format!(
                "{} answered {}",
                segment_url,
                response.status()
            )));
        }
        written += append_body(response, file).await?;
    }

    file.flush()
        .await
        .map_err(|e| ArchiveError::Fetch(format!("write failed: {}", e)))?;
    Ok(written)
}
