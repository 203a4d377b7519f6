//! 単一ファイルのダウンロード

use std::path::Path;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, RequestBuilder};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::browser::Cookie;
use crate::error::ArchiveError;

/// 有効期限内のクッキーを `Cookie` ヘッダ値にまとめる
pub fn cookie_header(cookies: &[Cookie], now: DateTime<Utc>) -> Option<String> {
    let pairs: Vec<String> = cookies
        .iter()
        .filter(|c| !c.is_expired(now))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// セッションのクッキーと referrer を付けた GET
pub(crate) fn authorized_get(
    client: &Client,
    url: &str,
    cookies: &[Cookie],
    referrer: Option<&str>,
) -> RequestBuilder {
    let mut request = client.get(url);
    if let Some(header) = cookie_header(cookies, Utc::now()) {
        request = request.header(COOKIE, header);
    }
    if let Some(referrer) = referrer.filter(|r| !r.is_empty()) {
        request = request.header(REFERER, referrer);
    }
    request
}

/// レスポンス本文をそのまま `dest` に書く
///
/// ステータスコードでは失敗にしない。転送・書き込みエラー時は途中のファイルを消す。
pub async fn fetch_direct(
    client: &Client,
    url: &str,
    cookies: &[Cookie],
    referrer: Option<&str>,
    dest: &Path,
) -> Result<u64, ArchiveError> {
    info!("Downloading {} to {}", url, dest.display());
    let response = authorized_get(client, url, cookies, referrer)
        .send()
        .await
        .map_err(|e| ArchiveError::Fetch(format!("{}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        warn!("{} answered {}, saving the body anyway", url, status);
    }

    let written = match stream_to_file(response, dest).await {
        Ok(written) => written,
        Err(e) => {
            if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                debug!("Failed to remove partial file {}: {}", dest.display(), remove_err);
            }
            return Err(e);
        }
    };

    info!("Saved {} bytes to {}", written, dest.display());
    Ok(written)
}

pub(crate) async fn stream_to_file(
    response: reqwest::Response,
    dest: &Path,
) -> Result<u64, ArchiveError> {
    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        ArchiveError::Fetch(format!("failed to create '{}': {}", dest.display(), e))
    })?;
    let written = append_body(response, &mut file).await?;
    file.flush().await.map_err(|e| {
        ArchiveError::Fetch(format!("failed to save file '{}': {}", dest.display(), e))
    })?;
    Ok(written)
}

/// 本文をチャンク単位でファイルへ追記
pub(crate) async fn append_body(
    response: reqwest::Response,
    file: &mut tokio::fs::File,
) -> Result<u64, ArchiveError> {
    let url = response.url().to_string();
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ArchiveError::Fetch(format!("{}: {}", url, e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ArchiveError::Fetch(format!("write failed: {}", e)))?;
        written += chunk.len() as u64;
    }
    Ok(written)
}
