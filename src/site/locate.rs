//! メディア種別ごとのダウンロードURL解決
//!
//! - 動画: 埋め込みプレイヤーの iframe に referrer 付きで入り、再生ボタンを押して
//!   描画されたHTMLからURLを拾う。mp4 を優先し、無ければ master.json マニフェスト
//! - PDF: ページ内の最初の `target=_blank` リンク

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use crate::error::ArchiveError;
use crate::traits::BrowserDriver;

use super::selectors::{ItemPage, PlayerFrame};
use super::types::{LocatedMedia, MediaKind, MediaReference};

/// スキーム付きURLだけを拾う
fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s"'<>\\`{}|^\[\]()]+"#)
            .expect("URL pattern is valid")
    })
}

/// HTML/スクリプト中のURL風の部分文字列（出現順）
pub fn scan_urls(markup: &str) -> Vec<String> {
    url_pattern()
        .find_iter(markup)
        .map(|m| {
            m.as_str()
                .replace("&amp;", "&")
                .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'))
                .to_string()
        })
        .filter(|u| Url::parse(u).map(|p| p.host().is_some()).unwrap_or(false))
        .collect()
}

/// 直接ファイルを優先し、無ければマニフェスト
pub fn select_reference(urls: &[String], player: &PlayerFrame) -> Option<MediaReference> {
    if let Some(direct) = urls
        .iter()
        .find(|u| u.ends_with(player.direct_suffix))
    {
        return Some(MediaReference::Direct(direct.clone()));
    }
    urls.iter()
        .find(|u| u.contains(player.manifest_marker))
        .map(|u| MediaReference::Manifest(u.clone()))
}

fn is_secure_absolute(candidate: &str) -> bool {
    candidate.starts_with("https://")
        && Url::parse(candidate)
            .map(|u| u.host().is_some())
            .unwrap_or(false)
}

/// src が正しければ src、そうでなければ suppressedsrc
pub fn choose_frame_url(
    primary: Option<&str>,
    alternate: Option<&str>,
) -> Result<String, ArchiveError> {
    let primary = primary.unwrap_or_default().trim();
    let alternate = alternate.unwrap_or_default().trim();

    if is_secure_absolute(primary) {
        return Ok(primary.to_string());
    }
    if is_secure_absolute(alternate) {
        debug!("Using suppressedsrc frame URL, src was '{}'", primary);
        return Ok(alternate.to_string());
    }
    Err(ArchiveError::NoValidVideoFrame {
        primary: primary.to_string(),
        alternate: alternate.to_string(),
    })
}

/// 動画URLの解決（現在ページはアイテムページ）
pub async fn locate_video<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    item: &ItemPage,
    player: &PlayerFrame,
    wait: Duration,
    settle: Duration,
) -> Result<LocatedMedia, ArchiveError> {
    browser.wait_visible(item.video_frame, wait).await?;
    let primary = browser
        .read_attribute(item.video_frame, item.frame_src)
        .await?;
    let alternate = browser
        .read_attribute(item.video_frame, item.frame_alternate_src)
        .await?;
    let frame_url = choose_frame_url(primary.as_deref(), alternate.as_deref())?;

    // 非公開動画は埋め込み元の referrer が無いと再生できない
    let referrer = browser.current_url().await?;
    info!("Navigating to player frame {}", frame_url);
    browser.navigate(&frame_url, Some(&referrer)).await?;

    browser.wait_visible(player.play_button, wait).await?;
    browser.click(player.play_button).await?;
    // プレイヤーは準備完了を通知しないので一定時間待つ
    sleep(settle).await;

    let markup = browser.document_markup().await?;
    let urls = scan_urls(&markup);
    debug!("Found {} URLs in player markup", urls.len());

    let reference = select_reference(&urls, player).ok_or(ArchiveError::NoVideoUrl)?;
    let cookies = browser.cookies().await?;
    info!("Resolved video: {}", reference);

    Ok(LocatedMedia {
        reference,
        cookies,
        referrer: Some(referrer),
    })
}

/// PDFリンクの解決
pub async fn locate_document<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    item: &ItemPage,
    wait: Duration,
) -> Result<LocatedMedia, ArchiveError> {
    // 折りたたまれたブロック内のリンクもあるので表示は待たない
    browser
        .wait_present(item.document_link, wait)
        .await
        .map_err(|e| match e {
            ArchiveError::ElementNotFound(msg) => ArchiveError::NoDocumentLink(msg),
            other => other,
        })?;

    let href = browser
        .read_attribute(item.document_link, "href")
        .await?
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| ArchiveError::NoDocumentLink(format!("{} has no href", item.document_link)))?;

    // 相対リンクは現在ページ基準で解決
    let current = browser.current_url().await?;
    let pdf_url = match Url::parse(&current).and_then(|base| base.join(href.trim())) {
        Ok(url) => url.to_string(),
        Err(_) => href.trim().to_string(),
    };

    let cookies = browser.cookies().await?;
    info!("Resolved document: {}", pdf_url);

    Ok(LocatedMedia {
        reference: MediaReference::Direct(pdf_url),
        cookies,
        referrer: None,
    })
}

/// 種別ごとの解決
pub async fn locate<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    kind: MediaKind,
    item: &ItemPage,
    player: &PlayerFrame,
    wait: Duration,
    settle: Duration,
) -> Result<LocatedMedia, ArchiveError> {
    match kind {
        MediaKind::Video => locate_video(browser, item, player, wait, settle).await,
        MediaKind::Document => locate_document(browser, item, wait).await,
        MediaKind::Unrecognized => Err(ArchiveError::UnknownMediaType(
            browser.current_url().await.unwrap_or_default(),
        )),
    }
}
