//! コンテナの class トークンからメディア種別を判定

use std::time::Duration;

use tracing::debug;

use crate::error::ArchiveError;
use crate::traits::BrowserDriver;

use super::selectors::ItemPage;
use super::types::MediaKind;

/// class 属性値からの判定（純粋関数）
///
/// 表を上から見ていき、トークン集合に含まれる最初の行の種別を返す。
/// 表の順序だけで決まるので、トークンの並び順には依存しない。
pub fn classify_tokens(class_attr: &str, table: &[(&str, MediaKind)]) -> MediaKind {
    let tokens: Vec<&str> = class_attr.split_whitespace().collect();
    table
        .iter()
        .find(|(token, _)| tokens.contains(token))
        .map(|(_, kind)| *kind)
        .unwrap_or(MediaKind::Unrecognized)
}

/// 現在のアイテムページを判定
pub async fn classify<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    page: &ItemPage,
    wait: Duration,
) -> Result<MediaKind, ArchiveError> {
    browser
        .wait_visible(page.container, wait)
        .await
        .map_err(|e| match e {
            ArchiveError::ElementNotFound(msg) => ArchiveError::ContainerNotFound(msg),
            other => other,
        })?;

    let class_attr = browser
        .read_attribute(page.container, "class")
        .await?
        .ok_or_else(|| ArchiveError::ContainerNotFound(format!("{} has no class", page.container)))?;

    let kind = classify_tokens(&class_attr, page.kind_tokens);
    debug!("Media kind {:?} from class=\"{}\"", kind, class_attr);
    Ok(kind)
}

/// `classify` の結果が判定不能ならエラーにする
pub fn require_known(kind: MediaKind, context: &str) -> Result<MediaKind, ArchiveError> {
    match kind {
        MediaKind::Unrecognized => Err(ArchiveError::UnknownMediaType(context.to_string())),
        known => Ok(known),
    }
}
