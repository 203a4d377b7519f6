//! 会員一覧ページからアイテムを列挙

use tracing::{debug, info, warn};
use url::Url;

use crate::browser::SnapshotFormat;
use crate::error::ArchiveError;
use crate::traits::BrowserDriver;

use super::selectors::ListingPage;
use super::types::{Catalog, CatalogItem};

/// 一覧ページのアイテムURL（文書順）と一覧のスナップショット
///
/// リンクが0件でもエラーにはしない。
pub async fn list_items<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    page: &ListingPage,
    format: SnapshotFormat,
) -> Result<Catalog, ArchiveError> {
    info!("Listing items from {}", page.url);
    browser.navigate(page.url, None).await?;

    let hrefs = browser
        .query_attributes(page.item_link, page.item_link_attr)
        .await?;

    let base = Url::parse(page.url).ok();
    let mut items = Vec::with_capacity(hrefs.len());
    for href in hrefs {
        match href {
            Some(href) if !href.trim().is_empty() => {
                // 相対リンクは一覧ページ基準で解決
                let href = href.trim();
                let url = base
                    .as_ref()
                    .and_then(|base| base.join(href).ok())
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| href.to_string());
                items.push(CatalogItem::new(url));
            }
            _ => warn!("Skipping item link without {}", page.item_link_attr),
        }
    }
    debug!("Found {} item links", items.len());

    let snapshot = browser.capture(format).await?;
    info!("Catalog has {} items", items.len());

    Ok(Catalog { items, snapshot })
}
