//! Barbieri+ サイト固有の処理
//!
//! ログイン → 一覧取得 → 種別判定 → ダウンロードURL解決。
//! どの段階も `BrowserDriver` 越しにページを操作する。

mod catalog;
mod classify;
mod locate;
mod login;
mod selectors;
mod types;

pub use catalog::list_items;
pub use classify::{classify, classify_tokens, require_known};
pub use locate::{choose_frame_url, locate, locate_document, locate_video, scan_urls, select_reference};
pub use login::{login, Credentials};
pub use selectors::{ItemPage, ListingPage, LoginPage, PlayerFrame, Selectors, LISTING_URL, LOGIN_URL};
pub use types::{
    item_slug, Catalog, CatalogItem, LocatedMedia, MediaKind, MediaReference, OutputLayout,
};
