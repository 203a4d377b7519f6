//! Barbieri+ アーカイバライブラリ
//!
//! - 会員サイトにログインし、一覧ページのスクリーンショットを保存
//! - アイテムごとにスクリーンショットを撮り、動画 (mp4) またはPDFをダウンロード
//! - master.json 配信の動画は映像/音声を取得して ffmpeg で結合
//!
//! # サービス使用例
//!
//! ```rust,ignore
//! use bbplus::{ArchiveRequest, ArchiveService, ArchiverConfig};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ArchiveService::new();
//!
//!     let config = ArchiverConfig::new("user", "password")
//!         .with_output_dir("./barbieri")
//!         .with_just_print_urls(true);
//!
//!     let report = service.call(ArchiveRequest::new(config)).await.unwrap();
//!     println!("Items: {}", report.items.len());
//! }
//! ```
//!
//! # ブラウザを直接使う例
//!
//! ```rust,ignore
//! use bbplus::{ArchiverConfig, BrowserDriver, ChromeSession, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ArchiverConfig::new("user", "password");
//!     let mut session = ChromeSession::open(&config.browser).await.unwrap();
//!
//!     let mut orchestrator = Orchestrator::new(config).unwrap();
//!     let result = orchestrator.run(&mut session).await;
//!     session.close().await.unwrap();
//!     println!("{:?}", result.map(|r| r.items.len()));
//! }
//! ```

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod service;
pub mod site;
pub mod traits;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use browser::{ChromeSession, Cookie, SnapshotFormat};
pub use config::{ArchiverConfig, BrowserOptions, FailurePolicy, FileConfig};
pub use error::{ArchiveError, Step};
pub use fetch::Fetcher;
pub use orchestrator::{ItemFailure, ItemOutcome, Orchestrator, RunReport, RunState};
pub use service::{ArchiveRequest, ArchiveService};
pub use traits::BrowserDriver;

// サイト固有の型
pub use site::{CatalogItem, MediaKind, MediaReference, Selectors};
