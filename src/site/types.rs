//! アイテム・メディア関連の型定義

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::browser::{Cookie, SnapshotFormat};
use crate::error::ArchiveError;

/// 一覧ページの1エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub url: String,
}

impl CatalogItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn slug(&self) -> Result<String, ArchiveError> {
        item_slug(&self.url)
    }
}

/// 一覧の取得結果
#[derive(Debug, Clone)]
pub struct Catalog {
    /// 文書順
    pub items: Vec<CatalogItem>,
    pub snapshot: Vec<u8>,
}

/// コンテナの class トークンから判定したメディア種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Unrecognized,
    Video,
    Document,
}

impl MediaKind {
    /// 保存するメディアファイルの拡張子
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            MediaKind::Video => Some("mp4"),
            MediaKind::Document => Some("pdf"),
            MediaKind::Unrecognized => None,
        }
    }
}

/// ダウンロード対象の場所
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaReference {
    /// そのまま GET できるファイル
    Direct(String),
    /// 映像/音声トラックを再構成する必要のあるマニフェスト
    Manifest(String),
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaReference::Direct(url) => write!(f, "DIRECT {}", url),
            MediaReference::Manifest(url) => write!(f, "MANIFEST {}", url),
        }
    }
}

/// 解決済みメディアとダウンロードに必要なセッション情報
#[derive(Debug, Clone)]
pub struct LocatedMedia {
    pub reference: MediaReference,
    pub cookies: Vec<Cookie>,
    pub referrer: Option<String>,
}

/// URLのパス末尾セグメント
pub fn item_slug(url: &str) -> Result<String, ArchiveError> {
    let parsed =
        Url::parse(url).map_err(|e| ArchiveError::InvalidItemUrl(format!("{}: {}", url, e)))?;
    let slug = parsed
        .path()
        .trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if slug.is_empty() {
        return Err(ArchiveError::InvalidItemUrl(format!(
            "{}: empty path, cannot derive file name",
            url
        )));
    }
    Ok(slug.to_string())
}

/// 出力ファイルの配置
#[derive(Debug, Clone)]
pub struct OutputLayout {
    dir: PathBuf,
    snapshot_format: SnapshotFormat,
}

impl OutputLayout {
    pub fn new(dir: impl Into<PathBuf>, snapshot_format: SnapshotFormat) -> Self {
        Self {
            dir: dir.into(),
            snapshot_format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<outdir>/index.{png|pdf}`
    pub fn listing_snapshot(&self) -> PathBuf {
        self.dir
            .join(format!("index.{}", self.snapshot_format.extension()))
    }

    /// `<outdir>/<slug>.{png|pdf}`
    pub fn item_snapshot(&self, slug: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", slug, self.snapshot_format.extension()))
    }

    /// `<outdir>/<slug>.{mp4|pdf}`
    pub fn media(&self, slug: &str, kind: MediaKind) -> Option<PathBuf> {
        kind.extension()
            .map(|ext| self.dir.join(format!("{}.{}", slug, ext)))
    }
}
