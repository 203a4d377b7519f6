//! ブラウザセッション関連の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// クッキーの SameSite ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
    #[default]
    Default,
}

/// セッションから取り出したクッキーのスナップショット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
    /// None はセッションクッキー
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            domain: String::new(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: SameSite::Default,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|at| at <= now).unwrap_or(false)
    }
}

/// 全ページスナップショットの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Png,
    Pdf,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Png => "png",
            SnapshotFormat::Pdf => "pdf",
        }
    }
}
