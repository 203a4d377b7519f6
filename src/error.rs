use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// アイテム処理のどの段階で失敗したか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Snapshot,
    Classify,
    Locate,
    Fetch,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Snapshot => "snapshot",
            Step::Classify => "classify",
            Step::Locate => "locate",
            Step::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("ブラウザ起動エラー: {0}")]
    Launch(String),

    #[error("認証情報が不正です: {0} が空です")]
    InvalidCredentials(&'static str),

    #[error("ログインエラー ({step}): {message}")]
    LoginFailed { step: &'static str, message: String },

    #[error("コンテンツコンテナが見つかりません: {0}")]
    ContainerNotFound(String),

    #[error("不明なメディア種別: {0}")]
    UnknownMediaType(String),

    #[error("有効な動画フレームURLがありません: src='{primary}', suppressedsrc='{alternate}'")]
    NoValidVideoFrame { primary: String, alternate: String },

    #[error("プレイヤーHTMLに動画URLがありません")]
    NoVideoUrl,

    #[error("PDFリンクが見つかりません: {0}")]
    NoDocumentLink(String),

    #[error("ダウンロードエラー: {0}")]
    Fetch(String),

    #[error("リマックスエラー ({status}): {stderr}")]
    Remux { status: String, stderr: String },

    #[error("タイムアウト: 全体の制限時間 {0:?} を超過しました")]
    DeadlineExceeded(Duration),

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("要素が見つかりません: {0}")]
    ElementNotFound(String),

    #[error("マニフェストエラー: {0}")]
    Manifest(String),

    #[error("アイテムURLが不正です: {0}")]
    InvalidItemUrl(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("アイテム '{url}' の {step} で失敗: {source}")]
    Item {
        url: String,
        step: Step,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /// 識別情報（アイテムURL・段階）でラップする
    pub fn for_item(self, url: impl Into<String>, step: Step) -> Self {
        // 期限切れはどの段階でも同じ条件として扱う
        if self.is_deadline() {
            return self;
        }
        ArchiveError::Item {
            url: url.into(),
            step,
            source: Box::new(self),
        }
    }

    pub fn is_deadline(&self) -> bool {
        match self {
            ArchiveError::DeadlineExceeded(_) => true,
            ArchiveError::Item { source, .. } => source.is_deadline(),
            _ => false,
        }
    }

    /// ラップを剥がした元のエラー
    pub fn root(&self) -> &ArchiveError {
        match self {
            ArchiveError::Item { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for ArchiveError {
    fn from(e: reqwest::Error) -> Self {
        ArchiveError::Fetch(e.to_string())
    }
}
