use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::browser::{Cookie, SnapshotFormat};
use crate::error::ArchiveError;

/// 要素の存在確認のポーリング間隔
const PRESENCE_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// ブラウザエンジン操作のインターフェース
///
/// パイプラインの各段階はこのトレイト越しにページを操作する。
/// 本番は `ChromeSession`、テストではフィクスチャHTMLを返す偽実装を使う。
/// セレクタはすべてCSSセレクタ。
#[async_trait]
pub trait BrowserDriver: Send {
    /// URLへ遷移（referrer 指定可）
    async fn navigate(&mut self, url: &str, referrer: Option<&str>) -> Result<(), ArchiveError>;

    /// 要素が表示されるまで待機
    async fn wait_visible(&mut self, selector: &str, timeout: Duration)
        -> Result<(), ArchiveError>;

    /// 要素が1つ以上DOMに現れるまで待機（表示状態は問わない）
    async fn wait_present(&mut self, selector: &str, timeout: Duration) -> Result<(), ArchiveError> {
        let start = Instant::now();
        loop {
            match self.query_attributes(selector, "class").await {
                Ok(found) if !found.is_empty() => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("Presence check error: {}", e),
            }
            if start.elapsed() >= timeout {
                return Err(ArchiveError::ElementNotFound(format!(
                    "'{}' not present within {:?}",
                    selector, timeout
                )));
            }
            tokio::time::sleep(PRESENCE_CHECK_INTERVAL).await;
        }
    }

    /// 要素をクリック
    async fn click(&mut self, selector: &str) -> Result<(), ArchiveError>;

    /// 入力欄にテキストを入力
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), ArchiveError>;

    /// 要素が属するフォームを送信
    async fn submit(&mut self, selector: &str) -> Result<(), ArchiveError>;

    /// 一致する全要素の属性値（文書順）
    async fn query_attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, ArchiveError>;

    /// 最初に一致した要素の属性値
    async fn read_attribute(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, ArchiveError> {
        Ok(self
            .query_attributes(selector, name)
            .await?
            .into_iter()
            .next()
            .flatten())
    }

    /// 現在のページURL
    async fn current_url(&mut self) -> Result<String, ArchiveError>;

    /// 描画済みの文書全体のHTML
    async fn document_markup(&mut self) -> Result<String, ArchiveError>;

    /// セッションの全クッキー
    async fn cookies(&mut self) -> Result<Vec<Cookie>, ArchiveError>;

    /// 全ページのスナップショット（PNG/PDF）
    async fn capture(&mut self, format: SnapshotFormat) -> Result<Vec<u8>, ArchiveError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ArchiveError>;
}
