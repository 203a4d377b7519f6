use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tower::Service;
use tracing::{info, warn};

use crate::browser::ChromeSession;
use crate::config::ArchiverConfig;
use crate::error::ArchiveError;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::traits::BrowserDriver;

/// アーカイブ実行リクエスト
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub config: ArchiverConfig,
}

impl ArchiveRequest {
    pub fn new(config: ArchiverConfig) -> Self {
        Self { config }
    }
}

impl From<ArchiverConfig> for ArchiveRequest {
    fn from(config: ArchiverConfig) -> Self {
        Self::new(config)
    }
}

/// tower::Serviceを実装したアーカイブサービス
///
/// 1回の呼び出しでブラウザを起動し、全工程を実行して必ずブラウザを閉じる。
#[derive(Debug, Clone, Default)]
pub struct ArchiveService {}

impl ArchiveService {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 制限時間内に `fut` を完了させる
async fn within_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, ArchiveError>
where
    F: Future<Output = Result<T, ArchiveError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| ArchiveError::DeadlineExceeded(deadline))?
}

/// 実行後、結果に関わらずブラウザを閉じる
pub async fn run_with_browser<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    config: ArchiverConfig,
) -> Result<RunReport, ArchiveError> {
    let result = match Orchestrator::new(config) {
        Ok(mut orchestrator) => orchestrator.run(browser).await,
        Err(e) => Err(e),
    };
    if let Err(e) = browser.close().await {
        warn!("Failed to close browser: {}", e);
    }
    result
}

impl Service<ArchiveRequest> for ArchiveService {
    type Response = RunReport;
    type Error = ArchiveError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ArchiveRequest) -> Self::Future {
        info!("Archive request received: user={}", req.config.username);

        Box::pin(async move {
            // 起動時間も全体の制限時間に含める
            let started = Instant::now();
            let deadline = req.config.deadline;
            let mut session =
                within_deadline(deadline, ChromeSession::open(&req.config.browser)).await?;

            let mut config = req.config;
            config.deadline = deadline.saturating_sub(started.elapsed());
            let report = run_with_browser(&mut session, config).await?;

            info!(
                "Archive finished: {} items saved, {} failed",
                report.items.len(),
                report.failures.len()
            );
            Ok(report)
        })
    }
}
