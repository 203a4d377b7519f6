//! 全体の流れ: ログイン → 一覧 → アイテムごとに（スナップショット → 判定 → 解決 → 取得）
//!
//! 全体を制限時間付きで実行し、どの段階で時間切れになっても `DeadlineExceeded` を返す。

use std::path::PathBuf;

use tracing::{error, info};

use crate::config::{ArchiverConfig, FailurePolicy};
use crate::error::{ArchiveError, Step};
use crate::fetch::Fetcher;
use crate::site::{
    classify, list_items, locate, login, require_known, CatalogItem, Credentials, MediaKind,
    MediaReference, OutputLayout, Selectors,
};
use crate::traits::BrowserDriver;

/// 実行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Authenticating,
    Enumerating,
    /// 一覧中の位置
    ProcessingItem(usize),
    Done,
    Failed,
}

/// 1アイテムの処理結果
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub url: String,
    pub slug: String,
    pub kind: MediaKind,
    pub reference: MediaReference,
    pub snapshot: PathBuf,
    /// URL表示のみモードでは None
    pub media: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ItemFailure {
    pub url: String,
    pub error: ArchiveError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// 一覧で見つかったアイテム数
    pub total: usize,
    pub listing_snapshot: Option<PathBuf>,
    pub items: Vec<ItemOutcome>,
    pub failures: Vec<ItemFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

fn at(url: &str, step: Step) -> impl FnOnce(ArchiveError) -> ArchiveError + '_ {
    move |e| e.for_item(url, step)
}

pub struct Orchestrator {
    config: ArchiverConfig,
    selectors: Selectors,
    layout: OutputLayout,
    fetcher: Fetcher,
    state: RunState,
}

impl Orchestrator {
    pub fn new(config: ArchiverConfig) -> Result<Self, ArchiveError> {
        let fetcher = Fetcher::new(config.browser.proxy.as_deref(), config.remux_tool.clone())?;
        let layout = OutputLayout::new(config.output_dir.clone(), config.snapshot_format);
        Ok(Self {
            config,
            selectors: Selectors::default(),
            layout,
            fetcher,
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        info!("State: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// 制限時間内で全体を実行
    pub async fn run<B: BrowserDriver + ?Sized>(
        &mut self,
        browser: &mut B,
    ) -> Result<RunReport, ArchiveError> {
        let deadline = self.config.deadline;
        let result = tokio::time::timeout(deadline, self.run_stages(browser)).await;

        match result {
            Ok(Ok(report)) => {
                self.transition(RunState::Done);
                Ok(report)
            }
            Ok(Err(e)) => {
                self.transition(RunState::Failed);
                Err(e)
            }
            Err(_) => {
                self.transition(RunState::Failed);
                Err(ArchiveError::DeadlineExceeded(deadline))
            }
        }
    }

    async fn run_stages<B: BrowserDriver + ?Sized>(
        &mut self,
        browser: &mut B,
    ) -> Result<RunReport, ArchiveError> {
        let mut report = RunReport::default();

        self.transition(RunState::Authenticating);
        login(
            browser,
            &self.selectors.login,
            Credentials {
                username: &self.config.username,
                password: &self.config.password,
                expect_cookie_banner: self.config.expect_cookie_banner,
            },
            self.config.element_wait,
        )
        .await?;

        self.transition(RunState::Enumerating);
        let catalog = list_items(
            browser,
            &self.selectors.listing,
            self.config.snapshot_format,
        )
        .await?;

        tokio::fs::create_dir_all(self.layout.dir()).await?;
        let listing_snapshot = self.layout.listing_snapshot();
        tokio::fs::write(&listing_snapshot, &catalog.snapshot).await?;
        info!("Screenshot saved to {}", listing_snapshot.display());
        report.listing_snapshot = Some(listing_snapshot);
        report.total = catalog.items.len();

        for (index, item) in catalog.items.iter().enumerate() {
            self.transition(RunState::ProcessingItem(index));
            match self.process_item(browser, item).await {
                Ok(outcome) => report.items.push(outcome),
                Err(e) if e.is_deadline() => return Err(e),
                Err(e) => match self.config.failure_policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Continue => {
                        error!("{}", e);
                        report.failures.push(ItemFailure {
                            url: item.url.clone(),
                            error: e,
                        });
                    }
                },
            }
        }

        info!(
            "Processed {} items ({} failed)",
            catalog.items.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn process_item<B: BrowserDriver + ?Sized>(
        &self,
        browser: &mut B,
        item: &CatalogItem,
    ) -> Result<ItemOutcome, ArchiveError> {
        let url = item.url.as_str();
        let wait = self.config.element_wait;
        let slug = item.slug().map_err(at(url, Step::Snapshot))?;
        info!("Retrieving {}", slug);

        browser
            .navigate(url, None)
            .await
            .map_err(at(url, Step::Snapshot))?;
        browser
            .wait_visible(self.selectors.item.heading, wait)
            .await
            .map_err(at(url, Step::Snapshot))?;
        let data = browser
            .capture(self.config.snapshot_format)
            .await
            .map_err(at(url, Step::Snapshot))?;
        let snapshot = self.layout.item_snapshot(&slug);
        tokio::fs::write(&snapshot, &data)
            .await
            .map_err(|e| ArchiveError::from(e).for_item(url, Step::Snapshot))?;
        info!("Screenshot saved at {}", snapshot.display());

        let kind = classify(browser, &self.selectors.item, wait)
            .await
            .and_then(|kind| require_known(kind, url))
            .map_err(at(url, Step::Classify))?;

        let located = locate(
            browser,
            kind,
            &self.selectors.item,
            &self.selectors.player,
            wait,
            self.config.settle,
        )
        .await
        .map_err(at(url, Step::Locate))?;

        let media = if self.config.just_print_urls {
            // URL表示のみモード: 取得・結合はしない
            println!("{}", located.reference);
            None
        } else {
            let dest = self
                .layout
                .media(&slug, kind)
                .ok_or_else(|| ArchiveError::UnknownMediaType(url.to_string()))
                .map_err(at(url, Step::Fetch))?;
            self.fetcher
                .fetch(
                    &located.reference,
                    &located.cookies,
                    located.referrer.as_deref(),
                    &dest,
                )
                .await
                .map_err(at(url, Step::Fetch))?;
            Some(dest)
        };

        Ok(ItemOutcome {
            url: item.url.clone(),
            slug,
            kind,
            reference: located.reference,
            snapshot,
            media,
        })
    }
}
