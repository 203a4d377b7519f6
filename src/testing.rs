//! テスト用の偽ブラウザ
//!
//! URLごとのフィクスチャHTMLをCSSセレクタで問い合わせる。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{Cookie, SnapshotFormat};
use crate::error::ArchiveError;
use crate::traits::BrowserDriver;

#[derive(Default)]
pub struct FakeBrowser {
    pages: HashMap<String, String>,
    current: Option<String>,
    cookies: Vec<Cookie>,
    submit_target: Option<String>,
    stall: Option<Duration>,
    pub navigations: Vec<(String, Option<String>)>,
    pub typed: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub closed: bool,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// フォーム送信後に遷移するURL
    pub fn with_submit_target(mut self, url: &str) -> Self {
        self.submit_target = Some(url.to_string());
        self
    }

    /// 要素待機を毎回 `delay` だけ止める
    pub fn with_stall(mut self, delay: Duration) -> Self {
        self.stall = Some(delay);
        self
    }

    /// 現在ページのURLとHTML
    fn current_page(&self) -> Result<(&str, &str), ArchiveError> {
        let url = self
            .current
            .as_deref()
            .ok_or_else(|| ArchiveError::Navigation("no page loaded".into()))?;
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| ArchiveError::Navigation(format!("no fixture for {}", url)))?;
        Ok((url, html))
    }

    fn select_attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>, ArchiveError> {
        let (_, html) = self.current_page()?;
        let selector = Selector::parse(selector)
            .map_err(|e| ArchiveError::ElementNotFound(format!("bad selector {}: {:?}", selector, e)))?;
        let document = Html::parse_document(html);
        Ok(document
            .select(&selector)
            .map(|el| el.value().attr(name).map(str::to_string))
            .collect())
    }

    fn count(&self, selector: &str) -> Result<usize, ArchiveError> {
        Ok(self.select_attributes(selector, "class")?.len())
    }

    /// 最初に一致した要素が表示されているか（`display:none` / `hidden` の祖先を見る）
    fn first_visible(&self, selector: &str) -> Result<bool, ArchiveError> {
        let (_, html) = self.current_page()?;
        let parsed = Selector::parse(selector)
            .map_err(|e| ArchiveError::ElementNotFound(format!("bad selector {}: {:?}", selector, e)))?;
        let document = Html::parse_document(html);
        let Some(first) = document.select(&parsed).next() else {
            return Ok(false);
        };
        let hidden = std::iter::once(first)
            .chain(first.ancestors().filter_map(ElementRef::wrap))
            .any(|el| {
                let style: String = el
                    .value()
                    .attr("style")
                    .unwrap_or_default()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                el.value().attr("hidden").is_some() || style.contains("display:none")
            });
        Ok(!hidden)
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn navigate(&mut self, url: &str, referrer: Option<&str>) -> Result<(), ArchiveError> {
        self.navigations
            .push((url.to_string(), referrer.map(str::to_string)));
        if !self.pages.contains_key(url) {
            return Err(ArchiveError::Navigation(format!("no fixture for {}", url)));
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ArchiveError> {
        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }
        if !self.first_visible(selector)? {
            return Err(ArchiveError::ElementNotFound(format!(
                "'{}' not visible within {:?}",
                selector, timeout
            )));
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), ArchiveError> {
        if self.count(selector)? == 0 {
            return Err(ArchiveError::ElementNotFound(selector.to_string()));
        }
        self.clicks.push(selector.to_string());
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), ArchiveError> {
        if self.count(selector)? == 0 {
            return Err(ArchiveError::ElementNotFound(selector.to_string()));
        }
        self.typed.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn submit(&mut self, selector: &str) -> Result<(), ArchiveError> {
        if self.count(selector)? == 0 {
            return Err(ArchiveError::ElementNotFound(selector.to_string()));
        }
        if let Some(target) = self.submit_target.clone() {
            self.current = Some(target);
        }
        Ok(())
    }

    async fn query_attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, ArchiveError> {
        self.select_attributes(selector, name)
    }

    async fn current_url(&mut self) -> Result<String, ArchiveError> {
        Ok(self.current_page()?.0.to_string())
    }

    async fn document_markup(&mut self) -> Result<String, ArchiveError> {
        Ok(self.current_page()?.1.to_string())
    }

    async fn cookies(&mut self) -> Result<Vec<Cookie>, ArchiveError> {
        Ok(self.cookies.clone())
    }

    async fn capture(&mut self, format: SnapshotFormat) -> Result<Vec<u8>, ArchiveError> {
        let (url, _) = self.current_page()?;
        Ok(format!("{}:{}", format.extension(), url).into_bytes())
    }

    async fn close(&mut self) -> Result<(), ArchiveError> {
        self.closed = true;
        Ok(())
    }
}
