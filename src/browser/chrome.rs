//! chromiumoxide によるブラウザセッション

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{Cookie as CdpCookie, CookieSameSite};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, NavigateParams, PrintToPdfParams,
};
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::DateTime;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserOptions;
use crate::error::ArchiveError;
use crate::traits::BrowserDriver;

use super::types::{Cookie, SameSite, SnapshotFormat};

/// 要素待機のポーリング間隔（ミリ秒）
const VISIBLE_CHECK_INTERVAL_MS: u64 = 250;

/// 1つのブラウザコンテキストを所有するセッション
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    /// ブラウザを起動して空ページを開く
    pub async fn open(options: &BrowserOptions) -> Result<Self, ArchiveError> {
        info!("Launching browser...");

        let mut builder = BrowserConfig::builder();

        if let Some(ref path) = options.executable {
            if !path.exists() {
                return Err(ArchiveError::Launch(format!(
                    "browser executable not found: {}",
                    path.display()
                )));
            }
            builder = builder.chrome_executable(path);
        }

        if options.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder
                .with_head()
                .arg("--no-first-run")
                .arg("--no-default-browser-check");
        }

        if let Some(ref proxy) = options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        if options.disable_gpu {
            builder = builder.arg("--disable-gpu");
        }

        if options.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let config = builder.build().map_err(ArchiveError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ArchiveError::Launch(e.to_string()))?;

        let trace = options.debug;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if trace {
                    debug!("Browser event: {:?}", event);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ArchiveError::Launch(e.to_string()))?;

        info!("Browser launched");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, ArchiveError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| ArchiveError::Navigation(format!("script evaluation failed: {}", e)))?
            .into_value::<T>()
            .map_err(|e| ArchiveError::Navigation(format!("unexpected script result: {}", e)))
    }
}

/// セレクタをJS文字列リテラルへ
fn js_literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn visibility_script(selector: &str) -> String {
    format!(
        r#"
        (() => {{
            const el = document.querySelector({});
            if (!el) return false;
            const style = window.getComputedStyle(el);
            if (style.display === 'none' || style.visibility === 'hidden') return false;
            return el.getClientRects().length > 0;
        }})()
        "#,
        js_literal(selector)
    )
}

fn cookie_from_cdp(c: &CdpCookie) -> Cookie {
    let expires = if c.session || c.expires <= 0.0 {
        None
    } else {
        DateTime::from_timestamp(c.expires as i64, 0)
    };
    let same_site = match c.same_site {
        Some(CookieSameSite::Strict) => SameSite::Strict,
        Some(CookieSameSite::Lax) => SameSite::Lax,
        Some(CookieSameSite::None) => SameSite::None,
        _ => SameSite::Default,
    };
    Cookie {
        name: c.name.clone(),
        value: c.value.clone(),
        path: c.path.clone(),
        domain: c.domain.clone(),
        expires,
        secure: c.secure,
        http_only: c.http_only,
        same_site,
    }
}

#[async_trait]
impl BrowserDriver for ChromeSession {
    async fn navigate(&mut self, url: &str, referrer: Option<&str>) -> Result<(), ArchiveError> {
        debug!("Navigating to {} (referrer: {:?})", url, referrer);

        let mut params = NavigateParams::builder().url(url);
        if let Some(referrer) = referrer {
            params = params.referrer(referrer);
        }
        let params = params.build().map_err(ArchiveError::Navigation)?;

        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| ArchiveError::Navigation(format!("{}: {}", url, e)))?;
        if let Some(ref error_text) = response.result.error_text {
            return Err(ArchiveError::Navigation(format!("{}: {}", url, error_text)));
        }

        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ArchiveError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn wait_visible(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ArchiveError> {
        debug!("Waiting for '{}' (up to {:?})", selector, timeout);
        let script = visibility_script(selector);
        let start = Instant::now();

        loop {
            match self.eval::<bool>(script.clone()).await {
                Ok(true) => {
                    debug!("'{}' visible after {:?}", selector, start.elapsed());
                    return Ok(());
                }
                Ok(false) => {}
                // 遷移中は評価が失敗することがある
                Err(e) => debug!("Visibility check error: {}", e),
            }

            if start.elapsed() >= timeout {
                return Err(ArchiveError::ElementNotFound(format!(
                    "'{}' not visible within {:?}",
                    selector, timeout
                )));
            }
            sleep(Duration::from_millis(VISIBLE_CHECK_INTERVAL_MS)).await;
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), ArchiveError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ArchiveError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| ArchiveError::Navigation(format!("click {}: {}", selector, e)))?;
        Ok(())
    }

    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), ArchiveError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| ArchiveError::ElementNotFound(format!("{}: {}", selector, e)))?
            .click()
            .await
            .map_err(|e| ArchiveError::Navigation(format!("focus {}: {}", selector, e)))?
            .type_str(text)
            .await
            .map_err(|e| ArchiveError::Navigation(format!("type into {}: {}", selector, e)))?;
        Ok(())
    }

    async fn submit(&mut self, selector: &str) -> Result<(), ArchiveError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({});
                if (!el) return false;
                const form = el.form || el.closest('form');
                if (!form) return false;
                if (typeof form.requestSubmit === 'function') {{
                    form.requestSubmit();
                }} else {{
                    form.submit();
                }}
                return true;
            }})()
            "#,
            js_literal(selector)
        );
        if !self.eval::<bool>(script).await? {
            return Err(ArchiveError::ElementNotFound(format!(
                "no form for '{}'",
                selector
            )));
        }
        Ok(())
    }

    async fn query_attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, ArchiveError> {
        let script = format!(
            "Array.from(document.querySelectorAll({})).map(el => el.getAttribute({}))",
            js_literal(selector),
            js_literal(name)
        );
        self.eval(script).await
    }

    async fn current_url(&mut self) -> Result<String, ArchiveError> {
        self.page
            .url()
            .await
            .map_err(|e| ArchiveError::Navigation(e.to_string()))?
            .ok_or_else(|| ArchiveError::Navigation("page has no URL".into()))
    }

    async fn document_markup(&mut self) -> Result<String, ArchiveError> {
        self.page
            .content()
            .await
            .map_err(|e| ArchiveError::Navigation(format!("failed to read document: {}", e)))
    }

    async fn cookies(&mut self) -> Result<Vec<Cookie>, ArchiveError> {
        let response = self
            .page
            .execute(GetCookiesParams::default())
            .await
            .map_err(|e| ArchiveError::Navigation(format!("failed to read cookies: {}", e)))?;
        let cookies: Vec<Cookie> = response.result.cookies.iter().map(cookie_from_cdp).collect();
        debug!("Got {} cookies from browser", cookies.len());
        Ok(cookies)
    }

    async fn capture(&mut self, format: SnapshotFormat) -> Result<Vec<u8>, ArchiveError> {
        match format {
            SnapshotFormat::Png => {
                let params = ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build();
                self.page
                    .screenshot(params)
                    .await
                    .map_err(|e| ArchiveError::Navigation(format!("screenshot failed: {}", e)))
            }
            SnapshotFormat::Pdf => {
                let params = PrintToPdfParams::builder().print_background(false).build();
                self.page
                    .pdf(params)
                    .await
                    .map_err(|e| ArchiveError::Navigation(format!("print to PDF failed: {}", e)))
            }
        }
    }

    async fn close(&mut self) -> Result<(), ArchiveError> {
        info!("Closing browser...");
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Failed to wait for browser process: {}", e);
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}
