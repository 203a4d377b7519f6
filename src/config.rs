use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::browser::SnapshotFormat;
use crate::error::ArchiveError;

pub const PROGNAME: &str = "bbplus";

/// ブラウザ起動オプション
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub proxy: Option<String>,
    pub disable_gpu: bool,
    pub debug: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            proxy: None,
            disable_gpu: false,
            debug: false,
        }
    }
}

/// 1アイテムの失敗時の振る舞い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 最初の失敗で全体を中断
    #[default]
    Abort,
    /// 失敗を記録して次のアイテムへ
    Continue,
}

#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub username: String,
    pub password: String,
    pub expect_cookie_banner: bool,
    pub output_dir: PathBuf,
    pub browser: BrowserOptions,
    pub deadline: Duration,
    pub snapshot_format: SnapshotFormat,
    pub just_print_urls: bool,
    /// 再生ボタンクリック後の待機時間
    pub settle: Duration,
    /// 要素待機の上限
    pub element_wait: Duration,
    pub remux_tool: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            expect_cookie_banner: true,
            output_dir: PathBuf::from("."),
            browser: BrowserOptions::default(),
            deadline: Duration::from_secs(2 * 60 * 60),
            snapshot_format: SnapshotFormat::Png,
            just_print_urls: false,
            settle: Duration::from_secs(1),
            element_wait: Duration::from_secs(30),
            remux_tool: PathBuf::from("ffmpeg"),
            failure_policy: FailurePolicy::Abort,
        }
    }
}

impl ArchiverConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_cookie_banner(mut self, expect: bool) -> Self {
        self.expect_cookie_banner = expect;
        self
    }

    pub fn with_browser(mut self, browser: BrowserOptions) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_snapshot_format(mut self, format: SnapshotFormat) -> Self {
        self.snapshot_format = format;
        self
    }

    pub fn with_just_print_urls(mut self, enabled: bool) -> Self {
        self.just_print_urls = enabled;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_element_wait(mut self, wait: Duration) -> Self {
        self.element_wait = wait;
        self
    }

    pub fn with_remux_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.remux_tool = tool.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// 有効な設定をログ出力（パスワードは伏せる）
    pub fn log_summary(&self) {
        let masked = if self.password.is_empty() {
            "<not set>"
        } else {
            "***"
        };
        info!("Timeout                 : {:?}", self.deadline);
        info!("Proxy                   : {}", self.browser.proxy.as_deref().unwrap_or(""));
        info!("Show browser            : {}", !self.browser.headless);
        info!("Debug                   : {}", self.browser.debug);
        info!(
            "Custom Chrome path      : {}",
            self.browser
                .executable
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        info!("Username                : {}", self.username);
        info!("Password                : {}", masked);
        info!("Expect cookies prompt   : {}", self.expect_cookie_banner);
        info!("Output directory        : {}", self.output_dir.display());
        info!("Just print URLs         : {}", self.just_print_urls);
        info!("Disable GPU             : {}", self.browser.disable_gpu);
        info!("Screenshot file format  : {:?}", self.snapshot_format);
        info!("Settle interval         : {:?}", self.settle);
        info!("Failure policy          : {:?}", self.failure_policy);
    }
}

/// 設定ファイル (JSON)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub proxy: String,
    pub username: String,
    pub password: String,
    pub expect_cookies_prompt: Option<bool>,
    pub outdir: String,
}

impl FileConfig {
    /// ファイルが無ければデフォルト値
    pub fn load(path: &Path) -> Result<Self, ArchiveError> {
        info!("Trying to load config file {}", path.display());
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Configuration file does not exist, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ArchiveError::Config(format!(
                    "failed to open '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        let config: FileConfig = serde_json::from_str(&data).map_err(|e| {
            ArchiveError::Config(format!("failed to parse '{}': {}", path.display(), e))
        })?;
        debug!("Config file loaded");
        Ok(config)
    }

    /// デフォルトの設定ファイルパス（<config dir>/bbplus/config.json）
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", PROGNAME)
            .map(|dirs| dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }
}

/// 人間向けの期間表記をパース（例: "2h", "1h12m", "90s", "500ms"）
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", input))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let secs = match unit {
            "h" => value * 3600.0,
            "m" => value * 60.0,
            "s" => value,
            "ms" => value / 1000.0,
            "" => return Err(format!("missing unit in duration '{}'", input)),
            other => return Err(format!("unknown unit '{}' in duration '{}'", other, input)),
        };
        total = Duration::try_from_secs_f64(secs)
            .ok()
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| format!("duration '{}' is out of range", input))?;
    }
    Ok(total)
}
