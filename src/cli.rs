use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::browser::SnapshotFormat;
use crate::config::{parse_duration, ArchiverConfig, BrowserOptions, FailurePolicy, FileConfig};

/// コマンドライン引数（設定ファイルより優先）
#[derive(Debug, Parser)]
#[command(name = "bbplus")]
#[command(about = "Fetch your paid Barbieri+ content", long_about = None)]
pub struct Cli {
    /// Enable debug log
    #[arg(short, long)]
    pub debug: bool,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show browser, useful for debugging
    #[arg(short = 'b', long)]
    pub show_browser: bool,

    /// Custom path for chrome browser
    #[arg(short = 'C', long)]
    pub chrome_path: Option<PathBuf>,

    /// Wait for the cookies notice and decline it
    #[arg(short = 'e', long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub expect_cookies_prompt: Option<bool>,

    /// HTTP proxy
    #[arg(short = 'P', long)]
    pub proxy: Option<String>,

    /// Global timeout as a parsable string (e.g. 1h12m)
    #[arg(short, long, default_value = "2h", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Output directory
    #[arg(short = 'O', long)]
    pub outdir: Option<PathBuf>,

    /// Just print URLs without downloading
    #[arg(short = 'J', long)]
    pub just_print_urls: bool,

    /// Save screenshot as PDF instead of PNG
    #[arg(short = 'p', long)]
    pub as_pdf: bool,

    /// Pass --disable-gpu to chrome
    #[arg(short = 'g', long)]
    pub disable_gpu: bool,

    /// Wait after clicking play before reading the player markup
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub settle: Duration,

    /// Keep going when an item fails and report failures at the end
    #[arg(long)]
    pub continue_on_error: bool,

    /// Tool used to combine video and audio streams
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(FileConfig::default_path)
    }

    /// 設定ファイルの値にフラグを重ねる
    pub fn into_config(self, file: FileConfig) -> ArchiverConfig {
        let proxy = self
            .proxy
            .or_else(|| Some(file.proxy).filter(|p| !p.is_empty()));
        let output_dir = self
            .outdir
            .or_else(|| Some(PathBuf::from(file.outdir)).filter(|p| !p.as_os_str().is_empty()))
            .unwrap_or_else(|| PathBuf::from("."));
        let expect_cookie_banner = self
            .expect_cookies_prompt
            .or(file.expect_cookies_prompt)
            .unwrap_or(true);

        let browser = BrowserOptions {
            headless: !self.show_browser,
            executable: self.chrome_path,
            proxy,
            disable_gpu: self.disable_gpu,
            debug: self.debug,
        };
        let format = if self.as_pdf {
            SnapshotFormat::Pdf
        } else {
            SnapshotFormat::Png
        };
        let policy = if self.continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        };

        ArchiverConfig::new(file.username, file.password)
            .with_output_dir(output_dir)
            .with_cookie_banner(expect_cookie_banner)
            .with_browser(browser)
            .with_deadline(self.timeout)
            .with_snapshot_format(format)
            .with_just_print_urls(self.just_print_urls)
            .with_settle(self.settle)
            .with_remux_tool(self.ffmpeg)
            .with_failure_policy(policy)
    }
}
