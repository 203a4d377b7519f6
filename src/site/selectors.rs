//! サイトのDOM契約（ページごとのセレクタ）
//!
//! サイト側のマークアップが変わったときに直すのはこのファイルだけ。
//! XPath の `contains(@class, ...)` と同じ部分一致にするため `[class*=...]` を使う。

use super::types::MediaKind;

pub const LOGIN_URL: &str = "https://www.brunobarbieri.blog/login/";
pub const LISTING_URL: &str = "https://www.brunobarbieri.blog/barbieriplus-membri/";

/// ログインページ
#[derive(Debug, Clone)]
pub struct LoginPage {
    pub url: &'static str,
    /// Cookie同意バナーの「拒否」ボタン
    pub cookie_reject: &'static str,
    pub username: &'static str,
    pub password: &'static str,
    /// ログイン成功後にだけ表示されるプロフィール要素
    pub logged_in_marker: &'static str,
}

impl Default for LoginPage {
    fn default() -> Self {
        Self {
            url: LOGIN_URL,
            cookie_reject: "button[class*='iubenda-cs-reject-btn']",
            username: "input[data-key*='username']",
            password: "input[data-key*='user_password']",
            logged_in_marker: "div[class*='um-main-meta']",
        }
    }
}

/// 会員向け一覧ページ
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub url: &'static str,
    pub item_link: &'static str,
    pub item_link_attr: &'static str,
}

impl Default for ListingPage {
    fn default() -> Self {
        Self {
            url: LISTING_URL,
            item_link: "a[class*='elementor-post__thumbnail__link']",
            item_link_attr: "href",
        }
    }
}

/// 個別アイテムページ
#[derive(Debug, Clone)]
pub struct ItemPage {
    pub heading: &'static str,
    /// class 属性にカテゴリトークンを持つコンテナ
    pub container: &'static str,
    pub video_frame: &'static str,
    pub frame_src: &'static str,
    /// src が潰されているときに実URLが入る属性
    pub frame_alternate_src: &'static str,
    pub document_link: &'static str,
    /// (トークン, 種別) の順序付き表。先に一致した行が勝つ
    pub kind_tokens: &'static [(&'static str, MediaKind)],
}

const KIND_TOKENS: &[(&str, MediaKind)] = &[
    ("category-membership-pillola-video", MediaKind::Video),
    ("category-membership-videoricetta", MediaKind::Video),
    ("category-membership-dispensa-testo", MediaKind::Document),
];

impl Default for ItemPage {
    fn default() -> Self {
        Self {
            heading: "[class*='elementor-heading-title']",
            container: "[class*='elementor-location-single']",
            video_frame: "iframe[class*='elementor-video-iframe']",
            frame_src: "src",
            frame_alternate_src: "suppressedsrc",
            document_link: "a[target*='_blank']",
            kind_tokens: KIND_TOKENS,
        }
    }
}

/// 埋め込みプレイヤー（iframe の中身）
#[derive(Debug, Clone)]
pub struct PlayerFrame {
    pub play_button: &'static str,
    /// 直接ダウンロードできる動画ファイルの拡張子
    pub direct_suffix: &'static str,
    /// マルチトラックのマニフェストURLに含まれる部分
    pub manifest_marker: &'static str,
}

impl Default for PlayerFrame {
    fn default() -> Self {
        Self {
            play_button: "button[class*='play']",
            direct_suffix: ".mp4",
            manifest_marker: "/master.json?",
        }
    }
}

/// サイト全体のセレクタ
#[derive(Debug, Clone, Default)]
pub struct Selectors {
    pub login: LoginPage,
    pub listing: ListingPage,
    pub item: ItemPage,
    pub player: PlayerFrame,
}
