//! ブラウザセッション制御モジュール
//!
//! Chrome を1つ起動し、遷移・要素待機・属性取得・クッキー取得・
//! スナップショット撮影を `BrowserDriver` として提供する

mod chrome;
mod types;

pub use chrome::ChromeSession;
pub use types::{Cookie, SameSite, SnapshotFormat};
