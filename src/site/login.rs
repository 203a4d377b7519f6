//! ログイン処理

use std::time::Duration;

use tracing::{debug, info};

use crate::error::ArchiveError;
use crate::traits::BrowserDriver;

use super::selectors::LoginPage;

/// ログインに必要な入力
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub expect_cookie_banner: bool,
}

fn step_failed(step: &'static str) -> impl FnOnce(ArchiveError) -> ArchiveError {
    move |e| match e {
        ArchiveError::DeadlineExceeded(_) => e,
        other => ArchiveError::LoginFailed {
            step,
            message: other.to_string(),
        },
    }
}

/// ログインして認証済みクッキーを持つセッションにする
///
/// 空のユーザー名・パスワードは遷移前に弾く。リトライはしない。
pub async fn login<B: BrowserDriver + ?Sized>(
    browser: &mut B,
    page: &LoginPage,
    credentials: Credentials<'_>,
    wait: Duration,
) -> Result<(), ArchiveError> {
    if credentials.username.is_empty() {
        return Err(ArchiveError::InvalidCredentials("username"));
    }
    if credentials.password.is_empty() {
        return Err(ArchiveError::InvalidCredentials("password"));
    }

    info!("Logging in as {}", credentials.username);
    browser
        .navigate(page.url, None)
        .await
        .map_err(step_failed("open login page"))?;

    if credentials.expect_cookie_banner {
        // フラグ指定時はバナーが必ず出る前提
        browser
            .wait_visible(page.cookie_reject, wait)
            .await
            .map_err(step_failed("cookie banner"))?;
        browser
            .click(page.cookie_reject)
            .await
            .map_err(step_failed("cookie banner"))?;
        debug!("Cookie banner dismissed");
    }

    browser
        .wait_visible(page.username, wait)
        .await
        .map_err(step_failed("username field"))?;
    browser
        .type_text(page.username, credentials.username)
        .await
        .map_err(step_failed("username field"))?;

    browser
        .wait_visible(page.password, wait)
        .await
        .map_err(step_failed("password field"))?;
    browser
        .type_text(page.password, credentials.password)
        .await
        .map_err(step_failed("password field"))?;

    browser
        .submit(page.password)
        .await
        .map_err(step_failed("submit"))?;

    browser
        .wait_visible(page.logged_in_marker, wait)
        .await
        .map_err(step_failed("post-login marker"))?;

    info!("Login completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::selectors::LOGIN_URL;
    use crate::testing::FakeBrowser;

    const LOGIN_HTML: &str = r#"
        <html><body>
          <div id="iubenda-cs-banner"><button class="iubenda-cs-reject-btn iubenda-cs-btn-primary">Rifiuta</button></div>
          <form method="post">
            <input type="text" data-key="username" name="username-123">
            <input type="password" data-key="user_password" name="user_password-123">
          </form>
        </body></html>
    "#;
    const PROFILE_URL: &str = "https://www.brunobarbieri.blog/user/mario/";
    const PROFILE_HTML: &str = r#"<html><body><div class="um-main-meta">Mario</div></body></html>"#;

    fn credentials<'a>(username: &'a str, password: &'a str) -> Credentials<'a> {
        Credentials {
            username,
            password,
            expect_cookie_banner: true,
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut browser = FakeBrowser::new()
            .with_page(LOGIN_URL, LOGIN_HTML)
            .with_page(PROFILE_URL, PROFILE_HTML)
            .with_submit_target(PROFILE_URL);
        let page = LoginPage::default();

        login(&mut browser, &page, credentials("mario", "s3cret"), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(browser.navigations, vec![(LOGIN_URL.to_string(), None)]);
        assert_eq!(browser.clicks, vec![page.cookie_reject.to_string()]);
        assert_eq!(
            browser.typed,
            vec![
                (page.username.to_string(), "mario".to_string()),
                (page.password.to_string(), "s3cret".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_username_does_not_navigate() {
        let mut browser = FakeBrowser::new().with_page(LOGIN_URL, LOGIN_HTML);
        let result = login(
            &mut browser,
            &LoginPage::default(),
            credentials("", "s3cret"),
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(ArchiveError::InvalidCredentials("username"))));
        assert!(browser.navigations.is_empty());
    }

    #[tokio::test]
    async fn test_empty_password_does_not_navigate() {
        let mut browser = FakeBrowser::new().with_page(LOGIN_URL, LOGIN_HTML);
        let result = login(
            &mut browser,
            &LoginPage::default(),
            credentials("mario", ""),
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(ArchiveError::InvalidCredentials("password"))));
        assert!(browser.navigations.is_empty());
    }

    #[tokio::test]
    async fn test_missing_cookie_banner_is_fatal() {
        let html = LOGIN_HTML.replace("iubenda-cs-reject-btn", "something-else");
        let mut browser = FakeBrowser::new().with_page(LOGIN_URL, &html);
        let result = login(
            &mut browser,
            &LoginPage::default(),
            credentials("mario", "s3cret"),
            Duration::from_secs(1),
        )
        .await;

        match result {
            Err(ArchiveError::LoginFailed { step, .. }) => assert_eq!(step, "cookie banner"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cookie_banner_skipped_when_not_expected() {
        let html = LOGIN_HTML.replace("iubenda-cs-reject-btn", "something-else");
        let mut browser = FakeBrowser::new()
            .with_page(LOGIN_URL, &html)
            .with_page(PROFILE_URL, PROFILE_HTML)
            .with_submit_target(PROFILE_URL);
        let credentials = Credentials {
            expect_cookie_banner: false,
            ..credentials("mario", "s3cret")
        };

        login(&mut browser, &LoginPage::default(), credentials, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(browser.clicks.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_password_names_marker_step() {
        // 送信後もログインページのまま
        let mut browser = FakeBrowser::new().with_page(LOGIN_URL, LOGIN_HTML);
        let result = login(
            &mut browser,
            &LoginPage::default(),
            credentials("mario", "wrong"),
            Duration::from_secs(1),
        )
        .await;

        match result {
            Err(ArchiveError::LoginFailed { step, .. }) => assert_eq!(step, "post-login marker"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
