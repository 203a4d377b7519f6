use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use bbplus::fetch::{fetch_direct, Fetcher};
use bbplus::{ArchiveError, Cookie, MediaReference};

const VIDEO_SIZE: usize = 256 * 1024;

const MASTER_JSON: &str = r#"{
    "clip_id": "c1",
    "base_url": "../",
    "video": [
        {"id": "v-low", "base_url": "video/v-low/", "bitrate": 100, "init_segment": "", "segments": [{"url": "bad.m4s"}]},
        {"id": "v-high", "base_url": "video/v-high/", "bitrate": 900, "init_segment": "AAEC", "segments": [{"url": "s1.m4s"}, {"url": "s2.m4s"}]}
    ],
    "audio": [
        {"id": "a-high", "base_url": "audio/a-high/", "bitrate": 128, "init_segment": "AwQ=", "segments": [{"url": "a1.m4s"}]}
    ]
}"#;

const VIDEO_ONLY_JSON: &str = r#"{
    "base_url": "../",
    "video": [
        {"id": "v-high", "base_url": "video/v-high/", "bitrate": 900, "init_segment": "AAEC", "segments": [{"url": "s1.m4s"}]}
    ]
}"#;

type Seen = Arc<Mutex<Vec<HeaderMap>>>;

fn video_body() -> Vec<u8> {
    (0..VIDEO_SIZE).map(|i| (i % 251) as u8).collect()
}

async fn serve_video(State(seen): State<Seen>, headers: HeaderMap) -> impl IntoResponse {
    seen.lock().unwrap().push(headers);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "video/mp4")],
        video_body(),
    )
}

async fn serve_missing() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "gone")
}

async fn start_server() -> (SocketAddr, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/video/720p.mp4", get(serve_video))
        .route("/missing.pdf", get(serve_missing))
        .route("/exp/1/sep/video/master.json", get(|| async { MASTER_JSON }))
        .route("/exp/2/sep/video/master.json", get(|| async { VIDEO_ONLY_JSON }))
        .route("/exp/1/sep/video/v-high/s1.m4s", get(|| async { "S1" }))
        .route("/exp/1/sep/video/v-high/s2.m4s", get(|| async { "S2" }))
        .route("/exp/1/sep/audio/a-high/a1.m4s", get(|| async { "A1" }))
        .route("/exp/2/sep/video/v-high/s1.m4s", get(|| async { "S1" }))
        .with_state(seen.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, seen)
}

#[tokio::test]
async fn test_direct_fetch_is_byte_exact_and_authorized() {
    let (addr, seen) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("carbonara.mp4");
    let client = reqwest::Client::new();
    let cookies = vec![
        Cookie::new("wordpress_logged_in_x", "mario"),
        Cookie::new("vuid", "42"),
    ];

    let written = fetch_direct(
        &client,
        &format!("http://{}/video/720p.mp4", addr),
        &cookies,
        Some("https://www.brunobarbieri.blog/carbonara/"),
        &dest,
    )
    .await
    .unwrap();

    assert_eq!(written, VIDEO_SIZE as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), video_body());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0][header::COOKIE], "wordpress_logged_in_x=mario; vuid=42");
    assert_eq!(
        seen[0][header::REFERER],
        "https://www.brunobarbieri.blog/carbonara/"
    );
}

#[tokio::test]
async fn test_direct_fetch_saves_error_body() {
    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("ragu.pdf");
    let fetcher = Fetcher::new(None, "ffmpeg").unwrap();

    fetcher
        .fetch(
            &MediaReference::Direct(format!("http://{}/missing.pdf", addr)),
            &[],
            None,
            &dest,
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "gone");
}

#[tokio::test]
async fn test_direct_fetch_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("x.mp4");

    let result = fetch_direct(
        &reqwest::Client::new(),
        &format!("http://{}/x.mp4", addr),
        &[],
        None,
        &dest,
    )
    .await;

    assert!(matches!(result, Err(ArchiveError::Fetch(_))));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_manifest_without_audio_is_saved_directly() {
    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("pillola.mp4");
    // 結合ツールは呼ばれない
    let fetcher = Fetcher::new(None, dir.path().join("no-such-ffmpeg")).unwrap();

    fetcher
        .fetch(
            &MediaReference::Manifest(format!(
                "http://{}/exp/2/sep/video/master.json?base64_init=1",
                addr
            )),
            &[],
            None,
            &dest,
        )
        .await
        .unwrap();

    let mut expected = vec![0u8, 1, 2];
    expected.extend_from_slice(b"S1");
    assert_eq!(std::fs::read(&dest).unwrap(), expected);
}

#[cfg(unix)]
#[tokio::test]
async fn test_manifest_tracks_are_remuxed() {
    use std::os::unix::fs::PermissionsExt;

    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    // -y -i VIDEO -i AUDIO -c copy DEST
    let tool = dir.path().join("fake-ffmpeg");
    std::fs::write(&tool, "#!/bin/sh\ncat \"$3\" \"$5\" > \"$8\"\n").unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    let dest = dir.path().join("videoricetta.mp4");
    let scratch = tempfile::tempdir().unwrap();
    let fetcher = Fetcher::new(None, &tool)
        .unwrap()
        .with_temp_dir(scratch.path());

    fetcher
        .fetch(
            &MediaReference::Manifest(format!(
                "http://{}/exp/1/sep/video/master.json?base64_init=1",
                addr
            )),
            &[Cookie::new("vuid", "42")],
            Some("https://www.brunobarbieri.blog/videoricetta/"),
            &dest,
        )
        .await
        .unwrap();

    let mut expected = vec![0u8, 1, 2];
    expected.extend_from_slice(b"S1S2");
    expected.extend_from_slice(&[3, 4]);
    expected.extend_from_slice(b"A1");
    assert_eq!(std::fs::read(&dest).unwrap(), expected);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_remux_failure_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let (addr, _) = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("broken-ffmpeg");
    std::fs::write(&tool, "#!/bin/sh\necho 'Conversion failed!' >&2\nexit 3\n").unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let fetcher = Fetcher::new(None, &tool)
        .unwrap()
        .with_temp_dir(scratch.path());

    let result = fetcher
        .fetch(
            &MediaReference::Manifest(format!("http://{}/exp/1/sep/video/master.json", addr)),
            &[],
            None,
            &dir.path().join("out.mp4"),
        )
        .await;

    match result {
        Err(ArchiveError::Remux { stderr, .. }) => assert!(stderr.contains("Conversion failed!")),
        other => panic!("unexpected: {other:?}"),
    }
    // トラックの一時ファイルは失敗時も残らない
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}
