//! 外部ツール (ffmpeg) による映像/音声の無劣化結合

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ArchiveError;

/// `tool -y -i <video> -i <audio> -c copy <dest>` を実行
///
/// 終了コードが0以外なら標準エラー出力ごと `Remux` で返す。
pub async fn remux(
    tool: &Path,
    video: &Path,
    audio: &Path,
    dest: &Path,
) -> Result<(), ArchiveError> {
    info!("Combining video and audio streams into {}", dest.display());
    let output = Command::new(tool)
        .arg("-y")
        .arg("-i")
        .arg(video)
        .arg("-i")
        .arg(audio)
        .arg("-c")
        .arg("copy")
        .arg(dest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ArchiveError::Remux {
            status: format!("failed to start {}", tool.display()),
            stderr: e.to_string(),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(ArchiveError::Remux {
            status: output.status.to_string(),
            stderr,
        });
    }
    debug!("{} finished: {}", tool.display(), stderr.trim_end());
    Ok(())
}
