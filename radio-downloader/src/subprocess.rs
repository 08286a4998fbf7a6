//! Invocation de processus externes (`yt-dlp`, `ffmpeg`)
//!
//! stdout/stderr sont drainés sur des tâches dédiées pendant que le
//! processus tourne, pour ne jamais bloquer sur un tube plein ; le code de
//! sortie est vérifié une fois le processus terminé.

use crate::error::{DownloadError, Result};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

pub async fn run(mut cmd: Command, tool: &str) -> Result<()> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        buf
    });

    let status = child.wait().await?;
    let stderr_bytes = stderr_task.await.unwrap_or_default();
    let _ = stdout_task.await;

    if !status.success() {
        return Err(DownloadError::SubprocessFailed {
            tool: tool.to_string(),
            status: status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
        });
    }

    Ok(())
}
