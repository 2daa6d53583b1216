// Real transfer through the yt-dlp binary
//
// Progress comes from yt-dlp's `--newline` output; a non-zero exit fails the
// task. The child is killed when the worker is aborted (kill_on_drop).

use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use crate::media::errors::DownloadError;
use crate::media::format_selector::FormatSelector;
use crate::media::models::{FormatKind, TransferRequest};
use crate::media::orchestrator::ProgressReporter;
use crate::media::traits::TransferBackend;

pub struct YtDlpTransfer {
    ytdlp_path: String,
    proxy: Option<String>,
}

impl YtDlpTransfer {
    pub fn new(ytdlp_path: String, proxy: Option<String>) -> Self {
        Self { ytdlp_path, proxy }
    }

    fn build_args(&self, request: &TransferRequest) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();

        match request.kind {
            FormatKind::Video => {
                args.push("-f".to_string());
                args.push(FormatSelector::format_spec(&request.format));
            }
            FormatKind::Audio => {
                let (codec, bitrate) = FormatSelector::audio_target(&request.format);
                args.push("-f".to_string());
                args.push("ba/b".to_string());
                args.push("-x".to_string());
                args.push("--audio-format".to_string());
                args.push(codec);
                if let Some(kbps) = bitrate {
                    args.push("--audio-quality".to_string());
                    args.push(format!("{}K", kbps));
                }
            }
        }

        args.extend(
            ["--newline", "--no-playlist", "--no-warnings", "-P"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(request.output_dir.to_string_lossy().to_string());

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl TransferBackend for YtDlpTransfer {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<(), DownloadError> {
        let args = self.build_args(&request);
        log::debug!("[YtDlpTransfer] {} {}", self.ytdlp_path, args.join(" "));

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::ToolNotFound(format!("{}: {}", self.ytdlp_path, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Execution("Failed to capture stdout".to_string()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Execution("Failed to capture stderr".to_string()))?;

        // Drained concurrently so a chatty stderr cannot block the child
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf).await;
            buf
        });

        // Lines are read as bytes: file names need not be valid UTF-8
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            if let Some((percent, status)) = parse_progress_line(line.trim_end()) {
                if !progress.report(percent, status) {
                    // Task is gone; the child is killed on drop
                    return Ok(());
                }
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            let detail = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("yt-dlp exited with an error")
                .trim()
                .to_string();
            Err(DownloadError::Execution(detail))
        }
    }
}

/// Parse a yt-dlp output line like
/// `[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)`
/// into (percent, status).
pub fn parse_progress_line(line: &str) -> Option<(f32, String)> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+/s))?(?:\s+ETA\s+(\S+))?"
        ).unwrap();
        static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").unwrap();
        static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").unwrap();
        static ref EXTRACT_RE: Regex = Regex::new(r"\[ExtractAudio\]\s+Destination").unwrap();
        static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").unwrap();
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
        let status = match (caps.get(3), caps.get(4)) {
            (Some(speed), Some(eta)) => format!(
                "{:.1}% of {} @ {} ETA {}",
                percent,
                size,
                speed.as_str(),
                eta.as_str()
            ),
            (Some(speed), None) => format!("{:.1}% of {} @ {}", percent, size, speed.as_str()),
            _ => format!("{:.1}% of {}", percent, size),
        };
        return Some((percent, status));
    }

    if let Some(caps) = DEST_RE.captures(line) {
        let filename = caps.get(1).map(|m| m.as_str()).unwrap_or("file");
        let short_name: String = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(filename)
            .chars()
            .take(50)
            .collect();
        return Some((0.0, format!("Starting: {}", short_name)));
    }

    if MERGE_RE.is_match(line) {
        return Some((99.0, "Merging video and audio...".to_string()));
    }

    if EXTRACT_RE.is_match(line) {
        return Some((99.0, "Converting audio...".to_string()));
    }

    if ALREADY_RE.is_match(line) {
        return Some((100.0, "File already downloaded".to_string()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_fragmented_progress() {
        let (percent, status) = parse_progress_line(
            "[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)",
        )
        .unwrap();
        assert_eq!(percent, 6.2);
        assert!(status.contains("343.72MiB"));
        assert!(status.contains("ETA 12:32"));
    }

    #[test]
    fn parses_finished_line() {
        let (percent, _) = parse_progress_line("[download] 100% of   12.01MiB in 00:00:03 at 3.9MiB/s").unwrap();
        assert_eq!(percent, 100.0);
    }

    #[test]
    fn parses_phase_lines() {
        assert_eq!(
            parse_progress_line("[download] Destination: /tmp/out/My Video.f137.mp4").unwrap(),
            (0.0, "Starting: My Video.f137.mp4".to_string())
        );
        assert_eq!(parse_progress_line("[Merger] Merging formats into \"a.mp4\"").unwrap().0, 99.0);
        assert_eq!(
            parse_progress_line("[download] a.mp4 has already been downloaded").unwrap().0,
            100.0
        );
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
    }

    /// Shell script standing in for yt-dlp
    #[cfg(unix)]
    fn fake_ytdlp(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    #[cfg(unix)]
    async fn run_to_terminal(ytdlp_path: String) -> crate::media::models::DownloadTask {
        use crate::media::orchestrator::DownloadOrchestrator;
        use std::sync::Arc;

        let out = tempfile::tempdir().unwrap();
        let mut orchestrator = DownloadOrchestrator::new(Arc::new(YtDlpTransfer::new(ytdlp_path, None)));
        let mut rx = orchestrator.subscribe();
        orchestrator
            .start(TransferRequest {
                url: "https://example.com/v".to_string(),
                format: "720p".to_string(),
                kind: FormatKind::Video,
                output_dir: out.path().to_path_buf(),
            })
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(20), async {
            loop {
                let task = rx.borrow_and_update().clone();
                if task.status.is_terminal() {
                    return task;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("transfer did not finish")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_does_not_fail_the_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ytdlp(
            dir.path(),
            "printf '[download]  50.0%% of 10.00MiB at 1.00MiB/s ETA 00:05\\n'\n\
             printf '[download] Destination: /tmp/Caf\\351.mp4\\n'\n\
             printf '[download] 100%% of 10.00MiB in 00:00:10\\n'\n\
             exit 0",
        );

        let task = run_to_terminal(script).await;
        assert_eq!(task.status, crate::media::models::DownloadStatus::Completed, "{:?}", task.error);
        assert_eq!(task.progress, 100.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_fails_with_last_stderr_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_ytdlp(
            dir.path(),
            "printf '[download]  10.0%% of 10.00MiB\\n'\n\
             echo 'ERROR: Video unavailable' >&2\n\
             exit 1",
        );

        let task = run_to_terminal(script).await;
        assert_eq!(task.status, crate::media::models::DownloadStatus::Failed);
        assert!(task.error.unwrap().contains("Video unavailable"));
    }

    #[test]
    fn builds_audio_args() {
        let transfer = YtDlpTransfer::new("yt-dlp".to_string(), Some("socks5://127.0.0.1:1080".to_string()));
        let args = transfer.build_args(&TransferRequest {
            url: "https://example.com/v".to_string(),
            format: "MP3 320kbps".to_string(),
            kind: FormatKind::Audio,
            output_dir: PathBuf::from("/tmp/out"),
        });

        let joined = args.join(" ");
        assert!(joined.contains("-x --audio-format mp3 --audio-quality 320K"));
        assert!(joined.contains("--proxy socks5://127.0.0.1:1080"));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn builds_video_args() {
        let transfer = YtDlpTransfer::new("yt-dlp".to_string(), None);
        let args = transfer.build_args(&TransferRequest {
            url: "https://example.com/v".to_string(),
            format: "720p".to_string(),
            kind: FormatKind::Video,
            output_dir: PathBuf::from("/tmp/out"),
        });
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "bv*[height<=720]+ba/b[height<=720]/bv*+ba/best");
        assert!(!args.iter().any(|a| a == "--proxy"));
    }
}
