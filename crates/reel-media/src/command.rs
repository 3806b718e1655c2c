//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use reel_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::filters::{FilterChain, FilterGraph};
use crate::progress::FfmpegProgress;

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One `-i` input with its input options.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    /// Options placed before `-i`
    pub args: Vec<String>,
    /// File path or lavfi source graph
    pub source: String,
}

impl FfmpegInput {
    /// A file input.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            source: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// A generated input from the lavfi virtual device.
    pub fn lavfi(source: impl Into<String>) -> Self {
        Self {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: source.into(),
        }
    }

    /// Add an input option.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Seek the input before decoding.
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", seconds))
    }

    pub fn is_lavfi(&self) -> bool {
        self.args.windows(2).any(|w| w[0] == "-f" && w[1] == "lavfi")
    }
}

/// Filter attached to a command, kept typed until `build_args`.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandFilter {
    /// `-vf`
    Simple(FilterChain),
    /// `-filter_complex`
    Complex(FilterGraph),
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Typed filter, serialized on build
    filter: Option<CommandFilter>,
    /// Output arguments (after the inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            filter: None,
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input.
    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add output arguments (after the inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Limit the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set a single-input video filter chain.
    pub fn video_filter(mut self, chain: FilterChain) -> Self {
        self.filter = Some(CommandFilter::Simple(chain));
        self
    }

    /// Set a filter graph.
    pub fn filter_complex(mut self, graph: FilterGraph) -> Self {
        self.filter = Some(CommandFilter::Complex(graph));
        self
    }

    /// Map a stream or filter output label into the output.
    pub fn map(self, label: impl AsRef<str>) -> Self {
        let label = label.as_ref();
        let spec = if label.contains(':') {
            label.to_string()
        } else {
            format!("[{}]", label)
        };
        self.output_arg("-map").output_arg(spec)
    }

    /// Set the output frame rate.
    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Apply encoder settings.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.to_ffmpeg_args())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// The filter graph, if this command uses `-filter_complex`.
    pub fn filter_graph(&self) -> Option<&FilterGraph> {
        match &self.filter {
            Some(CommandFilter::Complex(graph)) => Some(graph),
            _ => None,
        }
    }

    /// The video filter chain, if this command uses `-vf`.
    pub fn filter_chain(&self) -> Option<&FilterChain> {
        match &self.filter {
            Some(CommandFilter::Simple(chain)) => Some(chain),
            _ => None,
        }
    }

    /// Value following an output flag, e.g. `-t`.
    pub fn output_value(&self, flag: &str) -> Option<&str> {
        self.output_args
            .windows(2)
            .find(|w| w[0] == flag)
            .map(|w| w[1].as_str())
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.push("-nostats".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        match &self.filter {
            Some(CommandFilter::Simple(chain)) if !chain.is_empty() => {
                args.push("-vf".to_string());
                args.push(chain.to_string());
            }
            Some(CommandFilter::Complex(graph)) => {
                args.push("-filter_complex".to_string());
                args.push(graph.to_string());
            }
            _ => {}
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Something that can execute an FFmpeg command.
///
/// Render stages only talk to this trait so they can be exercised without
/// spawning FFmpeg.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Executable to spawn; looked up on `PATH` when `None`
    program: Option<PathBuf>,
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific FFmpeg executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Run an FFmpeg command, logging progress snapshots at debug level.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let output = cmd.output().display().to_string();
        let total_ms = cmd
            .output_value("-t")
            .and_then(|t| t.parse::<f64>().ok())
            .map(|secs| (secs * 1000.0) as i64)
            .unwrap_or_default();
        self.run_with_progress(cmd, move |progress| {
            debug!(
                output = %output,
                percent = progress.percentage(total_ms),
                frame = progress.frame,
                out_time_ms = progress.out_time_ms,
                speed = progress.speed,
                complete = progress.is_complete,
                "FFmpeg progress"
            );
        })
        .await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => check_ffmpeg()?,
        };

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));
        metrics::counter!("reel_encoder_invocations_total").increment(1);

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress keys drive the callback; everything else is diagnostics
        let stderr_handle = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                match current.apply_line(&line) {
                    Some(Some(snapshot)) => progress_callback(snapshot),
                    Some(None) => {}
                    None => {
                        debug!(target: "ffmpeg", "{}", line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        let status = result.inspect_err(|_| {
            metrics::counter!("reel_encoder_failures_total").increment(1);
        })?;

        if status.success() {
            Ok(())
        } else {
            metrics::counter!("reel_encoder_failures_total").increment(1);
            warn!(exit_code = ?status.code(), "FFmpeg failed: {}", stderr_tail);
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<ExitStatus> {
        let mut cancel_rx = self.cancel_rx.clone();
        let cancelled = async move {
            match cancel_rx.as_mut() {
                Some(rx) => loop {
                    if *rx.borrow_and_update() {
                        break;
                    }
                    if rx.changed().await.is_err() {
                        // Sender gone: cancellation can no longer happen
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };

        let timeout_secs = self.timeout_secs;
        let timed_out = async move {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = timed_out => {
                let secs = timeout_secs.unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        }
    }
}

#[async_trait]
impl Encoder for FfmpegRunner {
    async fn encode(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run(cmd).await
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Filter;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("output.mp4")
            .input(FfmpegInput::file("input.mp4").seek(10.0))
            .duration(30.0)
            .encoding(&EncodingConfig::default().with_crf(18));

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i, "seek must be an input option");
        assert_eq!(args[ss + 1], "10.000");
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(cmd.output_value("-t"), Some("30.000"));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_multiple_inputs_in_order() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(FfmpegInput::file("a.mp4"))
            .input(FfmpegInput::file("b.mp4"))
            .input(FfmpegInput::lavfi("color=c=red"));

        let args = cmd.build_args();
        let sources: Vec<_> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| w[1].clone())
            .collect();
        assert_eq!(sources, vec!["a.mp4", "b.mp4", "color=c=red"]);
        assert!(cmd.inputs()[2].is_lavfi());
        assert!(!cmd.inputs()[0].is_lavfi());
    }

    #[test]
    fn test_filter_serialized_on_build() {
        let graph = FilterGraph::new().chain(
            FilterChain::new()
                .input("0:v")
                .input("1:v")
                .filter(Filter::new("concat").arg("n", 2).arg("v", 1).arg("a", 0))
                .output("vout"),
        );
        let cmd = FfmpegCommand::new("out.mp4").filter_complex(graph).map("vout");

        let args = cmd.build_args();
        let pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[pos + 1], "[0:v][1:v]concat=n=2:v=1:a=0[vout]");
        assert_eq!(cmd.output_value("-map"), Some("[vout]"));
        assert!(cmd.filter_graph().is_some());
        assert!(cmd.filter_chain().is_none());
    }

    #[test]
    fn test_empty_video_filter_is_omitted() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input(FfmpegInput::file("a.mp4"))
            .video_filter(FilterChain::new());
        assert!(!cmd.build_args().contains(&"-vf".to_string()));
    }

    #[test]
    fn test_map_stream_specifier() {
        let cmd = FfmpegCommand::new("out.mp4").map("0:v");
        assert_eq!(cmd.output_value("-map"), Some("0:v"));
    }
}

#[cfg(all(test, unix))]
mod runner_tests {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::{Arc, Mutex};

    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    /// Write an executable shell script standing in for FFmpeg.
    fn stub(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn command(dir: &TempDir) -> FfmpegCommand {
        FfmpegCommand::new(dir.path().join("out.mp4")).input(FfmpegInput::file("in.mp4"))
    }

    #[tokio::test]
    #[serial]
    async fn test_nonzero_exit_keeps_stderr_tail() {
        let dir = TempDir::new().unwrap();
        let program = stub(
            &dir,
            r#"i=1
while [ $i -le 30 ]; do echo "line $i" >&2; i=$((i+1)); done
exit 3"#,
        );

        let err = FfmpegRunner::new()
            .with_program(program)
            .run(&command(&dir))
            .await
            .unwrap_err();

        match err {
            MediaError::FfmpegFailed { stderr, exit_code, .. } => {
                assert_eq!(exit_code, Some(3));
                let stderr = stderr.unwrap();
                assert_eq!(stderr.lines().count(), STDERR_TAIL_LINES);
                assert_eq!(stderr.lines().next(), Some("line 11"));
                assert_eq!(stderr.lines().last(), Some("line 30"));
            }
            other => panic!("expected FfmpegFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_progress_blocks_reach_callback() {
        let dir = TempDir::new().unwrap();
        let program = stub(
            &dir,
            r"printf 'frame=10\nout_time_us=2000000\nprogress=continue\nframe=20\nout_time_us=4000000\nprogress=end\n' >&2",
        );

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        FfmpegRunner::new()
            .with_program(program)
            .run_with_progress(&command(&dir), move |p| sink.lock().unwrap().push(p))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].frame, 10);
        assert_eq!(seen[0].out_time_ms, 2000);
        assert!(!seen[0].is_complete);
        assert_eq!(seen[1].out_time_ms, 4000);
        assert!(seen[1].is_complete);
    }

    #[tokio::test]
    #[serial]
    async fn test_cancel_kills_encoder() {
        let dir = TempDir::new().unwrap();
        let program = stub(&dir, "exec sleep 30");
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let runner = FfmpegRunner::new().with_program(program).with_cancel(cancel_rx);
        let cmd = command(&dir);

        let handle = tokio::spawn(async move { runner.run(&cmd).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("cancelled encoder should exit promptly")
            .unwrap();
        assert!(matches!(result, Err(MediaError::Cancelled)));
    }

    #[tokio::test]
    #[serial]
    async fn test_timeout_kills_encoder() {
        let dir = TempDir::new().unwrap();
        let program = stub(&dir, "exec sleep 30");
        let runner = FfmpegRunner::new().with_program(program).with_timeout(Some(1));

        let result = tokio::time::timeout(Duration::from_secs(10), runner.run(&command(&dir)))
            .await
            .expect("timed out encoder should exit promptly");
        assert!(matches!(result, Err(MediaError::Timeout(1))));
    }

    #[tokio::test]
    #[serial]
    async fn test_program_resolved_from_path() {
        let dir = TempDir::new().unwrap();
        stub(&dir, "exit 0");
        let empty = TempDir::new().unwrap();
        let saved = std::env::var_os("PATH");

        std::env::set_var("PATH", empty.path());
        let missing = FfmpegRunner::new().run(&command(&dir)).await;

        std::env::set_var("PATH", dir.path());
        let found = FfmpegRunner::new().run(&command(&dir)).await;

        match saved {
            Some(path) => std::env::set_var("PATH", path),
            None => std::env::remove_var("PATH"),
        }
        assert!(matches!(missing, Err(MediaError::FfmpegNotFound)));
        assert!(found.is_ok());
    }
}
