//! Manim CLI renderer

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::classify::timeout_diagnostic;
use crate::config::RenderConfig;
use crate::generator::CandidateArtifact;
use crate::render::{OutputTarget, QualityPreset, RenderError, RenderOutcome, Renderer, SCENE_CLASS};
use crate::session::naming::claim_versioned_file;

/// Grace period for draining pipes once the engine's group is gone
const DRAIN_AFTER_KILL: Duration = Duration::from_secs(2);

/// Distinguishes media dirs of renders running in this process
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Renders through the `manim` command-line tool.
///
/// Scripts are written to the cache directory, named after a hash of their
/// contents. Each render gets a private media dir under the cache, so runs
/// never see each other's output. The finished video is copied into a newly
/// created versioned file in the target directory.
#[derive(Debug, Clone)]
pub struct ManimRenderer {
    engine: String,
    cache_dir: PathBuf,
    timeout: Duration,
}

/// Exit status and combined output of one engine run
struct EngineRun {
    exit_code: Option<i32>,
    output: String,
    timed_out: bool,
}

/// The engine child and its process group.
///
/// Dropping it kills the whole group, so ffmpeg or LaTeX children die with
/// the engine even when the render future is abandoned mid-run.
struct EngineProcess {
    child: Child,
    group: Option<u32>,
}

impl EngineProcess {
    fn spawn(cmd: &mut Command) -> std::io::Result<Self> {
        let child = cmd.spawn()?;
        let group = child.id();
        Ok(Self { child, group })
    }

    /// SIGKILL everything left in the group; only the first call signals
    fn kill_group(&mut self) {
        if let Some(pid) = self.group.take() {
            kill_process_group(pid);
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.kill_group();
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let group = format!("-{}", pid);
    let result = std::process::Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = result {
        log::warn!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

impl ManimRenderer {
    pub fn new(engine: impl Into<String>, cache_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            engine: engine.into(),
            cache_dir: cache_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            config.engine.clone(),
            config.cache_dir.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// `<cache_dir>/scene_<first 12 hex of sha256>.py`
    fn script_path(&self, code: &str) -> PathBuf {
        let digest = Sha256::digest(code.as_bytes());
        let short = &hex::encode(digest)[..12];
        self.cache_dir.join(format!("scene_{}.py", short))
    }

    async fn write_script(&self, code: &str) -> Result<PathBuf, RenderError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.script_path(code);
        tokio::fs::write(&path, code).await?;
        Ok(path)
    }

    /// Fresh `<cache_dir>/media/<script>-<pid>-<seq>` for one render
    async fn create_media_dir(&self, script: &Path) -> Result<PathBuf, RenderError> {
        let stem = script.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let run = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
        let dir = self
            .cache_dir
            .join("media")
            .join(format!("{}-{}-{}", stem, std::process::id(), run));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    fn command(&self, script: &Path, quality: QualityPreset, media_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.engine);
        cmd.arg(quality.profile().flag)
            .arg("--output_file")
            .arg(SCENE_CLASS)
            .arg("--media_dir")
            .arg(media_dir)
            .arg(script)
            .arg(SCENE_CLASS)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // own process group, so ffmpeg/latex children can be killed with the engine
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    /// Run the engine under one wall-clock deadline that covers both the
    /// wait and the collection of its output.
    async fn run(&self, mut cmd: Command) -> Result<EngineRun, RenderError> {
        let mut process = match EngineProcess::spawn(&mut cmd) {
            Ok(process) => process,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::EngineMissing(self.engine.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let stdout = spawn_reader(process.child.stdout.take());
        let stderr = spawn_reader(process.child.stderr.take());
        let deadline = Instant::now() + self.timeout;

        let (exit_code, timed_out) = match tokio::time::timeout_at(deadline, process.child.wait()).await {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                log::warn!("Render exceeded {:?}, killing engine", self.timeout);
                (None, true)
            }
        };

        // stragglers that outlived the engine would hold its pipes open
        process.kill_group();
        if timed_out {
            if let Err(e) = process.child.kill().await {
                log::debug!("Engine already gone: {}", e);
            }
        }

        let drain_until = deadline.max(Instant::now() + DRAIN_AFTER_KILL);
        let stdout = drain(stdout, drain_until).await;
        let stderr = drain(stderr, drain_until).await;

        Ok(EngineRun {
            exit_code,
            output: join_output(stdout, stderr),
            timed_out,
        })
    }

    /// Copy `video` into a newly claimed versioned file of `target`
    async fn publish(&self, video: &Path, target: &OutputTarget) -> Result<PathBuf, RenderError> {
        tokio::fs::create_dir_all(&target.dir).await?;
        let (path, mut file) = claim_versioned_file(&target.dir, &target.slug, target.first_version).await?;

        let copied = async {
            let mut source = tokio::fs::File::open(video).await?;
            tokio::io::copy(&mut source, &mut file).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = copied {
            // leave no empty or partial video behind under a claimed name
            if let Err(remove) = tokio::fs::remove_file(&path).await {
                log::warn!("Failed to remove {}: {}", path.display(), remove);
            }
            return Err(e.into());
        }
        Ok(path)
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                log::debug!("Engine pipe read failed: {}", e);
            }
        }
        buf
    })
}

/// Whatever a reader collected by `until`; a descendant that escaped the
/// process group may keep the pipe open forever
async fn drain(reader: JoinHandle<Vec<u8>>, until: Instant) -> Vec<u8> {
    let abort = reader.abort_handle();
    match tokio::time::timeout_at(until, reader).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            abort.abort();
            Vec::new()
        }
    }
}

fn join_output(stdout: Vec<u8>, stderr: Vec<u8>) -> String {
    let mut output = String::from_utf8_lossy(&stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&stderr));
    output
}

/// Locate the video the engine produced for `script` in its private media dir.
///
/// Looks in the preset's own directory first, then takes the newest mp4
/// anywhere under the media dir.
fn find_video(media_dir: &Path, script: &Path, quality: QualityPreset) -> Option<PathBuf> {
    let stem = script.file_stem()?.to_string_lossy().into_owned();
    let expected = media_dir
        .join("videos")
        .join(&stem)
        .join(quality.profile().dir_name())
        .join(format!("{}.mp4", SCENE_CLASS));
    if expected.is_file() {
        return Some(expected);
    }

    let pattern = format!("{}/**/*.mp4", media_dir.display());
    glob::glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| !path.components().any(|c| c.as_os_str() == "partial_movie_files"))
        .filter_map(|path| {
            let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

async fn remove_media_dir(media_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(media_dir).await {
        log::debug!("Failed to remove {}: {}", media_dir.display(), e);
    }
}

#[async_trait]
impl Renderer for ManimRenderer {
    async fn render(
        &self,
        artifact: &CandidateArtifact,
        quality: QualityPreset,
        target: &OutputTarget,
    ) -> Result<RenderOutcome, RenderError> {
        let script = self.write_script(&artifact.code).await?;
        let media_dir = self.create_media_dir(&script).await?;
        let profile = quality.profile();

        log::info!(
            "Rendering {} at {} quality, {} {}fps {}kbps (attempt {})",
            script.display(),
            quality,
            profile.resolution(),
            profile.fps,
            profile.bitrate_kbps,
            artifact.attempt
        );

        let outcome = self.render_in(&script, quality, &media_dir, target).await;
        remove_media_dir(&media_dir).await;
        outcome
    }
}

impl ManimRenderer {
    async fn render_in(
        &self,
        script: &Path,
        quality: QualityPreset,
        media_dir: &Path,
        target: &OutputTarget,
    ) -> Result<RenderOutcome, RenderError> {
        let run = self.run(self.command(script, quality, media_dir)).await?;

        if run.timed_out {
            return Ok(RenderOutcome::Failure {
                exit_code: None,
                diagnostic_text: timeout_diagnostic(self.timeout, &run.output),
            });
        }

        if run.exit_code != Some(0) {
            log::info!("Engine exited with {:?}", run.exit_code);
            return Ok(RenderOutcome::Failure {
                exit_code: run.exit_code,
                diagnostic_text: run.output,
            });
        }

        match find_video(media_dir, script, quality) {
            Some(found) => {
                let video_path = self.publish(&found, target).await?;
                log::info!("Rendered video: {}", video_path.display());
                Ok(RenderOutcome::Success { video_path })
            }
            None => {
                let mut diagnostic_text = run.output;
                if !diagnostic_text.is_empty() && !diagnostic_text.ends_with('\n') {
                    diagnostic_text.push('\n');
                }
                diagnostic_text.push_str(&format!(
                    "engine exited cleanly but produced no video; is the scene class named {}?",
                    SCENE_CLASS
                ));
                Ok(RenderOutcome::Failure {
                    exit_code: Some(0),
                    diagnostic_text,
                })
            }
        }
    }
}
