//! In-memory [`TranscodeBackend`] for tests and dry runs.
//!
//! Every file the backend "produces" is a tiny placeholder on disk, while its
//! duration, the source tracks it contains and its first/last video frame are
//! tracked in a table. Operations follow the same duration arithmetic as the
//! real filters: a crossfade overlaps by its width, concatenation sums, a
//! stretch multiplies, a trim cuts, a mux stops at the shorter stream.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use loopcast_models::{LoudnessTarget, MediaKind};

use crate::backend::TranscodeBackend;
use crate::error::{MediaError, MediaResult};
use crate::probe::MediaInfo;

const SIM_FPS: f64 = 30.0;
const SIM_SAMPLE_RATE: u32 = 44_100;

/// What the simulator knows about one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SimMedia {
    pub kind: MediaKind,
    pub duration: f64,
    /// Names of the source tracks whose content ends up in this file, in order
    pub sources: Vec<String>,
    /// Identity of the first video frame
    pub first_frame: Option<String>,
    /// Identity of the last video frame
    pub last_frame: Option<String>,
}

#[derive(Debug, Default)]
struct SimState {
    media: HashMap<PathBuf, SimMedia>,
    calls: Vec<String>,
    fail_on: HashSet<String>,
}

/// Transcode backend that models media in memory.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an existing source file with a known duration.
    ///
    /// Video sources get distinct first/last frame identities derived from
    /// the file name.
    pub fn register_source(&self, path: impl Into<PathBuf>, kind: MediaKind, duration: f64) {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (first_frame, last_frame) = match kind {
            MediaKind::Video => (Some(format!("{}#first", name)), Some(format!("{}#last", name))),
            MediaKind::Audio => (None, None),
        };
        self.state().media.insert(
            path,
            SimMedia {
                kind,
                duration,
                sources: vec![name],
                first_frame,
                last_frame,
            },
        );
    }

    /// Make every subsequent call of `op` fail.
    pub fn fail_on(&self, op: &str) {
        self.state().fail_on.insert(op.to_string());
    }

    /// Operations invoked so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of times `op` was invoked.
    pub fn call_count(&self, op: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == op).count()
    }

    /// Simulated media for `path`, if known.
    pub fn media(&self, path: &Path) -> Option<SimMedia> {
        self.state().media.get(path).cloned()
    }

    fn begin(&self, op: &str) -> MediaResult<()> {
        let mut state = self.state();
        state.calls.push(op.to_string());
        if state.fail_on.contains(op) {
            return Err(MediaError::ffmpeg_failed(
                format!("simulated {} failure", op),
                Some("injected by SimulatedBackend".to_string()),
                Some(1),
            ));
        }
        Ok(())
    }

    fn lookup(&self, path: &Path) -> MediaResult<SimMedia> {
        self.state()
            .media
            .get(path)
            .cloned()
            .ok_or_else(|| MediaError::FileNotFound(path.to_path_buf()))
    }

    async fn produce(&self, output: &Path, media: SimMedia) -> MediaResult<()> {
        tokio::fs::write(output, b"simulated").await?;
        self.state().media.insert(output.to_path_buf(), media);
        Ok(())
    }
}

#[async_trait]
impl TranscodeBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn probe(&self, input: &Path) -> MediaResult<MediaInfo> {
        self.begin("probe")?;
        let media = self.lookup(input)?;
        let is_video = media.kind == MediaKind::Video;
        Ok(MediaInfo {
            duration: media.duration,
            format_name: Some(if is_video { "mp4" } else { "wav" }.to_string()),
            video_codec: is_video.then(|| "h264".to_string()),
            audio_codec: (!is_video).then(|| "pcm_s16le".to_string()),
            fps: is_video.then_some(SIM_FPS),
            sample_rate: (!is_video).then_some(SIM_SAMPLE_RATE),
        })
    }

    async fn normalize(&self, input: &Path, _target: &LoudnessTarget, output: &Path) -> MediaResult<()> {
        self.begin("normalize")?;
        let media = self.lookup(input)?;
        self.produce(output, media).await
    }

    async fn crossfade(&self, first: &Path, second: &Path, width: f64, output: &Path) -> MediaResult<()> {
        self.begin("crossfade")?;
        let a = self.lookup(first)?;
        let b = self.lookup(second)?;
        if width >= a.duration || width >= b.duration {
            return Err(MediaError::invalid_media(format!(
                "crossfade width {}s exceeds input duration",
                width
            )));
        }
        let mut sources = a.sources;
        sources.extend(b.sources);
        self.produce(
            output,
            SimMedia {
                kind: MediaKind::Audio,
                duration: a.duration + b.duration - width,
                sources,
                first_frame: None,
                last_frame: None,
            },
        )
        .await
    }

    async fn concat(&self, inputs: &[&Path], kind: MediaKind, output: &Path) -> MediaResult<()> {
        self.begin("concat")?;
        let parts = inputs
            .iter()
            .map(|p| self.lookup(p))
            .collect::<MediaResult<Vec<_>>>()?;
        if parts.is_empty() {
            return Err(MediaError::invalid_media("nothing to concatenate"));
        }

        let media = SimMedia {
            kind,
            duration: parts.iter().map(|p| p.duration).sum(),
            sources: parts.iter().flat_map(|p| p.sources.clone()).collect(),
            first_frame: parts.first().and_then(|p| p.first_frame.clone()),
            last_frame: parts.last().and_then(|p| p.last_frame.clone()),
        };
        self.produce(output, media).await
    }

    async fn stretch(&self, input: &Path, factor: f64, output: &Path) -> MediaResult<()> {
        self.begin("stretch")?;
        let mut media = self.lookup(input)?;
        media.duration *= factor;
        self.produce(output, media).await
    }

    async fn reverse(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.begin("reverse")?;
        let mut media = self.lookup(input)?;
        std::mem::swap(&mut media.first_frame, &mut media.last_frame);
        self.produce(output, media).await
    }

    async fn trim(&self, input: &Path, kind: MediaKind, duration: f64, output: &Path) -> MediaResult<()> {
        self.begin("trim")?;
        let mut media = self.lookup(input)?;
        if duration < media.duration {
            media.duration = duration;
            media.last_frame = None;
        }
        media.kind = kind;
        self.produce(output, media).await
    }

    async fn mux(&self, video: &Path, audio: &Path, duration: f64, output: &Path) -> MediaResult<()> {
        self.begin("mux")?;
        let v = self.lookup(video)?;
        let a = self.lookup(audio)?;
        let mut sources = v.sources;
        sources.extend(a.sources);
        self.produce(
            output,
            SimMedia {
                kind: MediaKind::Video,
                duration: v.duration.min(a.duration).min(duration),
                sources,
                first_frame: v.first_frame,
                last_frame: None,
            },
        )
        .await
    }
}
