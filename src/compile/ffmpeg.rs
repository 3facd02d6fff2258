use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::compile::plan::{CompilePlan, Segment, SegmentSource};
use crate::config::VideoConfig;
use crate::error::{CompileError, Result};

/// The finished output video
#[derive(Debug, Clone)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub segment_count: usize,
    pub planned_duration: f64,
    pub file_size: u64,
}

/// Renders a [`CompilePlan`] into a single encoded video using external
/// FFmpeg commands.
///
/// Segments are rendered one by one with uniform encoding parameters, then
/// concatenated with the concat demuxer in plan order.
pub struct MediaCompiler {
    config: VideoConfig,
    temp_dir: Option<PathBuf>,
}

impl MediaCompiler {
    pub fn new(config: VideoConfig) -> Self {
        Self { config, temp_dir: None }
    }

    pub fn check_ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Render the plan to `output_path`. No output file is produced on
    /// failure.
    pub async fn compile<P: AsRef<Path>>(
        &mut self,
        plan: &CompilePlan,
        output_path: P,
    ) -> Result<VideoArtifact> {
        let output_path = output_path.as_ref();
        info!("Compiling video with {} segments", plan.len());

        if !Self::check_ffmpeg_available() {
            return Err(CompileError::FfmpegMissing.into());
        }

        let temp_dir = self.ensure_temp_dir()?;

        let mut segment_paths = Vec::with_capacity(plan.len());
        for (position, segment) in plan.segments.iter().enumerate() {
            let segment_path = temp_dir.join(format!("segment_{position:04}.mp4"));
            self.render_segment(segment, &temp_dir, &segment_path)?;
            segment_paths.push(segment_path);
        }

        let list_path = self.write_concat_list(&segment_paths, &temp_dir)?;
        self.concat_segments(&list_path, output_path)?;

        let file_size = std::fs::metadata(output_path)?.len();
        let artifact = VideoArtifact {
            path: output_path.to_path_buf(),
            segment_count: plan.len(),
            planned_duration: plan.segments.iter().map(|s| s.duration).sum(),
            file_size,
        };

        info!(
            "Video compiled: {:?} ({:.1} MB)",
            artifact.path,
            artifact.file_size as f64 / 1024.0 / 1024.0
        );
        Ok(artifact)
    }

    /// Remove the temporary working directory
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(temp_dir) = self.temp_dir.take() {
            std::fs::remove_dir_all(&temp_dir)?;
            debug!("Removed temp dir {:?}", temp_dir);
        }
        Ok(())
    }

    fn ensure_temp_dir(&mut self) -> Result<PathBuf> {
        if let Some(ref temp_dir) = self.temp_dir {
            return Ok(temp_dir.clone());
        }

        let temp_dir = PathBuf::from(format!("./temp_storycraft_{}", std::process::id()));
        create_dir_all(&temp_dir)?;
        self.temp_dir = Some(temp_dir.clone());
        Ok(temp_dir)
    }

    fn render_segment(
        &self,
        segment: &Segment,
        temp_dir: &Path,
        segment_path: &Path,
    ) -> Result<()> {
        let args = match &segment.source {
            SegmentSource::Still { image } => {
                let image_path = temp_dir.join(format!(
                    "still_{}.{}",
                    segment.scene_index,
                    image.format.extension()
                ));
                std::fs::write(&image_path, &image.bytes)?;
                still_segment_args(&self.config, &image_path, segment.duration, segment_path)
            }
            SegmentSource::Clip { path, effect_audio } => clip_segment_args(
                &self.config,
                path,
                effect_audio.as_deref(),
                segment.duration,
                segment_path,
            ),
        };

        debug!("Rendering segment for scene {}", segment.scene_index);
        run_ffmpeg(&args).map_err(|reason| {
            CompileError::SegmentFailed {
                reason: format!("scene {}: {}", segment.scene_index, reason),
            }
            .into()
        })
    }

    fn write_concat_list(&self, segment_paths: &[PathBuf], temp_dir: &Path) -> Result<PathBuf> {
        let list_path = temp_dir.join("segments.txt");
        let mut file = File::create(&list_path)?;

        for path in segment_paths {
            let absolute = path.canonicalize().unwrap_or_else(|_| path.clone());
            writeln!(file, "file '{}'", absolute.display())?;
        }

        Ok(list_path)
    }

    fn concat_segments(&self, list_path: &Path, output_path: &Path) -> Result<()> {
        let args = concat_args(list_path, output_path);
        run_ffmpeg(&args).map_err(|reason| {
            // Never leave a half-written output behind
            let _ = std::fs::remove_file(output_path);
            CompileError::EncodingFailed { reason }.into()
        })
    }
}

fn run_ffmpeg(args: &[String]) -> std::result::Result<(), String> {
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .map_err(|e| format!("failed to run ffmpeg: {e}"))?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).into_owned());
    }
    Ok(())
}

/// Arguments for rendering a still image into a fixed-duration segment
/// with a silent audio track, so every segment carries uniform streams.
fn still_segment_args(
    config: &VideoConfig,
    image_path: &Path,
    duration: f64,
    segment_path: &Path,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image_path.display().to_string(),
        "-f".into(),
        "lavfi".into(),
        "-i".into(),
        "anullsrc=channel_layout=stereo:sample_rate=44100".into(),
        "-t".into(),
        format!("{duration}"),
        "-r".into(),
        config.fps.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:v".into(),
        config.codec.clone(),
        "-c:a".into(),
        config.audio_codec.clone(),
        "-shortest".into(),
        segment_path.display().to_string(),
    ]
}

/// Arguments for trimming an uploaded clip to the duration cap, mixing a
/// matched effect as an overlay onto the clip's own audio when present.
fn clip_segment_args(
    config: &VideoConfig,
    clip_path: &Path,
    effect_audio: Option<&Path>,
    duration_cap: f64,
    segment_path: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), clip_path.display().to_string()];

    if let Some(effect) = effect_audio {
        args.extend([
            "-i".into(),
            effect.display().to_string(),
            "-filter_complex".into(),
            "[0:a][1:a]amix=inputs=2:duration=first[aout]".into(),
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "[aout]".into(),
        ]);
    }

    args.extend([
        "-t".into(),
        format!("{duration_cap}"),
        "-r".into(),
        config.fps.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:v".into(),
        config.codec.clone(),
        "-c:a".into(),
        config.audio_codec.clone(),
        segment_path.display().to_string(),
    ]);
    args
}

/// Arguments for concatenating already-encoded segments in plan order
fn concat_args(list_path: &Path, output_path: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.display().to_string(),
        "-c".into(),
        "copy".into(),
        output_path.display().to_string(),
    ]
}
