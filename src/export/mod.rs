//! # Bundle Export Module
//!
//! Serializes scene prompts and generated images into one downloadable
//! ZIP archive with stable, human-sortable entry names.

use std::fmt::Write as _;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{ArchiveError, Result};
use crate::scene::Scene;

/// Description of a written bundle
#[derive(Debug, Clone)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    pub entry_count: usize,
}

/// Writes the story bundle archive.
///
/// Layout: one `prompts.txt` with every scene's text in index order, one
/// `scene_<1-based>.<ext>` per scene with an image, and one
/// `motion_<1-based>.txt` per scene with a motion prompt. Entry names are
/// keyed on the scene's 1-based position so the archive sorts the same way
/// everywhere. Zero images is not an error.
pub struct BundleExporter;

impl BundleExporter {
    /// Export to a file on disk
    pub fn export_to_file<P: AsRef<Path>>(scenes: &[Scene], path: P) -> Result<ArchiveArtifact> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let entry_count = Self::export(scenes, file)?;

        info!("Bundle exported to {:?} ({} entries)", path, entry_count);
        Ok(ArchiveArtifact { path: path.to_path_buf(), entry_count })
    }

    /// Export to any seekable writer; returns the number of entries written
    pub fn export<W: Write + Seek>(scenes: &[Scene], writer: W) -> Result<usize> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default();
        let mut entry_count = 0;

        write_entry(&mut zip, "prompts.txt", prompts_text(scenes).as_bytes(), options)?;
        entry_count += 1;

        for scene in scenes {
            let position = scene.index + 1;

            if let Some(image) = &scene.image {
                let name = format!("scene_{}.{}", position, image.format.extension());
                write_entry(&mut zip, &name, &image.bytes, options)?;
                entry_count += 1;
            }

            if let Some(motion) = &scene.motion_prompt {
                let name = format!("motion_{position}.txt");
                write_entry(&mut zip, &name, motion.as_bytes(), options)?;
                entry_count += 1;
            }
        }

        zip.finish().map_err(|e| ArchiveError::FinalizeFailed { reason: e.to_string() })?;
        Ok(entry_count)
    }
}

/// All scene text concatenated in index order, each scene preceded by its
/// position label and title, separated by blank lines
fn prompts_text(scenes: &[Scene]) -> String {
    let mut text = format!(
        "Story bundle exported {}\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    );
    for scene in scenes {
        let _ = writeln!(text, "Scene {}: {}", scene.index + 1, scene.title);
        let _ = writeln!(text, "{}", scene.summary);
        let _ = writeln!(text, "Image prompt: {}", scene.image_prompt);
        text.push('\n');
    }
    text
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
    options: SimpleFileOptions,
) -> Result<()> {
    zip.start_file(name, options).map_err(|e| ArchiveError::EntryFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    zip.write_all(bytes).map_err(|e| ArchiveError::EntryFailed {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}
