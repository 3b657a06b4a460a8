//! Packaging of finished storyboard frames: a timestamped ZIP archive of
//! every frame that produced an image, or loose PNG files per frame.

use base64::Engine;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use storyboard::GeneratedFrame;
use thiserror::Error;
use tracing::info;
use zip::write::FileOptions;
use zip::CompressionMethod;

/// Default archive prefix; the final name is `{prefix}_{epoch_millis}.zip`.
pub const DEFAULT_ARCHIVE_PREFIX: &str = "AI分镜脚本_项目包";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("frame {0} has an invalid image data URI")]
    InvalidDataUri(u32),
    #[error("frame {frame}: base64 decode failed: {source}")]
    Decode {
        frame: u32,
        source: base64::DecodeError,
    },
}

/// Entry name inside the archive: frame id plus the shot type with
/// whitespace collapsed to underscores.
pub fn frame_file_name(frame: &GeneratedFrame) -> String {
    let shot = frame
        .plan
        .shot_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("Frame_{}_{}.png", frame.id, shot)
}

/// Decode a frame's `data:image/png;base64,...` URI into raw PNG bytes.
pub fn decode_frame_image(frame: &GeneratedFrame) -> Result<Vec<u8>, ExportError> {
    let uri = frame
        .image_url
        .as_deref()
        .ok_or(ExportError::InvalidDataUri(frame.id))?;
    let payload = uri
        .split_once(',')
        .map(|(_, data)| data)
        .ok_or(ExportError::InvalidDataUri(frame.id))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|source| ExportError::Decode {
            frame: frame.id,
            source,
        })
}

/// Bundle every finished frame into `{dir}/{prefix}_{epoch_millis}.zip`.
/// Returns `None` without touching the filesystem when no frame has an
/// image.
pub fn export_zip(
    frames: &[GeneratedFrame],
    dir: &Path,
    prefix: &str,
) -> Result<Option<PathBuf>, ExportError> {
    let finished: Vec<&GeneratedFrame> =
        frames.iter().filter(|f| f.image_url.is_some()).collect();
    if finished.is_empty() {
        return Ok(None);
    }

    std::fs::create_dir_all(dir)?;
    let archive_path = dir.join(format!(
        "{}_{}.zip",
        prefix,
        chrono::Utc::now().timestamp_millis()
    ));

    let file = File::create(&archive_path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for frame in &finished {
        let bytes = decode_frame_image(frame)?;
        writer.start_file(frame_file_name(frame), options)?;
        writer.write_all(&bytes)?;
    }
    writer.finish()?;

    info!(
        entries = finished.len(),
        path = %archive_path.display(),
        "storyboard archive written"
    );
    Ok(Some(archive_path))
}

/// Write each finished frame as a loose `SCENE_{id}.png` file under `dir`.
/// Returns the paths written.
pub fn export_frames_dir(
    frames: &[GeneratedFrame],
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();
    std::fs::create_dir_all(dir)?;
    for frame in frames.iter().filter(|f| f.image_url.is_some()) {
        let bytes = decode_frame_image(frame)?;
        let path = dir.join(format!("SCENE_{}.png", frame.id));
        std::fs::write(&path, bytes)?;
        written.push(path);
    }
    info!(files = written.len(), dir = %dir.display(), "frames written");
    Ok(written)
}
