//! Thumbnail service
//!
//! Produces a JPEG still frame for a media file by invoking an external
//! ffmpeg binary, grabbing one frame two minutes in. Results are cached as
//! `<media>.jpg` next to the media file so each frame is extracted once.

use std::path::Path;
use std::process::Stdio;

use couchcast_common::{Error, Result};
use tokio::process::Command;
use tracing::debug;

use crate::library::safe_join;

/// Offset into the file for the still frame; far enough in to skip titles
const FRAME_OFFSET: &str = "00:02:00";

/// Return JPEG bytes for the given media reference, extracting and caching
/// the frame on first request.
pub async fn thumbnail(ffmpeg: &Path, root: &Path, rel_path: &str) -> Result<Vec<u8>> {
    let media = safe_join(root, rel_path)?;
    if !media.is_file() {
        return Err(Error::NotFound(format!("no such file: {}", rel_path)));
    }

    let cache = cache_path(&media);
    if cache.is_file() {
        debug!("Thumbnail cache hit: {}", cache.display());
        return Ok(tokio::fs::read(&cache).await?);
    }

    let bytes = extract_frame(ffmpeg, &media).await?;
    // Cache write failure is not fatal; the frame can be extracted again
    if let Err(e) = tokio::fs::write(&cache, &bytes).await {
        debug!("Failed to write thumbnail cache {}: {}", cache.display(), e);
    }
    Ok(bytes)
}

/// Cache file path: the media path with `.jpg` appended
fn cache_path(media: &Path) -> std::path::PathBuf {
    let mut os = media.as_os_str().to_os_string();
    os.push(".jpg");
    std::path::PathBuf::from(os)
}

/// Run ffmpeg and collect the single frame from stdout
async fn extract_frame(ffmpeg: &Path, media: &Path) -> Result<Vec<u8>> {
    let output = Command::new(ffmpeg)
        .arg("-ss")
        .arg(FRAME_OFFSET)
        .arg("-i")
        .arg(media)
        .args(["-frames:v", "1", "-f", "image2", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::Internal(format!("failed to spawn ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Internal(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    if output.stdout.is_empty() {
        return Err(Error::Internal("ffmpeg produced no frame".into()));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn serves_cached_frame_without_invoking_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.mp4"), b"media").unwrap();
        std::fs::write(dir.path().join("x.mp4.jpg"), b"cached-jpeg").unwrap();

        // ffmpeg path is bogus on purpose: the cache must make it unreachable
        let bytes = thumbnail(&PathBuf::from("/nonexistent/ffmpeg"), dir.path(), "x.mp4")
            .await
            .unwrap();
        assert_eq!(bytes, b"cached-jpeg");
    }

    #[tokio::test]
    async fn missing_media_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = thumbnail(&PathBuf::from("ffmpeg"), dir.path(), "nope.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unspawnable_ffmpeg_is_an_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.mp4"), b"media").unwrap();

        let err = thumbnail(&PathBuf::from("/nonexistent/ffmpeg"), dir.path(), "x.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn cache_path_appends_jpg() {
        assert_eq!(
            cache_path(Path::new("/lib/Movies/x.mp4")),
            PathBuf::from("/lib/Movies/x.mp4.jpg")
        );
    }
}
