//! Moves staged outputs into their final location.
//!
//! A plain rename is atomic. Across filesystems the file is copied to a
//! hidden temporary next to the destination and then renamed, so readers
//! never observe a partially written output.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

const COPY_BUFFER: usize = 256 * 1024;

/// Moves `staged` to `destination`, creating parent directories.
pub async fn publish_file(staged: &Path, destination: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    if try_atomic_move(staged, destination).await? {
        return Ok(());
    }

    debug!(
        "Cross-device publish of {} to {}, copying",
        staged.display(),
        destination.display()
    );

    let temp = hidden_temp_path(destination);
    if let Err(e) = copy_file(staged, &temp).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    fs::rename(&temp, destination).await?;
    fs::remove_file(staged).await?;
    Ok(())
}

async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn copy_file(source: &Path, destination: &Path) -> Result<u64, std::io::Error> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER, File::open(source).await?);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER, File::create(destination).await?);

    let mut total = 0u64;
    let mut buffer = vec![0u8; COPY_BUFFER];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(total)
}

fn hidden_temp_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.partial", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_moves_file() {
        let temp = tempfile::tempdir().unwrap();
        let staged = temp.path().join("stage/web.mp4");
        fs::create_dir_all(staged.parent().unwrap()).await.unwrap();
        fs::write(&staged, b"video").await.unwrap();

        let dest = temp.path().join("out/job-1/web.mp4");
        publish_file(&staged, &dest).await.unwrap();

        assert!(!staged.exists());
        assert_eq!(fs::read(&dest).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_publish_missing_source_fails() {
        let temp = tempfile::tempdir().unwrap();
        let result = publish_file(&temp.path().join("nope"), &temp.path().join("out/x")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_copy_file() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("a");
        fs::write(&src, vec![7u8; COPY_BUFFER + 10]).await.unwrap();
        let copied = copy_file(&src, &temp.path().join("b")).await.unwrap();
        assert_eq!(copied, (COPY_BUFFER + 10) as u64);
    }

    #[test]
    fn test_hidden_temp_path() {
        assert_eq!(
            hidden_temp_path(Path::new("/out/job/web.mp4")),
            PathBuf::from("/out/job/.web.mp4.partial")
        );
    }
}
