//! Local directory adapter
//!
//! Copies each file to `<destination>/<camera>/<given_name>`, writing to a
//! `.part` file first and renaming once the copy's content key matches the
//! record's. Has no notion of jobs.

use crate::adapter::{hook_string, AdapterSettings, CameraConfig, HookData, RemoteAdapter, UploadRequest};
use crate::error::{CliError, Result};
use async_trait::async_trait;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use vimport_common::checksum::compute_content_key;

const CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct CopyAdapter {
    destination: PathBuf,
}

impl CopyAdapter {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// Requires the `destination` hook data key
    pub fn from_settings(settings: &AdapterSettings) -> Result<Self> {
        let destination = hook_string(&settings.hook_data, "destination")?.ok_or_else(|| {
            CliError::config("the copy adapter needs a 'destination' entry in the hook data")
        })?;
        Ok(Self::new(destination))
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn camera_dir(&self, camera_name: &str) -> Result<PathBuf> {
        let invalid = camera_name.is_empty()
            || camera_name == "."
            || camera_name == ".."
            || camera_name.contains(['/', '\\']);
        if invalid {
            return Err(CliError::registration(
                camera_name,
                "camera name cannot be used as a directory name",
            ));
        }
        Ok(self.destination.join(camera_name))
    }
}

/// Copy `source` to `dest` through a temporary file, returning bytes copied
fn copy_verified(source: &Path, dest: &Path, expected_key: &str) -> Result<u64> {
    let part = dest.with_extension("part");

    let copied = (|| -> io::Result<u64> {
        let mut reader = fs::File::open(source)?;
        let mut writer = fs::File::create(&part)?;
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n])?;
            total += n as u64;
        }
        writer.sync_all()?;
        Ok(total)
    })();

    let copied = match copied {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(e.into());
        },
    };

    let actual = compute_content_key(&part)?;
    if actual != expected_key {
        let _ = fs::remove_file(&part);
        return Err(CliError::adapter(format!(
            "content key mismatch after copy: expected {}, got {}",
            expected_key, actual
        )));
    }

    fs::rename(&part, dest)?;
    Ok(copied)
}

#[async_trait]
impl RemoteAdapter for CopyAdapter {
    fn name(&self) -> &str {
        "copy"
    }

    fn set_hook_data(&mut self, data: &HookData) -> Result<()> {
        if let Some(destination) = hook_string(data, "destination")? {
            self.destination = PathBuf::from(destination);
        }
        Ok(())
    }

    async fn register_camera(&self, camera_name: &str, _host: &str, _port: u16) -> Result<CameraConfig> {
        let dir = self.camera_dir(camera_name)?;
        tokio::fs::create_dir_all(&dir).await?;
        debug!(camera = camera_name, dir = %dir.display(), "Camera directory ready");

        let mut config = CameraConfig::new(camera_name);
        config.extra.insert(
            "directory".to_string(),
            serde_json::Value::String(dir.to_string_lossy().to_string()),
        );
        Ok(config)
    }

    async fn upload_video(&self, request: &UploadRequest<'_>) -> Result<bool> {
        let dest = self.camera_dir(request.camera_name)?.join(request.given_name);
        let source = request.path.to_path_buf();
        let key = request.key.to_string();
        let target = dest.clone();

        let result = tokio::task::spawn_blocking(move || copy_verified(&source, &target, &key))
            .await
            .map_err(|e| CliError::adapter(format!("copy task failed: {}", e)))?;

        match result {
            Ok(bytes) => {
                info!(dest = %dest.display(), bytes, "Copied video");
                Ok(true)
            },
            Err(e) => {
                warn!(path = %request.path.display(), error = %e, "Copy failed");
                Ok(false)
            },
        }
    }
}
