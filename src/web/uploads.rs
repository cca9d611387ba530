use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Allowed image extensions
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Maximum file size (10 MB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Subdirectory of the media root holding profile photos.
pub const PROFILES_DIR: &str = "profiles";

/// Save a profile photo under `{media_dir}/profiles/`.
/// Returns the path relative to the media root (e.g. "profiles/abc123.jpg").
pub async fn save_profile_photo(
    media_dir: &str,
    filename: &str,
    data: &[u8],
) -> Result<String> {
    if data.is_empty() {
        return Err(AppError::Validation("Nenhum arquivo enviado.".to_string()));
    }

    // Validate file size
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::Validation("Arquivo muito grande (máximo 10 MB).".to_string()));
    }

    // Extract and validate extension
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .ok_or_else(|| AppError::Validation("Nome de arquivo inválido.".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "Tipo de arquivo inválido. Permitidos: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    // Ensure profiles directory exists
    let profiles_path = PathBuf::from(media_dir).join(PROFILES_DIR);
    fs::create_dir_all(&profiles_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create uploads directory: {}", e))
    })?;

    // Generate unique filename
    let new_filename = format!("{}.{}", Uuid::new_v4(), extension);
    let file_path = profiles_path.join(&new_filename);

    let mut file = fs::File::create(&file_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create file: {}", e))
    })?;

    file.write_all(data).await.map_err(|e| {
        AppError::Internal(format!("Failed to write file: {}", e))
    })?;

    Ok(format!("{}/{}", PROFILES_DIR, new_filename))
}

/// Delete a profile photo given its media-relative path. Paths outside the
/// profiles namespace are ignored.
pub async fn delete_profile_photo(media_dir: &str, relative: &str) -> Result<()> {
    let Some(name) = relative.strip_prefix("profiles/") else {
        return Ok(());
    };
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Ok(());
    }

    let path = Path::new(media_dir).join(PROFILES_DIR).join(name);
    if fs::try_exists(&path).await.unwrap_or(false) {
        fs::remove_file(&path).await.map_err(|e| {
            AppError::Internal(format!("Failed to delete file: {}", e))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_media_dir() -> String {
        std::env::temp_dir()
            .join(format!("intranet-media-{}", Uuid::new_v4()))
            .to_string_lossy()
            .to_string()
    }

    #[tokio::test]
    async fn test_save_and_delete_profile_photo() {
        let media = temp_media_dir();
        let path = save_profile_photo(&media, "Foto.PNG", b"\x89PNG fake").await.unwrap();
        assert!(path.starts_with("profiles/") && path.ends_with(".png"));

        let on_disk = Path::new(&media).join(&path);
        assert!(on_disk.exists());

        delete_profile_photo(&media, &path).await.unwrap();
        assert!(!on_disk.exists());

        let _ = std::fs::remove_dir_all(&media);
    }

    #[tokio::test]
    async fn test_rejects_other_file_types() {
        let media = temp_media_dir();
        assert!(save_profile_photo(&media, "script.svg", b"<svg/>").await.is_err());
        assert!(save_profile_photo(&media, "noextension", b"data").await.is_err());
        assert!(save_profile_photo(&media, "empty.jpg", b"").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_ignores_paths_outside_profiles() {
        let media = temp_media_dir();
        assert!(delete_profile_photo(&media, "../etc/passwd").await.is_ok());
        assert!(delete_profile_photo(&media, "profiles/../../x").await.is_ok());
    }
}
