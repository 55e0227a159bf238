//! Attachment file utilities, for uploading event media and other relevant
//! operations.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// The URL prefix uploaded media is served under.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Uploads above this size are rejected outright.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub struct UploadFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    const UPLOAD_BASE_PATH: &'static str = "./uploads/";

    pub fn base_path() -> PathBuf {
        PathBuf::from(Self::UPLOAD_BASE_PATH)
    }

    /// Strips any path components the client sent and requires an extension.
    fn sanitized_name(name: &str) -> ApiResult<String> {
        let path = Path::new(name);
        let file_name = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .last()
            .ok_or_else(|| ApiError::BadRequest(format!("invalid file name: {}", name)))?;

        if Path::new(file_name).extension().is_none() {
            return Err(ApiError::BadRequest(
                "file must have an extension".to_owned(),
            ));
        }

        Ok(file_name.to_owned())
    }

    /// Writes the file under the upload directory with a unique stored name
    /// and returns the URL it will be served from.
    pub fn save(&self) -> ApiResult<String> {
        let stored_name = format!("{}_{}", Uuid::new_v4(), Self::sanitized_name(&self.file_name)?);
        let path = Self::base_path().join(&stored_name);

        std::fs::create_dir_all(Self::base_path())
            .map_err(|err| anyhow::anyhow!("Error creating upload directory: {}", err))?;

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|err| anyhow::anyhow!("Error opening file: {}", err))?;
        file.write_all(&self.content)
            .map_err(|err| anyhow::anyhow!("Error writing to file: {}", err))?;

        Ok(format!("{}/{}", UPLOAD_URL_PREFIX, stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_components_are_stripped() {
        assert_eq!(
            UploadFile::sanitized_name("../../etc/passwd.txt").unwrap(),
            "passwd.txt"
        );
        assert_eq!(
            UploadFile::sanitized_name("/absolute/menu.pdf").unwrap(),
            "menu.pdf"
        );
        assert_eq!(
            UploadFile::sanitized_name("photo.jpg").unwrap(),
            "photo.jpg"
        );
    }

    #[test]
    fn extensionless_names_are_rejected() {
        assert!(UploadFile::sanitized_name("menu").is_err());
        assert!(UploadFile::sanitized_name("").is_err());
        assert!(UploadFile::sanitized_name("../..").is_err());
    }
}
