// ABOUTME: XDG-compliant storage layer with atomic writes
// ABOUTME: Handles paths, permissions, and the persisted last-search record

use crate::{model::LastSearch, Error, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Paths {
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl Paths {
    pub fn new(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = if let Some(dir) = data_dir_override {
            dir
        } else {
            ProjectDirs::from("", "", "pixseek")
                .ok_or_else(|| {
                    Error::Filesystem(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "Could not determine data directory",
                    ))
                })?
                .data_dir()
                .to_path_buf()
        };

        Ok(Paths {
            models_dir: data_dir.join("models"),
            tmp_dir: data_dir.join("tmp"),
            settings_path: data_dir.join("last_search.json"),
            data_dir,
        })
    }

    pub fn with_models_dir(mut self, models_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = models_dir {
            self.models_dir = dir;
        }
        self
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in &[&self.data_dir, &self.models_dir, &self.tmp_dir] {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = fs::Permissions::from_mode(0o700);
                fs::set_permissions(dir, perms)?;
            }
        }
        Ok(())
    }
}

pub fn write_atomic(path: &Path, content: &[u8], tmp_dir: &Path) -> Result<()> {
    use rand::Rng;

    let random: u32 = rand::thread_rng().gen();
    let tmp_path = tmp_dir.join(format!("{:x}.part", random));

    fs::create_dir_all(tmp_dir)?;
    fs::write(&tmp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&tmp_path, perms)?;
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Overwrites the record wholesale. Concurrent writers race; the last rename wins.
pub fn save_last_search(path: &Path, record: &LastSearch) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    let tmp_dir = path
        .parent()
        .map(|p| p.join("tmp"))
        .unwrap_or_else(|| PathBuf::from("tmp"));
    write_atomic(path, json.as_bytes(), &tmp_dir)
}

pub fn load_last_search(path: &Path) -> Result<Option<LastSearch>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}
