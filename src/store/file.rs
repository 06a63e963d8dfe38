use super::{HotReloadData, ReloadStorage};
use crate::error::StoreError;
use crate::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Reload storage backed by a pretty-printed JSON file.
///
/// Saves go to a sibling temp file first and are renamed over the target,
/// so a crash mid-write leaves the previous dump intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "storage".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ReloadStorage for JsonFileStorage {
    async fn load(&self) -> Result<Option<HotReloadData>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Load(e.to_string()).into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let data = HotReloadData::from_json(&bytes)
            .map_err(|e| StoreError::Load(format!("{}: {}", self.path.display(), e)))?;
        Ok(Some(data))
    }

    async fn save(&self, data: &HotReloadData) -> Result<()> {
        let bytes = data.to_json()?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Save(e.to_string()))?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Save(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Save(e.to_string()))?;
        tracing::debug!(path = %self.path.display(), "session dumped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StoredCookie;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStorage::new(dir.path().join("storage.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStorage::new(dir.path().join("nested").join("storage.json"));
        let mut data = HotReloadData::default();
        data.login_info.wx_uin = 42;
        data.login_info.pass_ticket = "PT".into();
        data.domain = "wx2.qq.com".into();
        data.cookies.insert(
            "https://wx2.qq.com/",
            StoredCookie::parse("wxsid=SID; Path=/").unwrap(),
        );
        store.save(&data).await.unwrap();
        assert!(!store.temp_path().exists());
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = JsonFileStorage::new(&path).load().await.unwrap_err();
        assert!(matches!(err, crate::Error::Store(StoreError::Load(_))));
    }
}
