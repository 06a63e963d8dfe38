use super::{HotReloadData, ReloadStorage};
use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

/// In-memory reload storage (for testing or single-run; not persistent).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<Option<HotReloadData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded storage, as if a previous run had dumped `data`.
    pub fn with_data(data: HotReloadData) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }

    pub fn snapshot(&self) -> Option<HotReloadData> {
        self.data.read().clone()
    }
}

#[async_trait]
impl ReloadStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<HotReloadData>> {
        Ok(self.data.read().clone())
    }

    async fn save(&self, data: &HotReloadData) -> Result<()> {
        *self.data.write() = Some(data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_starts_empty() {
        let store = MemoryStorage::new();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_storage_save_and_load() {
        let store = MemoryStorage::new();
        let mut data = HotReloadData::default();
        data.login_info.wx_uin = 123;
        data.domain = "wx.qq.com".into();
        store.save(&data).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn memory_storage_save_replaces() {
        let mut first = HotReloadData::default();
        first.login_info.wx_uin = 1;
        let store = MemoryStorage::with_data(first);
        let mut second = HotReloadData::default();
        second.login_info.wx_uin = 2;
        tokio_test::assert_ok!(tokio_test::block_on(store.save(&second)));
        assert_eq!(store.snapshot().unwrap().login_info.wx_uin, 2);
    }
}
