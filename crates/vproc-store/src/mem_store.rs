use crate::{KvStore, StoreResult, validate_key};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

#[derive(Clone, Default)]
pub struct MemKvStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl std::fmt::Debug for MemKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemKvStore")
            .field("entries", &self.entries.read().unwrap().len())
            .finish()
    }
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        Ok(self.entries.write().unwrap().remove(key).is_some())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.read().unwrap().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KvStoreExt, StoreError};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        name: String,
        counter: u64,
    }

    #[test]
    fn json_round_trip() {
        let store = MemKvStore::new();
        let value = Dummy {
            name: "demo".into(),
            counter: 7,
        };
        store.put_json("DUMMY", &value).expect("put");
        let loaded: Option<Dummy> = store.get_json("DUMMY").expect("get");
        assert_eq!(loaded, Some(value));
        assert_eq!(store.keys().unwrap(), vec!["DUMMY".to_string()]);
    }

    #[test]
    fn clones_share_entries() {
        let store = MemKvStore::new();
        let other = store.clone();
        store.put("NEXT_PID", b"5").unwrap();
        assert_eq!(other.get("NEXT_PID").unwrap(), Some(b"5".to_vec()));
        assert!(other.delete("NEXT_PID").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_path_like_keys() {
        let store = MemKvStore::new();
        let err = store.put("../escape", b"x").expect_err("invalid key");
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
