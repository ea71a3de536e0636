use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{CoreError, Mapping, MappingStore, PutOutcome, ShortCode, CLICKS_FIELD};

/// In-memory store for tests and local runs. The internal mutex makes each
/// port call atomic, which is all the gateway relies on.
pub struct InMemoryStore {
    inner: Mutex<BTreeMap<String, Mapping>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of stored mappings.
    pub fn len(&self) -> Result<usize, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Storage("mutex poisoned".into()))?;
        Ok(map.len())
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.len()? == 0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingStore for InMemoryStore {
    fn put_if_absent(&self, mapping: &Mapping) -> Result<PutOutcome, CoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Storage("mutex poisoned".into()))?;
        let key = mapping.short_code.as_str().to_string();
        if map.contains_key(&key) {
            return Ok(PutOutcome::AlreadyExists);
        }
        map.insert(key, mapping.clone());
        Ok(PutOutcome::Inserted)
    }

    fn get(&self, code: &ShortCode) -> Result<Option<Mapping>, CoreError> {
        let map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Storage("mutex poisoned".into()))?;
        Ok(map.get(code.as_str()).cloned())
    }

    fn increment_counter(
        &self,
        code: &ShortCode,
        field: &str,
        delta: u64,
        _default: u64,
    ) -> Result<(), CoreError> {
        // Mapping carries `clicks` as a plain u64, so the default never applies.
        if field != CLICKS_FIELD {
            return Err(CoreError::Storage(format!("unknown counter field: {field}")));
        }
        let mut map = self
            .inner
            .lock()
            .map_err(|_| CoreError::Storage("mutex poisoned".into()))?;
        match map.get_mut(code.as_str()) {
            Some(mapping) => {
                mapping.clicks = mapping.clicks.saturating_add(delta);
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn mk_mapping(code: &str) -> Mapping {
        Mapping::new(
            ShortCode::new(code).unwrap(),
            "https://example.com".to_string(),
            SystemTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn put_get_roundtrip() {
        let store = InMemoryStore::new();
        let m = mk_mapping("abc");
        assert_eq!(store.put_if_absent(&m).unwrap(), PutOutcome::Inserted);
        let got = store.get(&m.short_code).unwrap().unwrap();
        assert_eq!(got.target_url, "https://example.com");
        assert_eq!(got.clicks, 0);
    }

    #[test]
    fn put_keeps_first_writer() {
        let store = InMemoryStore::new();
        let first = mk_mapping("dup");
        let mut second = mk_mapping("dup");
        second.target_url = "https://other.example".into();
        store.put_if_absent(&first).unwrap();
        assert_eq!(
            store.put_if_absent(&second).unwrap(),
            PutOutcome::AlreadyExists
        );
        let got = store.get(&first.short_code).unwrap().unwrap();
        assert_eq!(got.target_url, "https://example.com");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn increment_adds_delta() {
        let store = InMemoryStore::new();
        let m = mk_mapping("cnt");
        store.put_if_absent(&m).unwrap();
        store
            .increment_counter(&m.short_code, CLICKS_FIELD, 1, 0)
            .unwrap();
        store
            .increment_counter(&m.short_code, CLICKS_FIELD, 2, 0)
            .unwrap();
        assert_eq!(store.get(&m.short_code).unwrap().unwrap().clicks, 3);
    }

    #[test]
    fn increment_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let code = ShortCode::new("missing").unwrap();
        let err = store
            .increment_counter(&code, CLICKS_FIELD, 1, 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn increment_unknown_field_is_rejected() {
        let store = InMemoryStore::new();
        let m = mk_mapping("fld");
        store.put_if_absent(&m).unwrap();
        let err = store
            .increment_counter(&m.short_code, "views", 1, 0)
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
