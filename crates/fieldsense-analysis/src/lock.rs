//! Per field-and-day mutual exclusion within one process.
//!
//! This implementation uses `Mutex::unwrap()` on the key table intentionally.
//! The table is only touched for map lookups, so poisoning means a panic in
//! this module, which is an unrecoverable state.

use chrono::NaiveDate;
use fieldsense_core::models::FieldId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (FieldId, NaiveDate);

/// Advisory locks keyed by field and analysis date
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Key, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the key; released when the guard drops
    pub async fn acquire(&self, field_id: &FieldId, date: NaiveDate) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks.retain(|_, weak| weak.strong_count() > 0);

            let key = (field_id.clone(), date);
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(key, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Keys with a live lock
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
