//! sled-backed store.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::Path;

use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, IVec};
use tracing::info;

use crate::storage::kv::{KvStore, StoreError, StoreResult};

/// Durable store on top of a sled database.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened proxy directory database");
        Ok(Self { db })
    }

    /// Temporary database removed on drop, for tests.
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Flush dirty pages to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode(key: &str, value: IVec) -> StoreResult<String> {
    String::from_utf8(value.to_vec()).map_err(|_| StoreError::Encoding(key.to_string()))
}

impl KvStore for SledStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(Some(decode(key, value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<Option<String>> {
        match self.db.remove(key.as_bytes())? {
            Some(value) => Ok(Some(decode(key, value)?)),
            None => Ok(None),
        }
    }

    fn range(&self) -> StoreResult<BTreeMap<String, String>> {
        let mut entries = BTreeMap::new();
        for item in self.db.iter() {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| StoreError::Encoding(String::from_utf8_lossy(&key).into_owned()))?;
            let value = decode(&key, value)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }

    fn replace(&self, old_key: &str, new_key: &str, value: &str) -> StoreResult<()> {
        let result: Result<(), TransactionError<Infallible>> =
            self.db
                .transaction(|tx| -> ConflictableTransactionResult<(), Infallible> {
                    tx.remove(old_key.as_bytes())?;
                    tx.insert(new_key.as_bytes(), value.as_bytes())?;
                    Ok(())
                });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(never)) => match never {},
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }
}
