//! Storage engine implementation.

use super::key::{decode_index_id, type_index_key, type_index_prefix};
use super::{ObjectRecord, StorageConfig};
use crate::error::Error;
use crate::identity::{Identity, ID_SIZE};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::debug;

/// Tree name for object records.
const OBJECTS_TREE: &str = "objects";

/// Tree name for entity type index.
const TYPE_INDEX_TREE: &str = "index:entity_type";

/// A write applied by [`StorageEngine::apply`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert or replace the record of an instance.
    Put {
        /// Instance written.
        identity: Identity,
        /// New record.
        record: ObjectRecord,
    },
    /// Remove an instance.
    Delete {
        /// Instance removed.
        identity: Identity,
    },
}

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for object records (id -> record).
    objects_tree: Tree,

    /// Tree for entity type index (entity_type + id -> empty).
    type_index_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let objects_tree = db.open_tree(OBJECTS_TREE)?;
        let type_index_tree = db.open_tree(TYPE_INDEX_TREE)?;

        Ok(Self {
            db,
            objects_tree,
            type_index_tree,
        })
    }

    /// Get the stored record of an instance.
    ///
    /// Returns `None` when nothing is stored under the id or the stored record
    /// belongs to another entity.
    pub fn get(&self, identity: &Identity) -> Result<Option<ObjectRecord>, Error> {
        match self.objects_tree.get(identity.id())? {
            Some(bytes) => {
                let record = ObjectRecord::from_bytes(&bytes)?;
                Ok((record.entity == identity.entity()).then_some(record))
            }
            None => Ok(None),
        }
    }

    /// Check if an instance is stored.
    pub fn contains(&self, identity: &Identity) -> Result<bool, Error> {
        Ok(self.get(identity)?.is_some())
    }

    /// Scan all stored instances of an entity.
    pub fn scan_entity_type(
        &self,
        entity: &str,
    ) -> impl Iterator<Item = Result<(Identity, ObjectRecord), Error>> + '_ {
        let entity = entity.to_string();
        self.list_ids(&entity).filter_map(move |result| {
            let identity = match result {
                Ok(id) => Identity::new(entity.as_str(), id),
                Err(e) => return Some(Err(e)),
            };
            match self.get(&identity) {
                Ok(Some(record)) => Some(Ok((identity, record))),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    /// List the ids of all stored instances of an entity.
    pub fn list_ids(&self, entity: &str) -> impl Iterator<Item = Result<[u8; ID_SIZE], Error>> + '_ {
        let prefix = type_index_prefix(entity);
        let prefix_len = prefix.len();

        self.type_index_tree.scan_prefix(&prefix).map(move |result| {
            let (key, _) = result?;
            decode_index_id(&key, prefix_len)
                .ok_or_else(|| Error::Deserialization("malformed type index key".to_string()))
        })
    }

    /// Store a single record.
    #[cfg(test)]
    pub fn put(&self, identity: Identity, record: ObjectRecord) -> Result<(), Error> {
        self.apply(&[WriteOp::Put { identity, record }])
    }

    /// Apply a batch of writes atomically.
    ///
    /// Either every write lands or none does.
    pub fn apply(&self, ops: &[WriteOp]) -> Result<(), Error> {
        if ops.is_empty() {
            return Ok(());
        }

        // The closure may run more than once on conflict.
        let encoded = ops
            .iter()
            .map(|op| -> Result<_, Error> {
                match op {
                    WriteOp::Put { identity, record } => Ok((identity, Some(record.to_bytes()?))),
                    WriteOp::Delete { identity } => Ok((identity, None)),
                }
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let result: Result<(), TransactionError<Error>> = (&self.objects_tree, &self.type_index_tree)
            .transaction(|(objects_tx, type_tx)| {
                for (identity, bytes) in &encoded {
                    let index_key = type_index_key(identity.entity(), identity.id());
                    match bytes {
                        Some(bytes) => {
                            objects_tx.insert(&identity.id()[..], bytes.as_slice())?;
                            type_tx.insert(index_key, &b""[..])?;
                        }
                        None => {
                            objects_tx.remove(&identity.id()[..])?;
                            type_tx.remove(index_key)?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<Error>>(())
            });

        match result {
            Ok(()) => {
                debug!(writes = ops.len(), "storage batch applied");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Generate a new instance id (UUID v4 layout).
    pub fn generate_id() -> [u8; ID_SIZE] {
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::time::{SystemTime, UNIX_EPOCH};

        // Counter to ensure uniqueness even with same timestamp
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

        // Byte 8 only carries the variant so the counter keeps all 56 low bits.
        let mut id = [0u8; ID_SIZE];
        id[..8].copy_from_slice(&now.to_le_bytes());
        id[9..].copy_from_slice(&counter.to_le_bytes()[..7]);

        // Set UUID version 4 bits
        id[6] = (id[6] & 0x0f) | 0x40;
        id[8] = 0x80;

        id
    }
}
