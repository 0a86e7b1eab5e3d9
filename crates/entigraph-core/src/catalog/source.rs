//! Metadata sources the schema catalog is loaded from.

use super::SchemaBundle;
use crate::error::Error;
use parking_lot::RwLock;
use sled::{Db, Tree};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Tree name for schema bundles.
const SCHEMA_TREE: &str = "catalog:schemas";

/// Tree name for catalog metadata.
const META_TREE: &str = "catalog:meta";

/// Key for current schema version in meta tree.
const CURRENT_VERSION_KEY: &[u8] = b"current_version";

/// Anything able to produce the schema.
pub trait MetadataSource {
    /// Load the full schema.
    fn load_schema(&self) -> Result<SchemaBundle, Error>;
}

impl MetadataSource for SchemaBundle {
    fn load_schema(&self) -> Result<SchemaBundle, Error> {
        Ok(self.clone())
    }
}

/// A schema described by a JSON file.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    path: PathBuf,
}

impl SchemaFile {
    /// Point at a JSON schema file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataSource for SchemaFile {
    fn load_schema(&self) -> Result<SchemaBundle, Error> {
        let json = std::fs::read_to_string(&self.path)?;
        SchemaBundle::from_json(&json)
    }
}

/// Versioned schema history persisted in sled.
pub struct SchemaStore {
    schema_tree: Tree,
    meta_tree: Tree,
    current_version: AtomicU64,
    current_schema: RwLock<Option<SchemaBundle>>,
}

impl SchemaStore {
    /// Open or create the schema store in the given database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        let schema_tree = db.open_tree(SCHEMA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        let current_version = match meta_tree.get(CURRENT_VERSION_KEY)? {
            Some(bytes) => decode_version(&bytes)?,
            None => 0,
        };

        let store = Self {
            schema_tree,
            meta_tree,
            current_version: AtomicU64::new(current_version),
            current_schema: RwLock::new(None),
        };

        if current_version > 0 {
            let schema = store.schema_at_version(current_version)?;
            *store.current_schema.write() = schema;
        }

        Ok(store)
    }

    /// Get the current schema version (0 when nothing was applied).
    pub fn current_version(&self) -> u64 {
        self.current_version.load(Ordering::SeqCst)
    }

    /// Get the current schema bundle.
    pub fn current_schema(&self) -> Option<SchemaBundle> {
        self.current_schema.read().clone()
    }

    /// Get a schema bundle at a specific version.
    pub fn schema_at_version(&self, version: u64) -> Result<Option<SchemaBundle>, Error> {
        match self.schema_tree.get(version.to_be_bytes())? {
            Some(bytes) => Ok(Some(SchemaBundle::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store a new schema as the next version.
    ///
    /// The bundle is validated first; its version field is overwritten.
    pub fn apply_schema(&self, mut bundle: SchemaBundle) -> Result<u64, Error> {
        bundle.validate()?;

        let new_version = self.current_version() + 1;
        bundle.version = new_version;

        self.schema_tree
            .insert(new_version.to_be_bytes(), bundle.to_bytes()?)?;
        self.meta_tree
            .insert(CURRENT_VERSION_KEY, &new_version.to_be_bytes())?;

        self.current_version.store(new_version, Ordering::SeqCst);
        *self.current_schema.write() = Some(bundle);

        tracing::info!(version = new_version, "schema applied");
        Ok(new_version)
    }

    /// List all stored schema versions.
    pub fn list_versions(&self) -> Result<Vec<u64>, Error> {
        let mut versions = Vec::new();
        for result in self.schema_tree.iter() {
            let (key, _) = result?;
            if key.len() == 8 {
                versions.push(decode_version(&key)?);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.schema_tree.flush()?;
        self.meta_tree.flush()?;
        Ok(())
    }
}

impl MetadataSource for SchemaStore {
    fn load_schema(&self) -> Result<SchemaBundle, Error> {
        self.current_schema()
            .ok_or_else(|| Error::NotFound("no schema has been applied".to_string()))
    }
}

fn decode_version(bytes: &[u8]) -> Result<u64, Error> {
    let buf: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::Deserialization(format!("bad version key length {}", bytes.len())))?;
    Ok(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, EntityDef, RelationshipDef, ScalarType};

    fn sample_schema() -> SchemaBundle {
        let customer = EntityDef::new("Customer")
            .with_primary_key("id")
            .with_attribute(AttributeDef::new("id", ScalarType::Uuid))
            .with_attribute(AttributeDef::new("name", ScalarType::String));

        let order = EntityDef::new("Order")
            .with_attribute(AttributeDef::new("customer_id", ScalarType::Uuid))
            .with_relationship(
                RelationshipDef::to_one("customer", "Order", "Customer")
                    .with_source_attribute("customer_id"),
            );

        SchemaBundle::new(0).with_entity(customer).with_entity(order)
    }

    fn test_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[test]
    fn test_store_open_empty() {
        let db = test_db();
        let store = SchemaStore::open(&db).unwrap();

        assert_eq!(store.current_version(), 0);
        assert!(store.current_schema().is_none());
        assert!(matches!(store.load_schema(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_schema_versioning() {
        let db = test_db();
        let store = SchemaStore::open(&db).unwrap();

        assert_eq!(store.apply_schema(sample_schema()).unwrap(), 1);
        let extended = sample_schema().with_entity(EntityDef::new("Tag"));
        assert_eq!(store.apply_schema(extended).unwrap(), 2);

        assert_eq!(store.schema_at_version(1).unwrap().unwrap().entities.len(), 2);
        assert_eq!(store.load_schema().unwrap().entities.len(), 3);
        assert_eq!(store.list_versions().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_invalid_schema_not_applied() {
        let db = test_db();
        let store = SchemaStore::open(&db).unwrap();

        let broken = SchemaBundle::new(0).with_entity(
            EntityDef::new("Order")
                .with_relationship(RelationshipDef::to_one("customer", "Order", "Customer")),
        );
        assert!(store.apply_schema(broken).is_err());
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let config = sled::Config::new().path(dir.path());

        {
            let db = config.clone().open().unwrap();
            let store = SchemaStore::open(&db).unwrap();
            store.apply_schema(sample_schema()).unwrap();
            store.flush().unwrap();
        }

        let db = config.open().unwrap();
        let store = SchemaStore::open(&db).unwrap();
        assert_eq!(store.current_version(), 1);
        assert_eq!(store.load_schema().unwrap().entities.len(), 2);
    }

    #[test]
    fn test_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(
            &path,
            r#"{
                "entities": {
                    "Parameter": {
                        "name": "Parameter",
                        "primary_key": ["code"],
                        "attributes": [{ "name": "code", "type": "string", "required": true }],
                        "user_info": { "check_delete": "true" }
                    }
                }
            }"#,
        )
        .unwrap();

        let schema = SchemaFile::new(&path).load_schema().unwrap();
        let parameter = schema.get_entity("Parameter").unwrap();
        assert!(parameter.check_delete_required());
        assert!(schema.validate().is_ok());

        let missing = SchemaFile::new(dir.path().join("missing.json"));
        assert!(matches!(missing.load_schema(), Err(Error::Io(_))));
    }
}
