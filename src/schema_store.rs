//! SchemaStore: persists schema descriptors as one JSON document per schema
//! under a known directory (spec §4.9).

use crate::error::{Result, SchemaStoreError};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The closed set of field kinds (§3 Field, §6.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    String,
    Text,
    Number,
    Float,
    Boolean,
    Date,
    Uuid,
    Json,
    Email,
    Url,
    Slug,
    Color,
    File,
    Image,
    Coordinates,
    Currency,
    Phone,
    Enum,
    Relation,
    RelationArray,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Field {
    pub name: String,
    pub display_name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub enum_values: Vec<String>,
    #[serde(default)]
    pub relation_target: Option<String>,
    #[serde(default)]
    pub validation_rules: Vec<String>,
}

impl Field {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaStoreError::Io("field name must not be empty".into()).into());
        }
        if matches!(self.kind, FieldKind::Enum) && self.enum_values.is_empty() {
            return Err(SchemaStoreError::Io(format!(
                "field '{}' is kind enum but has no enum_values",
                self.name
            ))
            .into());
        }
        if matches!(self.kind, FieldKind::Relation | FieldKind::RelationArray) && self.relation_target.is_none() {
            return Err(SchemaStoreError::Io(format!(
                "field '{}' is a relation kind but has no relation_target",
                self.name
            ))
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum DbProvider {
    Postgres,
    Mysql,
    Sqlite,
    Mongodb,
    Supabase,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Schema {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub module_path: String,
    pub db_provider: DbProvider,
    pub fields: Vec<Field>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Schema {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SchemaStoreError::Io("schema name must not be empty".into()).into());
        }
        let mut seen = std::collections::HashSet::with_capacity(self.fields.len());
        let mut has_non_relation = false;
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.clone()) {
                return Err(SchemaStoreError::Io(format!(
                    "duplicate field name '{}' in schema '{}'",
                    field.name, self.id
                ))
                .into());
            }
            if !matches!(field.kind, FieldKind::Relation | FieldKind::RelationArray) {
                has_non_relation = true;
            }
        }
        if !has_non_relation {
            return Err(SchemaStoreError::Io(format!(
                "schema '{}' must declare at least one non-relation field",
                self.id
            ))
            .into());
        }
        Ok(())
    }
}

/// One JSON document per schema under `root`, keyed by slug id. Per-id write
/// locking; reads are unlocked since writes are atomic-rename based.
pub struct SchemaStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SchemaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|error| SchemaStoreError::Io(error.to_string()))?;
        Ok(())
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub async fn create(&self, schema: Schema) -> Result<Schema> {
        schema.validate()?;
        let lock = self.lock_for(&schema.id).await;
        let _guard = lock.lock().await;

        if self.path_for(&schema.id).exists() {
            return Err(SchemaStoreError::Conflict(schema.id).into());
        }
        self.write_atomic(&schema).await?;
        Ok(schema)
    }

    pub async fn load(&self, id: &str) -> Result<Schema> {
        let path = self.path_for(id);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| SchemaStoreError::NotFound(id.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|error| SchemaStoreError::Io(format!("corrupt schema file {id}: {error}")).into())
    }

    pub async fn list(&self) -> Result<Vec<Schema>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|error| SchemaStoreError::Io(error.to_string()))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| SchemaStoreError::Io(error.to_string()))?
        {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = tokio::fs::read_to_string(entry.path())
                .await
                .map_err(|error| SchemaStoreError::Io(error.to_string()))?;
            if let Ok(schema) = serde_json::from_str(&text) {
                out.push(schema);
            }
        }
        out.sort_by(|a: &Schema, b: &Schema| a.id.cmp(&b.id));
        Ok(out)
    }

    /// Case-insensitive substring search over name, description, and field names.
    pub async fn search(&self, query: &str) -> Result<Vec<Schema>> {
        let needle = query.to_lowercase();
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|schema| {
                schema.name.to_lowercase().contains(&needle)
                    || schema.description.to_lowercase().contains(&needle)
                    || schema.fields.iter().any(|f| f.name.to_lowercase().contains(&needle))
            })
            .collect())
    }

    pub async fn update(&self, id: &str, mut schema: Schema) -> Result<Schema> {
        schema.id = id.to_string();
        schema.validate()?;
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        schema.updated_at = chrono::Utc::now();
        self.write_atomic(&schema).await?;
        Ok(schema)
    }

    /// Idempotent: deleting a schema that doesn't exist is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(SchemaStoreError::Io(error.to_string()).into()),
        }
    }

    async fn write_atomic(&self, schema: &Schema) -> Result<()> {
        let text = serde_json::to_string_pretty(schema).map_err(crate::error::Error::from)?;
        let dir = self.root.clone();
        let final_path = self.path_for(&schema.id);
        let tmp = tempfile::Builder::new()
            .prefix(".schema-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|error| SchemaStoreError::Io(error.to_string()))?;
        tokio::fs::write(tmp.path(), text.as_bytes())
            .await
            .map_err(|error| SchemaStoreError::Io(error.to_string()))?;
        tmp.persist(&final_path)
            .map_err(|error| SchemaStoreError::Io(error.error.to_string()))?;
        Ok(())
    }
}

/// True if `id`'s path would escape `root` — defensive check, never expected
/// to trip since ids are slugs, but guards against a malformed agent payload.
pub fn is_safe_slug(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && !id.contains("..") && id != "." && Path::new(id).file_name().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema(id: &str) -> Schema {
        Schema {
            id: id.to_string(),
            name: "Post".into(),
            description: "A blog post".into(),
            module_path: "github.com/example/app".into(),
            db_provider: DbProvider::Postgres,
            fields: vec![Field {
                name: "title".into(),
                display_name: "Title".into(),
                kind: FieldKind::String,
                required: true,
                unique: false,
                enum_values: vec![],
                relation_target: None,
                validation_rules: vec![],
            }],
            created_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            updated_at: chrono::DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        store.init().await.unwrap();
        store.create(sample_schema("post")).await.unwrap();
        let loaded = store.load("post").await.unwrap();
        assert_eq!(loaded.name, "Post");
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        store.init().await.unwrap();
        store.create(sample_schema("post")).await.unwrap();
        let result = store.create(sample_schema("post")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        store.init().await.unwrap();
        store.delete("ghost").await.unwrap();
        store.delete("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn enum_field_without_values_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        store.init().await.unwrap();
        let mut schema = sample_schema("post");
        schema.fields.push(Field {
            name: "status".into(),
            display_name: "Status".into(),
            kind: FieldKind::Enum,
            required: true,
            unique: false,
            enum_values: vec![],
            relation_target: None,
            validation_rules: vec![],
        });
        assert!(store.create(schema).await.is_err());
    }

    #[tokio::test]
    async fn search_matches_field_name_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let store = SchemaStore::new(dir.path());
        store.init().await.unwrap();
        store.create(sample_schema("post")).await.unwrap();
        let results = store.search("TITLE").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn unsafe_slugs_are_rejected() {
        assert!(!is_safe_slug("../escape"));
        assert!(!is_safe_slug("a/b"));
        assert!(is_safe_slug("post"));
    }
}
