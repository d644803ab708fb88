//! Generator: renders a schema into a project tree under an output root
//! (spec §4.8). Deterministic — no timestamps embedded, no writes outside
//! `output_root`.

pub mod fields;
pub mod templates;

use crate::error::{GeneratorError, Result};
use crate::schema_store::Schema;

use serde::Serialize;
use std::path::{Path, PathBuf};

/// One entry in the Generator's output manifest.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub path: String,
    pub size: u64,
    pub kind: ManifestKind,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestKind {
    Source,
    Manifest,
    Directory,
}

/// The fixed directory skeleton every generated project gets (§4.8 step 1).
const SKELETON_DIRS: &[&str] = &[
    "cmd/server",
    "internal/handlers",
    "internal/services",
    "internal/repositories",
    "internal/models",
    "internal/middleware",
    "pkg/database",
    "pkg/config",
    "pkg/utils",
    "deployment",
    "tests",
    "docs",
];

#[derive(Serialize)]
struct SchemaContext {
    name: String,
    description: String,
    module_snake: String,
    table_name: String,
    db_provider: String,
}

fn schema_context(schema: &Schema) -> SchemaContext {
    let module_snake = to_snake_case(&schema.name);
    SchemaContext {
        name: schema.name.clone(),
        description: schema.description.clone(),
        table_name: format!("{module_snake}s"),
        module_snake,
        db_provider: serde_json::to_value(&schema.db_provider)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "postgres".to_string()),
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else if ch == ' ' || ch == '-' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

/// The component kinds the CLI's `generate` subcommand can target (§6.4).
/// `Resource` renders a whole schema's project slice (the same output as
/// [`Generator::generate`]); the rest re-render one artifact into an
/// existing project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum ComponentKind {
    Api,
    Resource,
    Middleware,
    Test,
    Deployment,
    Plugin,
}

/// Renders schemas into on-disk project trees.
pub struct Generator {
    env: minijinja::Environment<'static>,
}

impl Generator {
    pub fn new() -> Result<Self> {
        Ok(Self {
            env: templates::environment()?,
        })
    }

    /// Render `schema` into a fresh project tree under `output_root`.
    /// `output_root` must not already contain a project — callers that want
    /// idempotent regeneration should remove it first.
    pub async fn generate(
        &self,
        schema: &Schema,
        project_name: &str,
        output_root: &Path,
    ) -> Result<Vec<ManifestEntry>> {
        let mut manifest = Vec::new();

        for dir in SKELETON_DIRS {
            let full = output_root.join(dir);
            tokio::fs::create_dir_all(&full)
                .await
                .map_err(|error| GeneratorError::Io(error.to_string()))?;
            manifest.push(ManifestEntry {
                path: dir.to_string(),
                size: 0,
                kind: ManifestKind::Directory,
                language: String::new(),
            });
        }

        let field_models: Vec<fields::FieldModel> = schema.fields.iter().map(fields::derive).collect();
        let ctx = schema_context(schema);
        let module_snake = ctx.module_snake.clone();

        let context = minijinja::context! {
            schema => ctx,
            fields => field_models,
            project_name => project_name,
        };

        let targets: &[(&str, &str)] = &[
            ("model.rs.jinja", "internal/models"),
            ("repository.rs.jinja", "internal/repositories"),
            ("handler.rs.jinja", "internal/handlers"),
            ("service.rs.jinja", "internal/services"),
        ];

        for (template_name, subdir) in targets {
            let rendered = templates::render(&self.env, template_name, context.clone())?;
            let rel_path = format!("{subdir}/{module_snake}.rs");
            self.write_file(output_root, &rel_path, &rendered, &mut manifest)
                .await?;
        }

        let middleware_context = minijinja::context! { project_name => project_name };
        let middleware_rendered = templates::render(&self.env, "middleware.rs.jinja", middleware_context)?;
        self.write_file(output_root, "internal/middleware/logging.rs", &middleware_rendered, &mut manifest)
            .await?;

        let main_context = minijinja::context! { project_name => project_name };
        let main_rendered = templates::render(&self.env, "main.rs.jinja", main_context)?;
        self.write_file(output_root, "cmd/server/main.rs", &main_rendered, &mut manifest)
            .await?;

        let dependencies = dependencies_for(schema);
        let manifest_context = minijinja::context! {
            project_name => project_name,
            dependencies => dependencies,
        };
        let manifest_rendered = templates::render(&self.env, "Cargo.toml.jinja", manifest_context)?;
        self.write_file(output_root, "Cargo.toml", &manifest_rendered, &mut manifest)
            .await?;

        manifest.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(manifest)
    }

    /// Render one artifact into an already-generated project tree. `schema`
    /// is required for `Api`/`Resource`/`Test`, ignored otherwise.
    pub async fn generate_component(
        &self,
        kind: ComponentKind,
        schema: Option<&Schema>,
        project_name: &str,
        output_root: &Path,
    ) -> Result<Vec<ManifestEntry>> {
        if kind == ComponentKind::Resource {
            let schema = schema.ok_or_else(|| GeneratorError::InvalidSchema("resource generation requires a schema".into()))?;
            return self.generate(schema, project_name, output_root).await;
        }

        let mut manifest = Vec::new();
        match kind {
            ComponentKind::Api => {
                let schema = schema.ok_or_else(|| GeneratorError::InvalidSchema("api generation requires a schema".into()))?;
                let ctx = schema_context(schema);
                let module_snake = ctx.module_snake.clone();
                let context = minijinja::context! {
                    schema => ctx,
                    fields => schema.fields.iter().map(fields::derive).collect::<Vec<_>>(),
                    project_name => project_name,
                };
                let rendered = templates::render(&self.env, "handler.rs.jinja", context)?;
                let rel_path = format!("internal/handlers/{module_snake}.rs");
                self.write_file(output_root, &rel_path, &rendered, &mut manifest).await?;
            }
            ComponentKind::Middleware => {
                let context = minijinja::context! { project_name => project_name };
                let rendered = templates::render(&self.env, "middleware.rs.jinja", context)?;
                self.write_file(output_root, "internal/middleware/logging.rs", &rendered, &mut manifest).await?;
            }
            ComponentKind::Test => {
                let schema = schema.ok_or_else(|| GeneratorError::InvalidSchema("test generation requires a schema".into()))?;
                let ctx = schema_context(schema);
                let module_snake = ctx.module_snake.clone();
                let context = minijinja::context! { schema => ctx, project_name => project_name };
                let rendered = templates::render(&self.env, "test.rs.jinja", context)?;
                let rel_path = format!("tests/{module_snake}_test.rs");
                self.write_file(output_root, &rel_path, &rendered, &mut manifest).await?;
            }
            ComponentKind::Deployment => {
                let context = minijinja::context! { project_name => project_name };
                let rendered = templates::render(&self.env, "Dockerfile.jinja", context)?;
                self.write_file(output_root, "deployment/Dockerfile", &rendered, &mut manifest).await?;
            }
            ComponentKind::Plugin => {
                let context = minijinja::context! { project_name => project_name };
                let rendered = templates::render(&self.env, "plugin.rs.jinja", context)?;
                self.write_file(output_root, "pkg/utils/plugin.rs", &rendered, &mut manifest).await?;
            }
            ComponentKind::Resource => unreachable!("handled above"),
        }

        manifest.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(manifest)
    }

    async fn write_file(
        &self,
        output_root: &Path,
        rel_path: &str,
        contents: &str,
        manifest: &mut Vec<ManifestEntry>,
    ) -> Result<()> {
        let full = output_root.join(rel_path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| GeneratorError::Io(error.to_string()))?;
        }
        tokio::fs::write(&full, contents.as_bytes())
            .await
            .map_err(|error| GeneratorError::Io(error.to_string()))?;

        manifest.push(ManifestEntry {
            path: rel_path.to_string(),
            size: contents.len() as u64,
            kind: if rel_path.ends_with(".toml") {
                ManifestKind::Manifest
            } else {
                ManifestKind::Source
            },
            language: language_for(rel_path),
        });
        Ok(())
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new().expect("embedded templates must parse")
    }
}

fn language_for(rel_path: &str) -> String {
    if rel_path.ends_with(".rs") {
        "rust".to_string()
    } else if rel_path.ends_with(".toml") {
        "toml".to_string()
    } else {
        "text".to_string()
    }
}

/// Dependency lines for the generated `Cargo.toml`: the DB provider's driver
/// plus one line per distinct crate any field's derived `imports` needs
/// (§6.6) that isn't already in the template's base dependency table.
fn dependencies_for(schema: &Schema) -> Vec<String> {
    use crate::schema_store::DbProvider;
    let mut deps = match &schema.db_provider {
        DbProvider::Postgres => vec!["sqlx = { version = \"0.7\", features = [\"postgres\", \"runtime-tokio\"] }".to_string()],
        DbProvider::Mysql => vec!["sqlx = { version = \"0.7\", features = [\"mysql\", \"runtime-tokio\"] }".to_string()],
        DbProvider::Sqlite => vec!["sqlx = { version = \"0.7\", features = [\"sqlite\", \"runtime-tokio\"] }".to_string()],
        DbProvider::Mongodb => vec!["mongodb = \"2\"".to_string()],
        DbProvider::Supabase => vec!["postgrest = \"1\"".to_string()],
    };

    let mut field_imports: Vec<String> = schema.fields.iter().flat_map(|f| fields::derive(f).imports).collect();
    field_imports.sort();
    field_imports.dedup();
    deps.extend(field_imports.iter().filter_map(|token| dependency_line_for(token)));

    deps
}

/// Maps a `FieldModel.imports` token to its `Cargo.toml` dependency line.
/// `chrono`, `uuid`, and `serde_json` are already in the template's base
/// dependency table, so they're left out here to avoid a duplicate key.
fn dependency_line_for(token: &str) -> Option<String> {
    match token {
        "regex" => Some("regex = \"1\"".to_string()),
        "rust_decimal" => Some("rust_decimal = { version = \"1\", features = [\"serde-float\"] }".to_string()),
        "url" => Some("url = { version = \"2\", features = [\"serde\"] }".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_store::{DbProvider, Field, FieldKind};

    fn sample_schema() -> Schema {
        Schema {
            id: "post".into(),
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
    async fn generate_writes_expected_files_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new().unwrap();
        let manifest = generator
            .generate(&sample_schema(), "blog_api", dir.path())
            .await
            .unwrap();

        assert!(manifest.iter().any(|e| e.path == "Cargo.toml"));
        assert!(manifest.iter().any(|e| e.path == "internal/models/post.rs"));
        assert!(dir.path().join("internal/models/post.rs").exists());
        assert!(dir.path().join("cmd/server/main.rs").exists());
    }

    #[tokio::test]
    async fn generation_is_deterministic() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let generator = Generator::new().unwrap();
        generator.generate(&sample_schema(), "blog_api", dir_a.path()).await.unwrap();
        generator.generate(&sample_schema(), "blog_api", dir_b.path()).await.unwrap();

        let a = std::fs::read_to_string(dir_a.path().join("internal/models/post.rs")).unwrap();
        let b = std::fs::read_to_string(dir_b.path().join("internal/models/post.rs")).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn generate_component_deployment_needs_no_schema() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new().unwrap();
        let manifest = generator
            .generate_component(ComponentKind::Deployment, None, "blog_api", dir.path())
            .await
            .unwrap();
        assert!(manifest.iter().any(|e| e.path == "deployment/Dockerfile"));
        assert!(dir.path().join("deployment/Dockerfile").exists());
    }

    #[tokio::test]
    async fn generate_component_test_requires_a_schema() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Generator::new().unwrap();
        let result = generator.generate_component(ComponentKind::Test, None, "blog_api", dir.path()).await;
        assert!(result.is_err());
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(to_snake_case("My Schema"), "my_schema");
    }
}
