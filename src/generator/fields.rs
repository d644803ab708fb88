//! Per-field derivation: native type, validation rules, and imports for each
//! `FieldKind` (spec §6.6).

use crate::schema_store::{Field, FieldKind};

/// Everything a template needs to render one field of a generated model.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldModel {
    pub name: String,
    pub display_name: String,
    pub kind: String,
    pub native_type: String,
    pub required: bool,
    pub unique: bool,
    pub validations: Vec<String>,
    pub imports: Vec<String>,
    pub enum_values: Vec<String>,
    pub relation_target: Option<String>,
}

/// Derive the native type, default validation rules, and import set for one
/// field, per the §6.6 mapping table.
pub fn derive(field: &Field) -> FieldModel {
    let (native_type, mut validations, mut imports) = match field.kind {
        FieldKind::String => ("String".to_string(), vec!["length".to_string()], vec![]),
        FieldKind::Text => ("String".to_string(), vec![], vec![]),
        FieldKind::Number => ("i64".to_string(), vec!["min".to_string(), "max".to_string()], vec![]),
        FieldKind::Float => (
            "f64".to_string(),
            vec!["min".to_string(), "max".to_string(), "precision".to_string()],
            vec![],
        ),
        FieldKind::Boolean => ("bool".to_string(), vec![], vec![]),
        FieldKind::Date => ("chrono::DateTime<chrono::Utc>".to_string(), vec![], vec!["chrono".to_string()]),
        FieldKind::Uuid => ("uuid::Uuid".to_string(), vec!["format".to_string()], vec!["uuid".to_string()]),
        FieldKind::Json => (
            "serde_json::Value".to_string(),
            vec!["valid-json".to_string()],
            vec!["serde_json".to_string()],
        ),
        FieldKind::Email => ("String".to_string(), vec!["rfc5322".to_string()], vec!["regex".to_string()]),
        FieldKind::Url => (
            "String".to_string(),
            vec!["http-or-https-scheme".to_string()],
            vec!["url".to_string()],
        ),
        FieldKind::Slug => ("String".to_string(), vec!["lowercase-kebab".to_string()], vec!["regex".to_string()]),
        FieldKind::Color => (
            "String".to_string(),
            vec!["hex-color".to_string()],
            vec!["regex".to_string()],
        ),
        FieldKind::File | FieldKind::Image => ("String".to_string(), vec![], vec![]),
        FieldKind::Phone => ("String".to_string(), vec!["e164".to_string()], vec!["regex".to_string()]),
        FieldKind::Currency => (
            "rust_decimal::Decimal".to_string(),
            vec!["non-negative".to_string(), "two-decimal-places".to_string()],
            vec!["rust_decimal".to_string()],
        ),
        FieldKind::Coordinates => (
            "(f64, f64)".to_string(),
            vec!["lat-in--90..90".to_string(), "lon-in--180..180".to_string()],
            vec![],
        ),
        FieldKind::Enum => ("String".to_string(), vec!["value-in-enum-values".to_string()], vec![]),
        FieldKind::Relation => ("String".to_string(), vec!["target-exists".to_string()], vec![]),
        FieldKind::RelationArray => ("Vec<String>".to_string(), vec![], vec![]),
    };

    if field.required {
        validations.push("required".to_string());
    }
    if field.unique {
        validations.push("unique".to_string());
    }
    validations.extend(field.validation_rules.iter().cloned());
    imports.sort();
    imports.dedup();

    FieldModel {
        name: field.name.clone(),
        display_name: field.display_name.clone(),
        kind: field.kind.as_str_for_templates().to_string(),
        native_type,
        required: field.required,
        unique: field.unique,
        validations,
        imports,
        enum_values: field.enum_values.clone(),
        relation_target: field.relation_target.clone(),
    }
}

impl FieldKind {
    fn as_str_for_templates(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Uuid => "uuid",
            FieldKind::Json => "json",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::Slug => "slug",
            FieldKind::Color => "color",
            FieldKind::File => "file",
            FieldKind::Image => "image",
            FieldKind::Coordinates => "coordinates",
            FieldKind::Currency => "currency",
            FieldKind::Phone => "phone",
            FieldKind::Enum => "enum",
            FieldKind::Relation => "relation",
            FieldKind::RelationArray => "relation-array",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(kind: FieldKind) -> Field {
        Field {
            name: "f".into(),
            display_name: "F".into(),
            kind,
            required: false,
            unique: false,
            enum_values: vec![],
            relation_target: None,
            validation_rules: vec![],
        }
    }

    #[test]
    fn email_field_gets_regex_import_and_rfc5322_rule() {
        let model = derive(&field(FieldKind::Email));
        assert_eq!(model.native_type, "String");
        assert!(model.validations.contains(&"rfc5322".to_string()));
        assert!(model.imports.contains(&"regex".to_string()));
    }

    #[test]
    fn coordinates_field_has_lat_lon_bounds() {
        let model = derive(&field(FieldKind::Coordinates));
        assert_eq!(model.validations.len(), 2);
    }

    #[test]
    fn required_and_unique_flags_append_validations() {
        let mut f = field(FieldKind::String);
        f.required = true;
        f.unique = true;
        let model = derive(&f);
        assert!(model.validations.contains(&"required".to_string()));
        assert!(model.validations.contains(&"unique".to_string()));
    }
}
