//! Typed view of OpenAPI / JSON Schema nodes
//!
//! Raw `serde_json::Value` schemas are parsed once into [`Schema`] so that the
//! synthesizer can match exhaustively instead of probing keys at every step.
//! References stay unresolved here; [`crate::Document::resolve_schema`]
//! resolves them lazily.

use std::collections::BTreeSet;

use serde_json::Value;

/// A schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Primitive(Primitive),
    Object(ObjectSchema),
    Array(Box<Schema>),
    /// `$ref` as written in the document, e.g. `#/components/schemas/Pet`
    Reference(String),
    /// `oneOf` / `anyOf` (non-null variants only)
    OneOf(Vec<Schema>),
    AllOf(Vec<Schema>),
    /// Also admits `null`: `nullable: true`, a `"null"` type array entry or a
    /// `{"type": "null"}` variant.
    Nullable(Box<Schema>),
    /// No type, format, enum or children: nothing to synthesize from.
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    fn from_format(format: &str) -> Self {
        match format {
            "int32" | "int64" => Self::Integer,
            "float" | "double" => Self::Number,
            _ => Self::String,
        }
    }

    fn from_example(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            _ => Self::String,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Scalar leaf with its constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    pub kind: PrimitiveType,
    pub format: Option<String>,
    pub enumeration: Vec<Value>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

impl Primitive {
    #[must_use]
    pub fn new(kind: PrimitiveType) -> Self {
        Self {
            kind,
            format: None,
            enumeration: Vec::new(),
            minimum: None,
            maximum: None,
            exclusive_minimum: false,
            exclusive_maximum: false,
            multiple_of: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    fn from_value(kind: PrimitiveType, schema: &Value) -> Self {
        let mut p = Self::new(kind);
        p.format = str_field(schema, "format");
        p.enumeration = schema
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        p.minimum = schema.get("minimum").and_then(Value::as_f64);
        p.maximum = schema.get("maximum").and_then(Value::as_f64);
        // OpenAPI 3.0 uses boolean flags, 3.1 (JSON Schema 2020-12) numeric bounds
        match schema.get("exclusiveMinimum") {
            Some(Value::Bool(b)) => p.exclusive_minimum = *b,
            Some(Value::Number(n)) => {
                p.minimum = n.as_f64();
                p.exclusive_minimum = true;
            }
            _ => {}
        }
        match schema.get("exclusiveMaximum") {
            Some(Value::Bool(b)) => p.exclusive_maximum = *b,
            Some(Value::Number(n)) => {
                p.maximum = n.as_f64();
                p.exclusive_maximum = true;
            }
            _ => {}
        }
        p.multiple_of = schema
            .get("multipleOf")
            .and_then(Value::as_f64)
            .filter(|m| *m > 0.0);
        p.min_length = usize_field(schema, "minLength");
        p.max_length = usize_field(schema, "maxLength");
        p.pattern = str_field(schema, "pattern");
        p
    }
}

/// Object node: properties keep declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    pub properties: Vec<(String, Schema)>,
    pub required: BTreeSet<String>,
}

impl ObjectSchema {
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }
}

impl Schema {
    /// Parse a raw schema node. Never fails: shapes that cannot be
    /// synthesized become [`Schema::Opaque`] and are rejected at synthesis time.
    #[must_use]
    pub fn from_value(schema: &Value) -> Self {
        let parsed = Self::parse(schema);
        if admits_null(schema) {
            Self::Nullable(Box::new(parsed))
        } else {
            parsed
        }
    }

    fn parse(schema: &Value) -> Self {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            return Self::Reference(reference.to_string());
        }

        for key in ["oneOf", "anyOf"] {
            if let Some(variants) = schema.get(key).and_then(Value::as_array) {
                return Self::OneOf(
                    variants
                        .iter()
                        .filter(|v| !is_null_type(v))
                        .map(Self::from_value)
                        .collect(),
                );
            }
        }

        if let Some(parts) = schema.get("allOf").and_then(Value::as_array) {
            return Self::AllOf(parts.iter().map(Self::from_value).collect());
        }

        match declared_type(schema).as_deref() {
            Some("object") => Self::Object(object_from_value(schema)),
            Some("array") => Self::Array(Box::new(items_from_value(schema))),
            other => match other.and_then(PrimitiveType::from_name) {
                Some(kind) => Self::Primitive(Primitive::from_value(kind, schema)),
                None => infer_untyped(schema),
            },
        }
    }

    /// Object, array and reference bodies are eligible for data dictionaries.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        match self {
            Self::Object(_) | Self::Array(_) | Self::Reference(_) => true,
            Self::Nullable(inner) => inner.is_structured(),
            _ => false,
        }
    }

    /// Nothing to synthesize from, `null` aside.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Opaque => true,
            Self::Nullable(inner) => inner.is_opaque(),
            _ => false,
        }
    }

    /// Short label for log lines and error messages.
    #[must_use]
    pub fn type_label(&self) -> String {
        match self {
            Self::Primitive(p) => match &p.format {
                Some(format) => format!("{} ({format})", p.kind.as_str()),
                None => p.kind.as_str().to_string(),
            },
            Self::Object(_) => "object".into(),
            Self::Array(_) => "array".into(),
            Self::Reference(r) => format!("ref {r}"),
            Self::OneOf(_) => "oneOf".into(),
            Self::AllOf(_) => "allOf".into(),
            Self::Nullable(inner) => format!("{} or null", inner.type_label()),
            Self::Opaque => "untyped".into(),
        }
    }
}

fn is_null_type(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

/// OpenAPI 3.0 `nullable`, a 3.1 type array with `"null"`, or a null
/// `oneOf`/`anyOf` variant.
fn admits_null(schema: &Value) -> bool {
    if schema.get("nullable").and_then(Value::as_bool) == Some(true) {
        return true;
    }
    if let Some(Value::Array(types)) = schema.get("type") {
        if types.iter().any(|t| t.as_str() == Some("null")) {
            return true;
        }
    }
    ["oneOf", "anyOf"].iter().any(|key| {
        schema
            .get(*key)
            .and_then(Value::as_array)
            .is_some_and(|variants| variants.iter().any(is_null_type))
    })
}

/// `type` as a string, or the first non-null entry of a 3.1 type array.
fn declared_type(schema: &Value) -> Option<String> {
    match schema.get("type")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(String::from),
        _ => None,
    }
}

fn infer_untyped(schema: &Value) -> Schema {
    if schema.get("properties").is_some() {
        return Schema::Object(object_from_value(schema));
    }
    if schema.get("items").is_some() {
        return Schema::Array(Box::new(items_from_value(schema)));
    }
    if let Some(first) = schema
        .get("enum")
        .and_then(Value::as_array)
        .and_then(|values| values.first())
    {
        return Schema::Primitive(Primitive::from_value(
            PrimitiveType::from_example(first),
            schema,
        ));
    }
    if let Some(format) = schema.get("format").and_then(Value::as_str) {
        return Schema::Primitive(Primitive::from_value(
            PrimitiveType::from_format(format),
            schema,
        ));
    }
    Schema::Opaque
}

fn object_from_value(schema: &Value) -> ObjectSchema {
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| (name.clone(), Schema::from_value(prop)))
                .collect()
        })
        .unwrap_or_default();
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    ObjectSchema {
        properties,
        required,
    }
}

fn items_from_value(schema: &Value) -> Schema {
    schema
        .get("items")
        .map(Schema::from_value)
        .unwrap_or_else(|| Schema::Primitive(Primitive::new(PrimitiveType::String)))
}

fn str_field(schema: &Value, key: &str) -> Option<String> {
    schema.get(key).and_then(Value::as_str).map(String::from)
}

fn usize_field(schema: &Value, key: &str) -> Option<usize> {
    schema
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primitive(schema: &Schema) -> &Primitive {
        match schema {
            Schema::Primitive(p) => p,
            other => panic!("expected primitive, got {other:?}"),
        }
    }

    #[test]
    fn parses_reference_before_anything_else() {
        let s = Schema::from_value(&json!({"$ref": "#/components/schemas/Pet", "type": "object"}));
        assert_eq!(s, Schema::Reference("#/components/schemas/Pet".into()));
    }

    #[test]
    fn parses_string_constraints() {
        let s = Schema::from_value(&json!({
            "type": "string", "format": "uuid", "minLength": 3, "maxLength": 8, "pattern": "^a+$"
        }));
        let p = primitive(&s);
        assert_eq!(p.kind, PrimitiveType::String);
        assert_eq!(p.format.as_deref(), Some("uuid"));
        assert_eq!(p.min_length, Some(3));
        assert_eq!(p.max_length, Some(8));
        assert_eq!(p.pattern.as_deref(), Some("^a+$"));
    }

    #[test]
    fn exclusive_bounds_openapi_30_flags() {
        let s = Schema::from_value(&json!({
            "type": "integer", "minimum": 1, "exclusiveMinimum": true, "maximum": 9
        }));
        let p = primitive(&s);
        assert_eq!(p.minimum, Some(1.0));
        assert!(p.exclusive_minimum);
        assert!(!p.exclusive_maximum);
    }

    #[test]
    fn exclusive_bounds_openapi_31_numbers() {
        let s = Schema::from_value(&json!({"type": "number", "exclusiveMaximum": 5.5}));
        let p = primitive(&s);
        assert_eq!(p.maximum, Some(5.5));
        assert!(p.exclusive_maximum);
    }

    #[test]
    fn object_keeps_declaration_order_and_required_set() {
        let s = Schema::from_value(&json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "id": {"type": "integer"}
            }
        }));
        let Schema::Object(obj) = s else {
            panic!("expected object");
        };
        let names: Vec<_> = obj.properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["name", "age", "id"]);
        assert!(obj.is_required("name"));
        assert!(!obj.is_required("age"));
        assert!(obj.property("id").is_some());
    }

    #[test]
    fn array_without_items_defaults_to_strings() {
        let s = Schema::from_value(&json!({"type": "array"}));
        assert_eq!(
            s,
            Schema::Array(Box::new(Schema::Primitive(Primitive::new(
                PrimitiveType::String
            ))))
        );
    }

    fn non_null(schema: Schema) -> Schema {
        match schema {
            Schema::Nullable(inner) => *inner,
            other => panic!("expected nullable, got {other:?}"),
        }
    }

    #[test]
    fn any_of_null_variant_marks_nullable() {
        let s = non_null(Schema::from_value(&json!({"anyOf": [{"type": "string"}, {"type": "null"}]})));
        let Schema::OneOf(variants) = s else {
            panic!("expected oneOf");
        };
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn type_array_with_null_marks_nullable() {
        let s = non_null(Schema::from_value(&json!({"type": ["null", "integer"]})));
        assert_eq!(primitive(&s).kind, PrimitiveType::Integer);
    }

    #[test]
    fn nullable_flag_marks_nullable() {
        let s = Schema::from_value(&json!({"type": "string", "nullable": true}));
        assert_eq!(s.type_label(), "string or null");
        assert_eq!(primitive(&non_null(s)).kind, PrimitiveType::String);

        let plain = Schema::from_value(&json!({"type": "string", "nullable": false}));
        assert!(matches!(plain, Schema::Primitive(_)));
    }

    #[test]
    fn nullable_reference_stays_structured() {
        let s = Schema::from_value(&json!({"$ref": "#/components/schemas/Pet", "nullable": true}));
        assert!(s.is_structured());
        assert!(!s.is_opaque());
        assert!(Schema::from_value(&json!({"nullable": true})).is_opaque());
    }

    #[test]
    fn untyped_shapes_are_inferred() {
        assert!(matches!(
            Schema::from_value(&json!({"properties": {"a": {"type": "string"}}})),
            Schema::Object(_)
        ));
        assert!(matches!(
            Schema::from_value(&json!({"items": {"type": "string"}})),
            Schema::Array(_)
        ));
        let from_enum = Schema::from_value(&json!({"enum": [1, 2, 3]}));
        assert_eq!(primitive(&from_enum).kind, PrimitiveType::Integer);
        let from_format = Schema::from_value(&json!({"format": "double"}));
        assert_eq!(primitive(&from_format).kind, PrimitiveType::Number);
    }

    #[test]
    fn nothing_recognizable_is_opaque() {
        assert_eq!(Schema::from_value(&json!({})), Schema::Opaque);
        assert_eq!(
            Schema::from_value(&json!({"type": "file", "description": "?"})),
            Schema::Opaque
        );
    }

    #[test]
    fn structured_schemas() {
        assert!(Schema::Reference("#/definitions/Pet".into()).is_structured());
        assert!(Schema::from_value(&json!({"type": "array"})).is_structured());
        assert!(!Schema::from_value(&json!({"type": "string"})).is_structured());
    }
}
