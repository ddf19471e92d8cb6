//! OpenAPI document facade: paths, operations, parameters, bodies, responses
//!
//! Accepts OpenAPI 3.x and Swagger 2.0. Component references for parameters,
//! request bodies, responses and headers are followed at load time. Schema
//! references stay lazy: they are resolved through [`Document::resolve_schema`]
//! while a schema is being walked, so cyclic definitions load fine.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::{Primitive, PrimitiveType, Schema};

/// Maximum length of a `$ref` chain between non-schema components.
const MAX_REF_HOPS: u32 = 20;

/// Response key used when no status-specific response is declared.
pub const DEFAULT_RESPONSE: &str = "default";

/// HTTP methods an OpenAPI path item can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [Self; 8] = [
        Self::Get,
        Self::Put,
        Self::Post,
        Self::Delete,
        Self::Options,
        Self::Head,
        Self::Patch,
        Self::Trace,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Patch => "PATCH",
            Self::Trace => "TRACE",
        }
    }

    /// Key of the operation inside a path item.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Put => "put",
            Self::Post => "post",
            Self::Delete => "delete",
            Self::Options => "options",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Trace => "trace",
        }
    }

    /// Case-insensitive lookup by method name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    /// Always `true` for path parameters.
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub struct RequestBody {
    /// First declared media type
    pub content_type: Option<String>,
    pub schema: Option<Schema>,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct HeaderDefinition {
    pub name: String,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, Default)]
pub struct ResponseDefinition {
    pub headers: Vec<HeaderDefinition>,
    /// First declared media type (OpenAPI 3 only; Swagger 2 uses `produces`)
    pub content_type: Option<String>,
    pub schema: Option<Schema>,
}

impl ResponseDefinition {
    /// Header declarations marked as required, in declaration order.
    pub fn required_headers(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.headers
            .iter()
            .filter(|h| h.required)
            .map(|h| (h.name.as_str(), &h.schema))
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub operation_id: Option<String>,
    /// Path-level parameters merged with operation-level ones (operation wins).
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    /// Response key (status code or `default`) → definition, declaration order
    pub responses: Vec<(String, ResponseDefinition)>,
    /// Swagger 2 `produces` declared on the operation
    pub produces: Vec<String>,
}

impl Operation {
    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    #[must_use]
    pub fn request_body_schema(&self) -> Option<&Schema> {
        self.request_body.as_ref().and_then(|b| b.schema.as_ref())
    }

    #[must_use]
    pub fn request_content_type(&self) -> Option<&str> {
        self.request_body
            .as_ref()
            .and_then(|b| b.content_type.as_deref())
    }

    /// Exact match on `key`, falling back to the `default` response.
    #[must_use]
    pub fn response_by_key(&self, key: &str) -> Option<&ResponseDefinition> {
        self.response(key).or_else(|| self.response(DEFAULT_RESPONSE))
    }

    fn response(&self, key: &str) -> Option<&ResponseDefinition> {
        self.responses
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, r)| r)
    }
}

#[derive(Debug, Clone)]
pub struct PathItem {
    pub path: String,
    operations: Vec<(HttpMethod, Operation)>,
}

impl PathItem {
    /// Operations in method order (GET, PUT, POST, DELETE, OPTIONS, HEAD, PATCH, TRACE).
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        self.operations.iter().map(|(m, op)| (*m, op))
    }

    #[must_use]
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|(m, _)| *m == method)
            .map(|(_, op)| op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecVersion {
    Swagger2,
    OpenApi3,
}

/// A loaded, immutable OpenAPI document.
#[derive(Debug, Clone)]
pub struct Document {
    version: SpecVersion,
    paths: Vec<PathItem>,
    definitions: HashMap<String, Schema>,
    /// Swagger 2 document-level `produces`
    produces: Vec<String>,
}

impl Document {
    /// Load a document from a JSON or YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if a component
    /// reference outside `schemas` does not resolve.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(path.to_path_buf(), e.to_string()))?;
        let raw = parse_spec(path, &content)?;
        Self::from_value(&raw)
    }

    /// Parse JSON or YAML text (leading `{` → JSON, otherwise YAML).
    ///
    /// # Errors
    ///
    /// See [`Document::load`].
    pub fn parse(content: &str) -> Result<Self, SchemaError> {
        Self::from_value(&parse_content(content)?)
    }

    /// Build the document model from an already-parsed tree.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnresolvedReference`] when a parameter, request
    /// body, response or header `$ref` points nowhere.
    pub fn from_value(raw: &Value) -> Result<Self, SchemaError> {
        let version = if raw.get("swagger").is_some() {
            SpecVersion::Swagger2
        } else {
            SpecVersion::OpenApi3
        };

        let definitions_node = match version {
            SpecVersion::Swagger2 => raw.get("definitions"),
            SpecVersion::OpenApi3 => raw.pointer("/components/schemas"),
        };
        let definitions = definitions_node
            .and_then(Value::as_object)
            .map(|defs| {
                defs.iter()
                    .map(|(name, schema)| (name.clone(), Schema::from_value(schema)))
                    .collect()
            })
            .unwrap_or_default();

        let loader = Loader {
            raw,
            version,
            consumes: string_list(raw.get("consumes")),
        };

        let mut paths = Vec::new();
        for (path, item) in raw.get("paths").and_then(Value::as_object).into_iter().flatten() {
            let item = loader.follow(item)?;
            paths.push(loader.path_item(path, item)?);
        }

        let definition_count = definitions_node.and_then(Value::as_object).map_or(0, |d| d.len());
        tracing::debug!(
            paths = paths.len(),
            definitions = definition_count,
            "loaded OpenAPI document"
        );

        Ok(Self {
            version,
            paths,
            definitions,
            produces: string_list(raw.get("produces")),
        })
    }

    #[must_use]
    pub const fn version(&self) -> SpecVersion {
        self.version
    }

    /// All path items in declaration order. Restartable.
    pub fn path_items(&self) -> impl Iterator<Item = &PathItem> {
        self.paths.iter()
    }

    /// Resolve a schema reference (`#/components/schemas/X`, `#/definitions/X`
    /// or a bare definition name).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnresolvedReference`] if no such definition exists.
    pub fn resolve_schema(&self, reference: &str) -> Result<&Schema, SchemaError> {
        let name = reference
            .strip_prefix("#/components/schemas/")
            .or_else(|| reference.strip_prefix("#/definitions/"))
            .unwrap_or(reference);
        self.definitions
            .get(name)
            .ok_or_else(|| SchemaError::UnresolvedReference(reference.to_string()))
    }

    /// Operation-wide response media type: the first one any response of the
    /// operation declares (OpenAPI 3), or `produces` (Swagger 2).
    #[must_use]
    pub fn response_content_type<'a>(&'a self, operation: &'a Operation) -> Option<&'a str> {
        match self.version {
            SpecVersion::Swagger2 => operation
                .produces
                .first()
                .or_else(|| self.produces.first())
                .map(String::as_str),
            SpecVersion::OpenApi3 => operation
                .responses
                .iter()
                .find_map(|(_, r)| r.content_type.as_deref()),
        }
    }
}

/// Builds the typed model from the raw tree.
struct Loader<'a> {
    raw: &'a Value,
    version: SpecVersion,
    /// Swagger 2 document-level `consumes`
    consumes: Vec<String>,
}

impl<'a> Loader<'a> {
    /// Follow local `$ref` chains for non-schema components.
    fn follow(&self, node: &'a Value) -> Result<&'a Value, SchemaError> {
        let mut current = node;
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Ok(current);
            };
            current = reference
                .strip_prefix('#')
                .and_then(|pointer| self.raw.pointer(pointer))
                .ok_or_else(|| SchemaError::UnresolvedReference(reference.to_string()))?;
        }
        Err(SchemaError::unsupported(
            "$ref",
            format!("reference chain longer than {MAX_REF_HOPS} hops"),
        ))
    }

    fn path_item(&self, path: &str, item: &'a Value) -> Result<PathItem, SchemaError> {
        let mut operations = Vec::new();
        for method in HttpMethod::ALL {
            let Some(op) = item.get(method.key()) else {
                continue;
            };
            operations.push((method, self.operation(item, op)?));
        }
        Ok(PathItem {
            path: path.to_string(),
            operations,
        })
    }

    fn operation(&self, item: &'a Value, op: &'a Value) -> Result<Operation, SchemaError> {
        let mut parameters = Vec::new();
        let mut request_body = None;
        self.collect_parameters(item.get("parameters"), op, &mut parameters, &mut request_body)?;
        self.collect_parameters(op.get("parameters"), op, &mut parameters, &mut request_body)?;

        if self.version == SpecVersion::OpenApi3 {
            request_body = self.request_body(op)?;
        }

        let mut responses = Vec::new();
        for (key, node) in op.get("responses").and_then(Value::as_object).into_iter().flatten() {
            let node = self.follow(node)?;
            responses.push((key.clone(), self.response(node)?));
        }

        Ok(Operation {
            operation_id: op
                .get("operationId")
                .and_then(Value::as_str)
                .map(String::from),
            parameters,
            request_body,
            responses,
            produces: string_list(op.get("produces")),
        })
    }

    fn collect_parameters(
        &self,
        list: Option<&'a Value>,
        op: &'a Value,
        parameters: &mut Vec<Parameter>,
        request_body: &mut Option<RequestBody>,
    ) -> Result<(), SchemaError> {
        for raw in list.and_then(Value::as_array).into_iter().flatten() {
            let raw = self.follow(raw)?;
            if raw.get("in").and_then(Value::as_str) == Some("body") {
                *request_body = Some(self.body_parameter(raw, op));
                continue;
            }
            let Some(param) = self.parameter(raw) else {
                continue;
            };
            match parameters
                .iter_mut()
                .find(|p| p.name == param.name && p.location == param.location)
            {
                Some(existing) => *existing = param,
                None => parameters.push(param),
            }
        }
        Ok(())
    }

    fn parameter(&self, raw: &Value) -> Option<Parameter> {
        let name = raw.get("name")?.as_str()?.to_string();
        let location = ParamLocation::from_name(raw.get("in")?.as_str()?)?;
        let required = location == ParamLocation::Path
            || raw.get("required").and_then(Value::as_bool).unwrap_or(false);
        let schema = match self.version {
            // Swagger 2 puts type/format/enum on the parameter itself
            SpecVersion::Swagger2 => or_string(Schema::from_value(raw)),
            SpecVersion::OpenApi3 => raw
                .get("schema")
                .or_else(|| first_media(raw.get("content")).and_then(|(_, m)| m.get("schema")))
                .map_or_else(string_schema, Schema::from_value),
        };
        Some(Parameter {
            name,
            location,
            required,
            schema,
        })
    }

    fn body_parameter(&self, raw: &Value, op: &Value) -> RequestBody {
        RequestBody {
            content_type: string_list(op.get("consumes"))
                .into_iter()
                .next()
                .or_else(|| self.consumes.first().cloned()),
            schema: raw.get("schema").map(Schema::from_value),
            required: raw.get("required").and_then(Value::as_bool).unwrap_or(false),
        }
    }

    fn request_body(&self, op: &'a Value) -> Result<Option<RequestBody>, SchemaError> {
        let Some(node) = op.get("requestBody") else {
            return Ok(None);
        };
        let node = self.follow(node)?;
        let media = first_media(node.get("content"));
        Ok(Some(RequestBody {
            content_type: media.map(|(ct, _)| ct.to_string()),
            schema: media
                .and_then(|(_, m)| m.get("schema"))
                .map(Schema::from_value),
            required: node.get("required").and_then(Value::as_bool).unwrap_or(false),
        }))
    }

    fn response(&self, node: &'a Value) -> Result<ResponseDefinition, SchemaError> {
        let mut headers = Vec::new();
        for (name, header) in node.get("headers").and_then(Value::as_object).into_iter().flatten() {
            let header = self.follow(header)?;
            headers.push(match self.version {
                // Swagger 2 headers carry no `required` flag: every declared one is expected
                SpecVersion::Swagger2 => HeaderDefinition {
                    name: name.clone(),
                    required: true,
                    schema: or_string(Schema::from_value(header)),
                },
                SpecVersion::OpenApi3 => HeaderDefinition {
                    name: name.clone(),
                    required: header.get("required").and_then(Value::as_bool).unwrap_or(false),
                    schema: header
                        .get("schema")
                        .map_or_else(string_schema, Schema::from_value),
                },
            });
        }

        let (content_type, schema) = match self.version {
            SpecVersion::Swagger2 => (None, node.get("schema").map(Schema::from_value)),
            SpecVersion::OpenApi3 => {
                let media = first_media(node.get("content"));
                (
                    media.map(|(ct, _)| ct.to_string()),
                    media
                        .and_then(|(_, m)| m.get("schema"))
                        .map(Schema::from_value),
                )
            }
        };

        Ok(ResponseDefinition {
            headers,
            content_type,
            schema,
        })
    }
}

fn first_media(content: Option<&Value>) -> Option<(&str, &Value)> {
    content?
        .as_object()?
        .iter()
        .next()
        .map(|(media_type, media)| (media_type.as_str(), media))
}

fn string_list(node: Option<&Value>) -> Vec<String> {
    node.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn string_schema() -> Schema {
    Schema::Primitive(Primitive::new(PrimitiveType::String))
}

fn or_string(schema: Schema) -> Schema {
    match schema {
        Schema::Opaque => string_schema(),
        Schema::Nullable(inner) if inner.is_opaque() => Schema::Nullable(Box::new(string_schema())),
        other => other,
    }
}

/// Parse an OpenAPI document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`/`.json`), then fall
/// back to content sniffing.
fn parse_spec(path: &Path, content: &str) -> Result<Value, SchemaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => serde_yml::from_str(content)
            .map_err(|e| SchemaError::Parse(format!("Invalid YAML: {e}"))),
        "json" => serde_json::from_str(content)
            .map_err(|e| SchemaError::Parse(format!("Invalid JSON: {e}"))),
        _ => parse_content(content),
    }
}

fn parse_content(content: &str) -> Result<Value, SchemaError> {
    if content.trim_start().starts_with('{') {
        serde_json::from_str(content).map_err(|e| SchemaError::Parse(format!("Invalid JSON: {e}")))
    } else {
        serde_yml::from_str(content).map_err(|e| SchemaError::Parse(format!("Invalid YAML: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "Petstore", "version": "1.0"},
            "paths": {
                "/pets/{id}": {
                    "parameters": [
                        {"name": "id", "in": "path", "schema": {"type": "integer"}},
                        {"name": "X-Trace", "in": "header", "schema": {"type": "string"}}
                    ],
                    "get": {
                        "operationId": "getPet",
                        "parameters": [
                            {"name": "X-Trace", "in": "header", "required": true, "schema": {"type": "string"}},
                            {"$ref": "#/components/parameters/Verbose"}
                        ],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "headers": {
                                    "X-Rate-Limit": {"required": true, "schema": {"type": "integer"}},
                                    "X-Optional": {"schema": {"type": "string"}}
                                },
                                "content": {
                                    "application/json": {"schema": {"$ref": "#/components/schemas/Pet"}},
                                    "application/xml": {"schema": {"$ref": "#/components/schemas/Pet"}}
                                }
                            },
                            "default": {"$ref": "#/components/responses/Error"}
                        }
                    },
                    "delete": {
                        "operationId": "deletePet",
                        "responses": {"204": {"description": "gone"}}
                    }
                },
                "/pets": {
                    "post": {
                        "operationId": "createPet",
                        "requestBody": {"$ref": "#/components/requestBodies/NewPet"},
                        "responses": {"201": {"description": "created"}}
                    }
                }
            },
            "components": {
                "schemas": {
                    "Pet": {
                        "type": "object",
                        "required": ["id", "name"],
                        "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
                    },
                    "Error": {"type": "object", "properties": {"message": {"type": "string"}}}
                },
                "parameters": {
                    "Verbose": {"name": "verbose", "in": "query", "schema": {"type": "boolean"}}
                },
                "requestBodies": {
                    "NewPet": {
                        "required": true,
                        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
                    }
                },
                "responses": {
                    "Error": {
                        "description": "error",
                        "content": {"application/problem+json": {"schema": {"$ref": "#/components/schemas/Error"}}}
                    }
                }
            }
        })
    }

    fn op<'a>(doc: &'a Document, path: &str, method: HttpMethod) -> &'a Operation {
        doc.path_items()
            .find(|p| p.path == path)
            .and_then(|p| p.operation(method))
            .unwrap()
    }

    #[test]
    fn paths_in_declaration_order_methods_in_fixed_order() {
        let doc = Document::from_value(&petstore()).unwrap();
        let paths: Vec<_> = doc.path_items().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/pets/{id}", "/pets"]);

        let methods: Vec<_> = doc
            .path_items()
            .next()
            .unwrap()
            .operations()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(methods, [HttpMethod::Get, HttpMethod::Delete]);
        // restartable
        assert_eq!(doc.path_items().count(), 2);
    }

    #[test]
    fn path_level_parameters_merge_and_operation_wins() {
        let doc = Document::from_value(&petstore()).unwrap();
        let get = op(&doc, "/pets/{id}", HttpMethod::Get);
        assert_eq!(get.operation_id.as_deref(), Some("getPet"));
        assert_eq!(get.parameters.len(), 3);

        let id = get.parameters_in(ParamLocation::Path).next().unwrap();
        assert_eq!(id.name, "id");
        assert!(id.required, "path parameters are always required");

        let trace = get.parameters_in(ParamLocation::Header).next().unwrap();
        assert!(trace.required, "operation-level declaration overrides path-level");

        let verbose = get.parameters_in(ParamLocation::Query).next().unwrap();
        assert_eq!(verbose.name, "verbose");
        assert!(!verbose.required);
    }

    #[test]
    fn request_body_resolved_through_components() {
        let doc = Document::from_value(&petstore()).unwrap();
        let create = op(&doc, "/pets", HttpMethod::Post);
        assert_eq!(create.request_content_type(), Some("application/json"));
        assert_eq!(
            create.request_body_schema(),
            Some(&Schema::Reference("#/components/schemas/Pet".into()))
        );
        assert!(create.request_body.as_ref().unwrap().required);

        let get = op(&doc, "/pets/{id}", HttpMethod::Get);
        assert!(get.request_body_schema().is_none());
        assert!(get.request_content_type().is_none());
    }

    #[test]
    fn response_by_key_exact_then_default() {
        let doc = Document::from_value(&petstore()).unwrap();
        let get = op(&doc, "/pets/{id}", HttpMethod::Get);

        let ok = get.response_by_key("200").unwrap();
        assert_eq!(ok.content_type.as_deref(), Some("application/json"));

        let fallback = get.response_by_key("404").unwrap();
        assert_eq!(
            fallback.content_type.as_deref(),
            Some("application/problem+json")
        );

        let delete = op(&doc, "/pets/{id}", HttpMethod::Delete);
        assert!(delete.response_by_key("404").is_none());
        assert!(delete.response_by_key("204").unwrap().schema.is_none());
    }

    #[test]
    fn required_headers_filters_optional_ones() {
        let doc = Document::from_value(&petstore()).unwrap();
        let ok = op(&doc, "/pets/{id}", HttpMethod::Get)
            .response_by_key("200")
            .unwrap();
        let names: Vec<_> = ok.required_headers().map(|(n, _)| n).collect();
        assert_eq!(names, ["X-Rate-Limit"]);
    }

    #[test]
    fn response_content_type_is_first_declared() {
        let doc = Document::from_value(&petstore()).unwrap();
        let get = op(&doc, "/pets/{id}", HttpMethod::Get);
        assert_eq!(doc.response_content_type(get), Some("application/json"));
        let delete = op(&doc, "/pets/{id}", HttpMethod::Delete);
        assert_eq!(doc.response_content_type(delete), None);
    }

    #[test]
    fn resolve_schema_accepts_pointer_or_name() {
        let doc = Document::from_value(&petstore()).unwrap();
        assert!(doc.resolve_schema("#/components/schemas/Pet").is_ok());
        assert!(doc.resolve_schema("Error").is_ok());
        let err = doc.resolve_schema("#/components/schemas/Missing").unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference(r) if r.ends_with("Missing")));
    }

    #[test]
    fn loads_without_definitions() {
        let doc = Document::from_value(&json!({"openapi": "3.1.0", "paths": {}})).unwrap();
        assert_eq!(doc.path_items().count(), 0);
        let err = doc.resolve_schema("Pet").unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference(_)));
    }

    #[test]
    fn dangling_component_reference_fails_load() {
        let raw = json!({
            "openapi": "3.0.0",
            "paths": {"/x": {"get": {
                "operationId": "x",
                "parameters": [{"$ref": "#/components/parameters/Nope"}],
                "responses": {}
            }}}
        });
        let err = Document::from_value(&raw).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference(_)));
    }

    #[test]
    fn swagger2_body_parameter_and_content_types() {
        let raw = json!({
            "swagger": "2.0",
            "consumes": ["application/json"],
            "produces": ["application/json"],
            "paths": {
                "/orders/{orderId}": {
                    "put": {
                        "operationId": "updateOrder",
                        "consumes": ["application/vnd.order+json"],
                        "parameters": [
                            {"name": "orderId", "in": "path", "required": true, "type": "string", "format": "uuid"},
                            {"name": "order", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Order"}},
                            {"name": "dryRun", "in": "query"}
                        ],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "schema": {"$ref": "#/definitions/Order"},
                                "headers": {"ETag": {"type": "string"}}
                            }
                        }
                    }
                }
            },
            "definitions": {"Order": {"type": "object", "properties": {"qty": {"type": "integer"}}}}
        });
        let doc = Document::from_value(&raw).unwrap();
        assert_eq!(doc.version(), SpecVersion::Swagger2);
        let put = op(&doc, "/orders/{orderId}", HttpMethod::Put);

        assert_eq!(put.request_content_type(), Some("application/vnd.order+json"));
        assert_eq!(
            put.request_body_schema(),
            Some(&Schema::Reference("#/definitions/Order".into()))
        );
        assert_eq!(put.parameters.len(), 2, "body parameter is not a plain parameter");

        let order_id = put.parameters_in(ParamLocation::Path).next().unwrap();
        assert!(matches!(&order_id.schema, Schema::Primitive(p) if p.format.as_deref() == Some("uuid")));
        let dry_run = put.parameters_in(ParamLocation::Query).next().unwrap();
        assert!(matches!(dry_run.schema, Schema::Primitive(_)), "untyped v2 parameter defaults to string");

        let ok = put.response_by_key("200").unwrap();
        assert_eq!(ok.required_headers().count(), 1);
        assert_eq!(doc.response_content_type(put), Some("application/json"));
        assert!(doc.resolve_schema("#/definitions/Order").is_ok());
    }

    #[test]
    fn parse_yaml_content() {
        let yaml = r#"
openapi: 3.0.0
info: {title: t, version: "1"}
paths:
  /health:
    get:
      operationId: health
      responses:
        "200":
          description: ok
          content:
            text/plain:
              schema: {type: string}
"#;
        let doc = Document::parse(yaml).unwrap();
        let health = op(&doc, "/health", HttpMethod::Get);
        assert_eq!(health.operation_id.as_deref(), Some("health"));
        assert_eq!(doc.response_content_type(health), Some("text/plain"));
    }

    #[test]
    fn load_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.json");
        std::fs::write(&path, petstore().to_string()).unwrap();
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.path_items().count(), 2);

        let missing = Document::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, SchemaError::Io(..)));
    }

    #[test]
    fn invalid_json_reports_parse_error() {
        let err = Document::parse("{ not json").unwrap_err();
        assert!(matches!(err, SchemaError::Parse(msg) if msg.starts_with("Invalid JSON")));
    }

    #[test]
    fn http_method_names() {
        assert_eq!(HttpMethod::from_name("patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::from_name("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::from_name("parameters"), None);
        assert_eq!(HttpMethod::Trace.to_string(), "TRACE");
    }
}
