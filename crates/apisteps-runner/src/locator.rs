//! Operation lookup by `operationId`

use apisteps_core::{Document, HttpMethod, Operation};

/// An operation together with where it lives in the document.
#[derive(Debug, Clone, Copy)]
pub struct LocatedOperation<'d> {
    pub path: &'d str,
    pub method: HttpMethod,
    pub operation: &'d Operation,
}

impl LocatedOperation<'_> {
    /// `GET /pets/{id}`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    #[must_use]
    pub fn operation_id(&self) -> &str {
        self.operation.operation_id.as_deref().unwrap_or_default()
    }
}

/// Every operation in the document: path items in declaration order, methods
/// in the fixed GET, PUT, POST, DELETE, OPTIONS, HEAD, PATCH, TRACE order.
pub fn operations(document: &Document) -> impl Iterator<Item = LocatedOperation<'_>> {
    document.path_items().flat_map(|item| {
        item.operations().map(move |(method, operation)| LocatedOperation {
            path: item.path.as_str(),
            method,
            operation,
        })
    })
}

/// First operation whose id equals `operation_id`.
#[must_use]
pub fn find_operation<'d>(document: &'d Document, operation_id: &str) -> Option<LocatedOperation<'d>> {
    let found = operations(document)
        .find(|located| located.operation.operation_id.as_deref() == Some(operation_id));
    match &found {
        Some(located) => tracing::debug!(operation_id, operation = %located.label(), "located operation"),
        None => tracing::debug!(operation_id, "operation not found"),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Document {
        Document::from_value(&json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "post": {"operationId": "createPet", "responses": {}},
                    "get": {"operationId": "listPets", "responses": {}}
                },
                "/pets/{id}": {
                    "get": {"operationId": "getPet", "responses": {}},
                    "delete": {"responses": {}}
                },
                "/animals/{id}": {
                    "get": {"operationId": "getPet", "responses": {}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn finds_by_id() {
        let doc = document();
        let located = find_operation(&doc, "createPet").unwrap();
        assert_eq!(located.path, "/pets");
        assert_eq!(located.method, HttpMethod::Post);
        assert_eq!(located.label(), "POST /pets");
        assert_eq!(located.operation_id(), "createPet");
    }

    #[test]
    fn duplicate_ids_resolve_to_first_declared() {
        let doc = document();
        let located = find_operation(&doc, "getPet").unwrap();
        assert_eq!(located.path, "/pets/{id}");
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(find_operation(&document(), "deletePet").is_none());
    }

    #[test]
    fn enumeration_order() {
        let doc = document();
        let labels: Vec<_> = operations(&doc).map(|o| o.label()).collect();
        assert_eq!(
            labels,
            [
                "GET /pets",
                "POST /pets",
                "GET /pets/{id}",
                "DELETE /pets/{id}",
                "GET /animals/{id}",
            ]
        );
    }
}
