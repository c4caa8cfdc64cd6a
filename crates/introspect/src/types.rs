//! Type definitions for GraphQL responses and introspection results.
//!
//! [`GraphQLResponse`] is the raw `{ data, errors }` envelope returned by the
//! transport. The `__schema` node it carries can be turned into the typed
//! [`IntrospectionSchema`] model consumed by the SDL renderer.

use serde::{Deserialize, Deserializer, Serialize};

/// The GraphQL-over-HTTP response envelope.
///
/// `data` and `errors` are independent: a server may return both, so callers
/// have to look at each of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

/// A single entry of the `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLError {
    #[serde(default)]
    pub message: String,
}

impl GraphQLResponse {
    /// Returns the GraphQL errors, treating an absent array as empty.
    #[must_use]
    pub fn errors(&self) -> &[GraphQLError] {
        self.errors.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }

    /// The `__schema` node, if `data` is present and the node is not `null`.
    #[must_use]
    pub fn schema(&self) -> Option<&serde_json::Value> {
        self.data
            .as_ref()
            .and_then(|data| data.get("__schema"))
            .filter(|schema| !schema.is_null())
    }

    /// A response is usable when it carries a non-null schema and no errors.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.schema().is_some() && !self.has_errors()
    }
}

/// Complete GraphQL schema information from introspection.
///
/// Fields that only newer introspection queries request are optional, so the
/// same model reads the output of every query variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    #[serde(default)]
    pub description: Option<String>,
    pub query_type: Option<IntrospectionTypeRef>,
    #[serde(default)]
    pub mutation_type: Option<IntrospectionTypeRef>,
    #[serde(default)]
    pub subscription_type: Option<IntrospectionTypeRef>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub types: Vec<IntrospectionType>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub directives: Vec<IntrospectionDirective>,
}

impl IntrospectionSchema {
    /// Deserializes the `__schema` node of an introspection response.
    pub fn from_value(value: &serde_json::Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionTypeRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum IntrospectionType {
    #[serde(rename = "SCALAR")]
    Scalar(IntrospectionScalarType),
    #[serde(rename = "OBJECT")]
    Object(IntrospectionObjectType),
    #[serde(rename = "INTERFACE")]
    Interface(IntrospectionInterfaceType),
    #[serde(rename = "UNION")]
    Union(IntrospectionUnionType),
    #[serde(rename = "ENUM")]
    Enum(IntrospectionEnumType),
    #[serde(rename = "INPUT_OBJECT")]
    InputObject(IntrospectionInputObjectType),
}

impl IntrospectionType {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(t) => &t.name,
            Self::Object(t) => &t.name,
            Self::Interface(t) => &t.name,
            Self::Union(t) => &t.name,
            Self::Enum(t) => &t.name,
            Self::InputObject(t) => &t.name,
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&String> {
        match self {
            Self::Scalar(t) => t.description.as_ref(),
            Self::Object(t) => t.description.as_ref(),
            Self::Interface(t) => t.description.as_ref(),
            Self::Union(t) => t.description.as_ref(),
            Self::Enum(t) => t.description.as_ref(),
            Self::InputObject(t) => t.description.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionScalarType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "specifiedByURL", alias = "specifiedByUrl")]
    pub specified_by_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionObjectType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub fields: Vec<IntrospectionField>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub interfaces: Vec<IntrospectionTypeRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionInterfaceType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub fields: Vec<IntrospectionField>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub interfaces: Vec<IntrospectionTypeRef>,
    #[serde(default)]
    pub possible_types: Option<Vec<IntrospectionTypeRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionUnionType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub possible_types: Vec<IntrospectionTypeRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionEnumType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub enum_values: Vec<IntrospectionEnumValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionInputObjectType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub input_fields: Vec<IntrospectionInputValue>,
    #[serde(default)]
    pub is_one_of: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionField {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub args: Vec<IntrospectionInputValue>,
    #[serde(rename = "type")]
    pub type_ref: IntrospectionTypeRefFull,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionInputValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: IntrospectionTypeRefFull,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionEnumValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionDirective {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub locations: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub args: Vec<IntrospectionInputValue>,
    #[serde(default)]
    pub is_repeatable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionTypeRefFull {
    pub kind: TypeKind,
    pub name: Option<String>,
    #[serde(default)]
    pub of_type: Option<Box<IntrospectionTypeRefFull>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

impl IntrospectionTypeRefFull {
    /// The type as written in SDL, wrappers included: `[Episode!]!`.
    ///
    /// ```
    /// # use graphql_introspect::{IntrospectionTypeRefFull, TypeKind};
    /// let named = |name: &str| IntrospectionTypeRefFull {
    ///     kind: TypeKind::Enum,
    ///     name: Some(name.to_string()),
    ///     of_type: None,
    /// };
    /// let wrap = |kind, inner| IntrospectionTypeRefFull {
    ///     kind,
    ///     name: None,
    ///     of_type: Some(Box::new(inner)),
    /// };
    ///
    /// let episodes = wrap(
    ///     TypeKind::NonNull,
    ///     wrap(TypeKind::List, wrap(TypeKind::NonNull, named("Episode"))),
    /// );
    /// assert_eq!(episodes.to_string(), "[Episode!]!");
    /// ```
    #[must_use]
    pub fn to_type_string(&self) -> String {
        match self.kind {
            TypeKind::NonNull => self.of_type.as_ref().map_or_else(
                || "!".to_string(),
                |of_type| format!("{}!", of_type.to_type_string()),
            ),
            TypeKind::List => self.of_type.as_ref().map_or_else(
                || "[]".to_string(),
                |of_type| format!("[{}]", of_type.to_type_string()),
            ),
            _ => self.name.as_deref().unwrap_or_default().to_string(),
        }
    }
}

impl std::fmt::Display for IntrospectionTypeRefFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_type_string())
    }
}

// Older servers answer `null` for lists they consider not applicable.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_with_data_and_no_errors_is_usable() {
        let response: GraphQLResponse =
            serde_json::from_value(json!({ "data": { "__schema": { "types": [] } } })).unwrap();
        assert!(response.is_usable());
        assert!(response.errors().is_empty());
    }

    #[test]
    fn test_response_with_data_and_errors_is_not_usable() {
        let response: GraphQLResponse = serde_json::from_value(json!({
            "data": { "__schema": { "types": [] } },
            "errors": [{ "message": "Cannot query field \"isRepeatable\" on type \"__Directive\"." }]
        }))
        .unwrap();
        assert!(response.schema().is_some());
        assert!(response.has_errors());
        assert!(!response.is_usable());
    }

    #[test]
    fn test_response_with_null_schema_is_not_usable() {
        let response: GraphQLResponse =
            serde_json::from_value(json!({ "data": { "__schema": null } })).unwrap();
        assert!(response.schema().is_none());
        assert!(!response.is_usable());

        let response: GraphQLResponse = serde_json::from_value(json!({ "data": null })).unwrap();
        assert!(!response.is_usable());
    }

    #[test]
    fn test_error_without_message_defaults_to_empty() {
        let response: GraphQLResponse =
            serde_json::from_value(json!({ "errors": [{ "extensions": {} }] })).unwrap();
        assert_eq!(response.errors(), &[GraphQLError::default()]);
    }

    #[test]
    fn test_schema_accepts_classic_and_modern_shapes() {
        let classic = json!({
            "queryType": { "name": "Query" },
            "mutationType": null,
            "subscriptionType": null,
            "types": [
                { "kind": "OBJECT", "name": "Query", "description": null,
                  "fields": [], "interfaces": null, "inputFields": null,
                  "enumValues": null, "possibleTypes": null }
            ],
            "directives": []
        });
        let schema = IntrospectionSchema::from_value(&classic).unwrap();
        assert_eq!(schema.types.len(), 1);
        assert!(schema.description.is_none());

        let modern = json!({
            "description": "The API",
            "queryType": { "name": "Query" },
            "types": [
                { "kind": "SCALAR", "name": "Url", "specifiedByURL": "https://tools.ietf.org/html/rfc3986" }
            ],
            "directives": [
                { "name": "tag", "locations": ["FIELD_DEFINITION"], "args": [], "isRepeatable": true }
            ]
        });
        let schema = IntrospectionSchema::from_value(&modern).unwrap();
        assert_eq!(schema.description.as_deref(), Some("The API"));
        assert!(schema.directives[0].is_repeatable);
        match &schema.types[0] {
            IntrospectionType::Scalar(s) => assert_eq!(
                s.specified_by_url.as_deref(),
                Some("https://tools.ietf.org/html/rfc3986")
            ),
            other => panic!("expected scalar, got {other:?}"),
        }
    }
}
