//! Introspection query variants.
//!
//! Servers implement different revisions of the introspection spec. The
//! built-in variants are ordered from the most featureful to the most
//! conservative so the poller can fall back until one is understood.

use std::fmt::Write;

/// Operation name sent alongside every introspection query.
pub const OPERATION_NAME: &str = "IntrospectionQuery";

/// Nested type reference selection, 7 levels deep, to handle wrappers like
/// `[[[String!]!]!]`.
const TYPE_REF_FRAGMENT: &str = r"
fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
";

/// The built-in introspection query variants, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryVariant {
    /// Modern query plus draft features: input value deprecation and `@oneOf`.
    ModernDraft,
    /// October 2021 spec: schema description, `specifiedByURL`, `isRepeatable`.
    Modern,
    /// June 2018 spec plus input value deprecation.
    ClassicDraft,
    /// June 2018 spec.
    Classic,
}

impl QueryVariant {
    /// All built-in variants in the order they are attempted.
    pub const FALLBACK_ORDER: [Self; 4] = [
        Self::ModernDraft,
        Self::Modern,
        Self::ClassicDraft,
        Self::Classic,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ModernDraft => "modern draft",
            Self::Modern => "modern",
            Self::ClassicDraft => "classic draft",
            Self::Classic => "classic",
        }
    }

    const fn features(self) -> Features {
        match self {
            Self::ModernDraft => Features {
                schema_description: true,
                specified_by_url: true,
                directive_is_repeatable: true,
                input_value_deprecation: true,
                one_of: true,
            },
            Self::Modern => Features {
                schema_description: true,
                specified_by_url: true,
                directive_is_repeatable: true,
                input_value_deprecation: false,
                one_of: false,
            },
            Self::ClassicDraft => Features {
                schema_description: false,
                specified_by_url: false,
                directive_is_repeatable: false,
                input_value_deprecation: true,
                one_of: false,
            },
            Self::Classic => Features {
                schema_description: false,
                specified_by_url: false,
                directive_is_repeatable: false,
                input_value_deprecation: false,
                one_of: false,
            },
        }
    }

    /// Builds the query document for this variant.
    #[must_use]
    pub fn query_text(self) -> String {
        build_query(self.features())
    }
}

impl std::fmt::Display for QueryVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Optional parts of the introspection schema a query asks for.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
struct Features {
    schema_description: bool,
    specified_by_url: bool,
    directive_is_repeatable: bool,
    input_value_deprecation: bool,
    one_of: bool,
}

/// A query ready to be sent, with a label used in log messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectionQuery {
    pub label: String,
    pub text: String,
}

impl IntrospectionQuery {
    #[must_use]
    pub fn builtin(variant: QueryVariant) -> Self {
        Self {
            label: variant.label().to_string(),
            text: variant.query_text(),
        }
    }

    /// A user-supplied query, which replaces the whole fallback chain.
    #[must_use]
    pub fn custom(text: impl Into<String>) -> Self {
        Self {
            label: "custom".to_string(),
            text: text.into(),
        }
    }

    /// Applies a rewriting hook to the query text, keeping the label.
    #[must_use]
    pub fn rewrite(self, rewriter: impl Fn(&str) -> String) -> Self {
        Self {
            text: rewriter(&self.text),
            label: self.label,
        }
    }
}

/// The ordered list of queries to try: the custom query alone when given,
/// otherwise every built-in variant in [`QueryVariant::FALLBACK_ORDER`].
#[must_use]
pub fn introspection_queries(custom: Option<String>) -> Vec<IntrospectionQuery> {
    match custom {
        Some(text) => vec![IntrospectionQuery::custom(text)],
        None => QueryVariant::FALLBACK_ORDER
            .into_iter()
            .map(IntrospectionQuery::builtin)
            .collect(),
    }
}

fn build_query(features: Features) -> String {
    let args = if features.input_value_deprecation {
        "args(includeDeprecated: true)"
    } else {
        "args"
    };
    let input_fields = if features.input_value_deprecation {
        "inputFields(includeDeprecated: true)"
    } else {
        "inputFields"
    };

    let mut query = String::from("query IntrospectionQuery {\n  __schema {\n");
    if features.schema_description {
        query.push_str("    description\n");
    }
    query.push_str(
        "    queryType { name }\n    mutationType { name }\n    subscriptionType { name }\n",
    );
    query.push_str("    types {\n      ...FullType\n    }\n");
    query.push_str("    directives {\n      name\n      description\n");
    if features.directive_is_repeatable {
        query.push_str("      isRepeatable\n");
    }
    writeln!(
        query,
        "      locations\n      {args} {{\n        ...InputValue\n      }}\n    }}\n  }}\n}}"
    )
    .unwrap();

    query.push_str("\nfragment FullType on __Type {\n  kind\n  name\n  description\n");
    if features.specified_by_url {
        query.push_str("  specifiedByURL\n");
    }
    if features.one_of {
        query.push_str("  isOneOf\n");
    }
    writeln!(
        query,
        "  fields(includeDeprecated: true) {{\n    name\n    description\n    \
         {args} {{\n      ...InputValue\n    }}\n    type {{\n      ...TypeRef\n    }}\n    \
         isDeprecated\n    deprecationReason\n  }}"
    )
    .unwrap();
    writeln!(query, "  {input_fields} {{\n    ...InputValue\n  }}").unwrap();
    query.push_str("  interfaces {\n    ...TypeRef\n  }\n");
    query.push_str(
        "  enumValues(includeDeprecated: true) {\n    name\n    description\n    \
         isDeprecated\n    deprecationReason\n  }\n",
    );
    query.push_str("  possibleTypes {\n    ...TypeRef\n  }\n}\n");

    query.push_str(
        "\nfragment InputValue on __InputValue {\n  name\n  description\n  \
         type {\n    ...TypeRef\n  }\n  defaultValue\n",
    );
    if features.input_value_deprecation {
        query.push_str("  isDeprecated\n  deprecationReason\n");
    }
    query.push_str("}\n");

    query.push_str(TYPE_REF_FRAGMENT);
    query
}
