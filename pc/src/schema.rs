//! Structural schema validation
//!
//! A small declarative validator for the JSON documents found under a
//! strategies root. Shapes describe required fields, primitive types, enum
//! membership and nested arrays/objects. Validation never fails outright; it
//! returns the list of violations so the loader can decide what to do with
//! the file.

use serde_json::Value;
use tracing::debug;

/// Allowed values for `complexity` and `time_investment`
pub const LEVELS: &[&str] = &["Low", "Medium", "High", "Medium-High"];

/// Declarative description of an expected JSON value
#[derive(Debug, Clone)]
pub enum Shape {
    /// Object with required keys and per-key shapes for known properties
    Object {
        required: Vec<&'static str>,
        properties: Vec<(&'static str, Shape)>,
    },
    /// String with an optional minimum length and allowed values
    String {
        min_len: usize,
        one_of: Option<&'static [&'static str]>,
    },
    /// Array whose items all match the inner shape
    Array { items: Box<Shape>, min_items: usize },
    /// Anything goes
    Any,
}

impl Shape {
    pub fn string() -> Self {
        Shape::String { min_len: 0, one_of: None }
    }

    pub fn non_empty_string() -> Self {
        Shape::String { min_len: 1, one_of: None }
    }

    pub fn one_of(values: &'static [&'static str]) -> Self {
        Shape::String {
            min_len: 0,
            one_of: Some(values),
        }
    }

    pub fn array_of(items: Shape) -> Self {
        Shape::Array {
            items: Box::new(items),
            min_items: 0,
        }
    }

    pub fn non_empty_array_of(items: Shape) -> Self {
        Shape::Array {
            items: Box::new(items),
            min_items: 1,
        }
    }
}

/// Shape of a strategy document file
pub fn strategy_shape() -> Shape {
    Shape::Object {
        required: vec!["name", "template"],
        properties: vec![
            ("name", Shape::non_empty_string()),
            ("description", Shape::string()),
            ("examples", Shape::array_of(Shape::string())),
            ("template", Shape::non_empty_string()),
            ("complexity", Shape::one_of(LEVELS)),
            ("time_investment", Shape::one_of(LEVELS)),
            ("triggers", Shape::array_of(Shape::string())),
            ("best_for", Shape::array_of(Shape::string())),
        ],
    }
}

/// Shape of a category `_metadata.json` file
pub fn category_metadata_shape() -> Shape {
    Shape::Object {
        required: vec!["category", "description", "use_cases"],
        properties: vec![
            ("category", Shape::non_empty_string()),
            ("description", Shape::non_empty_string()),
            ("use_cases", Shape::non_empty_array_of(Shape::string())),
            (
                "strategies",
                Shape::array_of(Shape::Object {
                    required: vec!["key", "name", "description"],
                    properties: vec![
                        ("key", Shape::non_empty_string()),
                        ("name", Shape::non_empty_string()),
                        ("description", Shape::non_empty_string()),
                        ("best_for", Shape::array_of(Shape::string())),
                        ("complexity", Shape::string()),
                        ("time_investment", Shape::string()),
                        ("triggers", Shape::array_of(Shape::string())),
                        ("output_focus", Shape::string()),
                    ],
                }),
            ),
        ],
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate `value` against `shape`, returning every violation found
///
/// `context` prefixes each message, e.g. `"Strategy"` yields
/// `"Strategy.examples[1] expected string, got number"`.
pub fn validate(value: &Value, shape: &Shape, context: &str) -> Vec<String> {
    let mut errors = Vec::new();
    check(value, shape, context, &mut errors);
    debug!(%context, violations = errors.len(), "schema::validate: complete");
    errors
}

fn check(value: &Value, shape: &Shape, context: &str, errors: &mut Vec<String>) {
    match shape {
        Shape::Any => {}
        Shape::String { min_len, one_of } => {
            let Some(s) = value.as_str() else {
                errors.push(format!("{} expected string, got {}", context, type_name(value)));
                return;
            };
            if s.chars().count() < *min_len {
                errors.push(format!("{} must be at least {} characters long", context, min_len));
            }
            if let Some(allowed) = one_of
                && !allowed.contains(&s)
            {
                errors.push(format!("{} must be one of: {}", context, allowed.join(", ")));
            }
        }
        Shape::Array { items, min_items } => {
            let Some(array) = value.as_array() else {
                errors.push(format!("{} expected array, got {}", context, type_name(value)));
                return;
            };
            if array.len() < *min_items {
                errors.push(format!("{} must contain at least {} item(s)", context, min_items));
            }
            for (index, item) in array.iter().enumerate() {
                check(item, items, &format!("{}[{}]", context, index), errors);
            }
        }
        Shape::Object { required, properties } => {
            let Some(object) = value.as_object() else {
                errors.push(format!("{} expected object, got {}", context, type_name(value)));
                return;
            };
            for field in required {
                if !object.contains_key(*field) {
                    errors.push(format!("{} missing required field: {}", context, field));
                }
            }
            for (name, property) in properties {
                if let Some(field_value) = object.get(*name) {
                    check(field_value, property, &format!("{}.{}", context, name), errors);
                }
            }
        }
    }
}
