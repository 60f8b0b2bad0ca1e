//! Parameter schema types and the coercion rules functions are invoked with.
//!
//! A [`ParamSpec`] describes one declared parameter (or a declared return
//! value). Raw input — often strings from forms or stringified JSON from an
//! earlier action — is converted to the declared type by [`ParamSpec::coerce`]:
//!
//! | type      | accepted input                                              |
//! |-----------|-------------------------------------------------------------|
//! | `string`  | strings only                                                |
//! | `number`  | numbers, numeric strings                                    |
//! | `boolean` | booleans, `"true"`/`"false"` in any case                    |
//! | `enum`    | a string equal to one of `enumValues` (case-sensitive)      |
//! | `array`   | arrays, strings holding a JSON array                        |
//! | `object`  | objects, strings holding a JSON object                      |
//!
//! JSON `null` counts as an absent value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExecutionError;

/// Declared type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Enum,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Enum => "enum",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_required")]
    pub required: bool,

    /// Allowed values when `param_type` is `enum`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,

    /// Nested field schema when `param_type` is `object`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_schema: Option<Vec<ParamSpec>>,

    /// Element schema when `param_type` is `array`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParamSpec>>,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: String::new(),
            required: true,
            enum_values: None,
            object_schema: None,
            items: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Boolean)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::new(name, ParamType::Enum);
        spec.enum_values = Some(values.into_iter().map(Into::into).collect());
        spec
    }

    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Array)
    }

    /// An object parameter whose fields are coerced recursively.
    pub fn object(name: impl Into<String>, fields: Vec<ParamSpec>) -> Self {
        let mut spec = Self::new(name, ParamType::Object);
        spec.object_schema = Some(fields);
        spec
    }

    /// An object parameter passed through without a field schema.
    pub fn any_object(name: impl Into<String>) -> Self {
        Self::new(name, ParamType::Object)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn items(mut self, items: ParamSpec) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    /// Coerce a raw value to this parameter's declared type.
    ///
    /// Returns `Ok(None)` for an absent optional value.
    pub fn coerce(&self, raw: Option<&Value>) -> Result<Option<Value>, ExecutionError> {
        self.coerce_at(&self.name, raw)
    }

    fn coerce_at(&self, path: &str, raw: Option<&Value>) -> Result<Option<Value>, ExecutionError> {
        let value = match raw {
            None | Some(Value::Null) => {
                if self.required {
                    return Err(ExecutionError::MissingRequiredParameter(path.to_string()));
                }
                return Ok(None);
            }
            Some(v) => v,
        };

        let coerced = match self.param_type {
            ParamType::String => match value {
                Value::String(_) => value.clone(),
                other => return Err(mismatch(path, ParamType::String, other)),
            },
            ParamType::Number => coerce_number(path, value)?,
            ParamType::Boolean => match value {
                Value::Bool(_) => value.clone(),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
                other => return Err(mismatch(path, ParamType::Boolean, other)),
            },
            ParamType::Enum => {
                let allowed = self.enum_values.clone().unwrap_or_default();
                match value {
                    Value::String(s) if allowed.iter().any(|a| a == s) => value.clone(),
                    Value::String(s) => {
                        return Err(ExecutionError::InvalidEnumValue {
                            param: path.to_string(),
                            value: s.clone(),
                            allowed,
                        })
                    }
                    other => {
                        return Err(ExecutionError::InvalidEnumValue {
                            param: path.to_string(),
                            value: other.to_string(),
                            allowed,
                        })
                    }
                }
            }
            ParamType::Array => {
                let items = match parse_structured(value) {
                    Some(Value::Array(items)) => items,
                    _ => return Err(mismatch(path, ParamType::Array, value)),
                };
                match &self.items {
                    Some(item_spec) => {
                        let mut coerced = Vec::with_capacity(items.len());
                        for (i, item) in items.iter().enumerate() {
                            let item_path = format!("{}[{}]", path, i);
                            let item = item_spec
                                .coerce_at(&item_path, Some(item))?
                                .unwrap_or(Value::Null);
                            coerced.push(item);
                        }
                        Value::Array(coerced)
                    }
                    None => Value::Array(items),
                }
            }
            ParamType::Object => {
                let fields = match parse_structured(value) {
                    Some(Value::Object(fields)) => fields,
                    _ => return Err(mismatch(path, ParamType::Object, value)),
                };
                match &self.object_schema {
                    Some(schema) => Value::Object(coerce_fields(path, schema, fields)?),
                    None => Value::Object(fields),
                }
            }
        };

        Ok(Some(coerced))
    }

    /// Check a function's result against this declared return shape.
    ///
    /// Only the runtime type is checked; no coercion is applied.
    pub fn check_return(&self, function: &str, value: &Value) -> Result<(), ExecutionError> {
        if value.is_null() && !self.required {
            return Ok(());
        }
        let ok = match self.param_type {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Enum => value
                .as_str()
                .map(|s| {
                    self.enum_values
                        .as_ref()
                        .is_some_and(|allowed| allowed.iter().any(|a| a == s))
                })
                .unwrap_or(false),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        };
        if ok {
            Ok(())
        } else {
            Err(ExecutionError::ReturnTypeMismatch {
                function: function.to_string(),
                expected: self.param_type.to_string(),
                actual: describe_value(value),
            })
        }
    }

    /// JSON description of this parameter for the planner's tool feed.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), Value::from(self.param_type.as_str()));
        if !self.description.is_empty() {
            schema.insert("description".into(), Value::from(self.description.clone()));
        }
        if let Some(values) = &self.enum_values {
            schema.insert("enum".into(), Value::from(values.clone()));
        }
        if let Some(items) = &self.items {
            schema.insert("items".into(), items.to_json_schema());
        }
        if let Some(fields) = &self.object_schema {
            let (properties, required) = properties_and_required(fields);
            schema.insert("properties".into(), Value::Object(properties));
            schema.insert("required".into(), Value::from(required));
        }
        Value::Object(schema)
    }
}

/// Build a `properties` map and `required` list for a field list.
pub(crate) fn properties_and_required(fields: &[ParamSpec]) -> (Map<String, Value>, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.clone(), field.to_json_schema());
        if field.required {
            required.push(field.name.clone());
        }
    }
    (properties, required)
}

fn coerce_fields(
    path: &str,
    schema: &[ParamSpec],
    mut fields: Map<String, Value>,
) -> Result<Map<String, Value>, ExecutionError> {
    for field in schema {
        let field_path = format!("{}.{}", path, field.name);
        match field.coerce_at(&field_path, fields.get(&field.name))? {
            Some(v) => {
                fields.insert(field.name.clone(), v);
            }
            None => {
                fields.remove(&field.name);
            }
        }
    }
    Ok(fields)
}

fn coerce_number(path: &str, value: &Value) -> Result<Value, ExecutionError> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::from(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch(path, ParamType::Number, value))
        }
        other => Err(mismatch(path, ParamType::Number, other)),
    }
}

/// Accept structured values directly, or strings holding JSON text.
fn parse_structured(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) | Value::Object(_) => Some(value.clone()),
        Value::String(s) => serde_json::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn mismatch(path: &str, expected: ParamType, actual: &Value) -> ExecutionError {
    ExecutionError::TypeMismatch {
        param: path.to_string(),
        expected: expected.to_string(),
        actual: describe_value(actual),
    }
}

/// Short human description of a value's runtime type, used in error messages.
pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => {
            let shown: String = s.chars().take(40).collect();
            format!("string {:?}", shown)
        }
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_native_values_pass_through() {
        let cases = [
            (ParamSpec::string("s"), json!("hello")),
            (ParamSpec::number("n"), json!(4.5)),
            (ParamSpec::boolean("b"), json!(false)),
            (ParamSpec::enumeration("e", ["high", "low"]), json!("low")),
            (ParamSpec::array("a"), json!([1, "two"])),
            (ParamSpec::any_object("o"), json!({ "k": [1] })),
        ];
        for (spec, value) in cases {
            assert_eq!(spec.coerce(Some(&value)).unwrap(), Some(value.clone()));
        }
    }

    #[test]
    fn test_string_representations_coerce() {
        assert_eq!(
            ParamSpec::number("n").coerce(Some(&json!("42"))).unwrap(),
            Some(json!(42))
        );
        assert_eq!(
            ParamSpec::number("n").coerce(Some(&json!(" 2.5 "))).unwrap(),
            Some(json!(2.5))
        );
        assert_eq!(
            ParamSpec::boolean("b").coerce(Some(&json!("TRUE"))).unwrap(),
            Some(json!(true))
        );
        assert_eq!(
            ParamSpec::boolean("b").coerce(Some(&json!("false"))).unwrap(),
            Some(json!(false))
        );
        assert_eq!(
            ParamSpec::array("a").coerce(Some(&json!("[1, 2]"))).unwrap(),
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn test_malformed_values_fail_with_matching_kind() {
        let err = ParamSpec::number("n").coerce(Some(&json!("two"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = ParamSpec::number("n").coerce(Some(&json!(true))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = ParamSpec::boolean("b").coerce(Some(&json!("yes"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = ParamSpec::string("s").coerce(Some(&json!(12))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = ParamSpec::array("a").coerce(Some(&json!("not json"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = ParamSpec::any_object("o").coerce(Some(&json!([1]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_enum_is_case_sensitive() {
        let spec = ParamSpec::enumeration("priority", ["high", "normal", "low"]);
        assert_eq!(spec.coerce(Some(&json!("high"))).unwrap(), Some(json!("high")));
        let err = spec.coerce(Some(&json!("High"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEnumValue);
        let err = spec.coerce(Some(&json!(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEnumValue);
    }

    #[test]
    fn test_required_and_optional() {
        let err = ParamSpec::string("to").coerce(None).unwrap_err();
        assert_eq!(err, ExecutionError::MissingRequiredParameter("to".into()));

        let err = ParamSpec::string("to").coerce(Some(&Value::Null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredParameter);

        assert_eq!(ParamSpec::string("cc").optional().coerce(None).unwrap(), None);
    }

    #[test]
    fn test_object_schema_coerces_fields_recursively() {
        let spec = ParamSpec::object(
            "filter",
            vec![
                ParamSpec::number("limit"),
                ParamSpec::boolean("active").optional(),
                ParamSpec::object("range", vec![ParamSpec::number("from")]),
            ],
        );
        let coerced = spec
            .coerce(Some(&json!({
                "limit": "10",
                "active": "True",
                "range": { "from": "3" },
                "extra": "kept"
            })))
            .unwrap()
            .unwrap();
        assert_eq!(
            coerced,
            json!({ "limit": 10, "active": true, "range": { "from": 3 }, "extra": "kept" })
        );

        let err = spec
            .coerce(Some(&json!({ "limit": 1, "range": {} })))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::MissingRequiredParameter("filter.range.from".into())
        );
    }

    #[test]
    fn test_array_items_are_coerced() {
        let spec = ParamSpec::array("ids").items(ParamSpec::number("id"));
        assert_eq!(
            spec.coerce(Some(&json!(["1", 2]))).unwrap(),
            Some(json!([1, 2]))
        );
        let err = spec.coerce(Some(&json!(["x"]))).unwrap_err();
        match err {
            ExecutionError::TypeMismatch { param, .. } => assert_eq!(param, "ids[0]"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_check_return() {
        assert!(ParamSpec::number("r").check_return("add", &json!(3)).is_ok());
        let err = ParamSpec::number("r")
            .check_return("add", &json!("3"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReturnTypeMismatch);
    }

    #[test]
    fn test_enum_surfaces_as_enum_type() {
        let schema = ParamSpec::enumeration("priority", ["high", "low"])
            .describe("Urgency")
            .to_json_schema();
        assert_eq!(
            schema,
            json!({ "type": "enum", "description": "Urgency", "enum": ["high", "low"] })
        );
    }
}
