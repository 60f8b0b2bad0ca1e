//! Built-in functions available to every workflow.
//!
//!   1. add            - Sum two numbers
//!   2. join_text      - Join a list of values into one string
//!   3. markdown_table - Render a list of objects as a Markdown table
//!   4. pick_fields    - Keep selected fields of an object
//!   5. get_config     - Read a config store value
//!   6. set_config     - Write a config store value

use serde_json::{json, Map, Value};

use crate::error::FunctionError;
use crate::registry::{FunctionDescriptor, FunctionRegistry, FunctionResult, Handler, ParamSpec};
use crate::store::ConfigStore;

/// Dotted text such as `smtp.host` reads as a reference to an earlier action.
const DOTTED_KEY_HINT: &str =
    "Config key; wrap dotted keys as {\"_literal\": \"smtp.host\"} so they are not read as references";

/// Register the built-ins. Existing registrations with the same names are replaced.
pub fn register_builtins(registry: &FunctionRegistry, config_store: ConfigStore) {
    registry.register(
        "add",
        FunctionDescriptor::new("Add two numbers", Handler::positional_sync(add))
            .param(ParamSpec::number("a"))
            .param(ParamSpec::number("b"))
            .returns(ParamSpec::number("sum")),
    );

    registry.register(
        "join_text",
        FunctionDescriptor::new(
            "Join values into a single string",
            Handler::named_sync(join_text),
        )
        .param(ParamSpec::array("values").items(ParamSpec::string("value")))
        .param(
            ParamSpec::string("separator")
                .describe("Defaults to \", \"")
                .optional(),
        )
        .returns(ParamSpec::string("text")),
    );

    registry.register(
        "markdown_table",
        FunctionDescriptor::new(
            "Render a list of objects as a Markdown table",
            Handler::named_sync(markdown_table),
        )
        .param(
            ParamSpec::array("rows")
                .describe("Objects; columns follow first appearance of each key")
                .items(ParamSpec::any_object("row")),
        )
        .returns(ParamSpec::string("table")),
    );

    registry.register(
        "pick_fields",
        FunctionDescriptor::new(
            "Keep only the listed fields of an object",
            Handler::named_sync(pick_fields),
        )
        .param(ParamSpec::any_object("item"))
        .param(ParamSpec::array("fields").items(ParamSpec::string("field")))
        .returns(ParamSpec::any_object("picked")),
    );

    let store = config_store.clone();
    registry.register(
        "get_config",
        FunctionDescriptor::new(
            "Read a configuration value (null when unset)",
            Handler::named(move |args| get_config(store.clone(), args)),
        )
        .param(ParamSpec::string("key").describe(DOTTED_KEY_HINT)),
    );

    let store = config_store;
    registry.register(
        "set_config",
        FunctionDescriptor::new(
            "Store a configuration value",
            Handler::named(move |args| set_config(store.clone(), args)),
        )
        .param(ParamSpec::string("key").describe(DOTTED_KEY_HINT))
        .param(ParamSpec::string("value").describe("JSON text; anything else is stored as a string")),
    );
}

fn required_str(args: &Map<String, Value>, name: &str) -> Result<String, FunctionError> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("'{}' must be a string", name).into())
}

async fn get_config(store: ConfigStore, args: Map<String, Value>) -> FunctionResult {
    let key = required_str(&args, "key")?;
    Ok(store.get(&key).await?.unwrap_or(Value::Null))
}

async fn set_config(store: ConfigStore, args: Map<String, Value>) -> FunctionResult {
    let key = required_str(&args, "key")?;
    let raw = required_str(&args, "value")?;
    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    store.set(&key, value.clone()).await?;
    Ok(json!({ "key": key, "value": value }))
}

fn add(args: Vec<Value>) -> FunctionResult {
    let (a, b) = (&args[0], &args[1]);
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(json!(sum));
        }
    }
    let x = a.as_f64().ok_or("a is not a number")?;
    let y = b.as_f64().ok_or("b is not a number")?;
    Ok(json!(x + y))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn join_text(args: Map<String, Value>) -> FunctionResult {
    let values = args.get("values").and_then(Value::as_array).ok_or("values must be an array")?;
    let separator = args.get("separator").and_then(Value::as_str).unwrap_or(", ");
    Ok(Value::String(
        values.iter().map(display).collect::<Vec<_>>().join(separator),
    ))
}

fn markdown_table(args: Map<String, Value>) -> FunctionResult {
    let rows = args.get("rows").and_then(Value::as_array).ok_or("rows must be an array")?;

    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        let obj = row.as_object().ok_or("every row must be an object")?;
        for key in obj.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    if columns.is_empty() {
        return Ok(Value::String(String::new()));
    }

    let cell = |v: &Value| display(v).replace('|', "\\|").replace('\n', " ");
    let mut out = format!("| {} |\n", columns.join(" | "));
    out.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(*c).map(cell).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    Ok(Value::String(out.trim_end().to_string()))
}

fn pick_fields(args: Map<String, Value>) -> FunctionResult {
    let item = args.get("item").and_then(Value::as_object).ok_or("item must be an object")?;
    let fields = args.get("fields").and_then(Value::as_array).ok_or("fields must be an array")?;

    let picked: Map<String, Value> = fields
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|f| item.get(f).map(|v| (f.to_string(), v.clone())))
        .collect();
    Ok(Value::Object(picked))
}
