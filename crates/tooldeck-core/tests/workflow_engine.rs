//! End-to-end engine scenarios over the public API: built-ins, config store,
//! YAML documents and the execution report wire shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tooldeck_core::workflow::{GenerationContext, Generator};
use tooldeck_core::{
    AppStateInner, Database, ErrorKind, ExecuteOptions, ParamSpec, ValidationError,
    WorkflowDocument,
};

fn state() -> AppStateInner {
    AppStateInner::new(Database::open_in_memory().unwrap())
}

fn input(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn end_to_end_success_report_shape() {
    let state = state();
    let doc = WorkflowDocument::from_json(
        r#"{"type":"workflow","actions":[{"id":"sum","tool":"add","parameters":{"a":1,"b":2}}]}"#,
    )
    .unwrap();

    let report = state
        .executor
        .execute(&doc, Map::new(), &ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&report).unwrap(),
        json!({
            "success": true,
            "results": [ { "actionId": "sum", "result": 3 } ],
            "errors": []
        })
    );
}

#[tokio::test]
async fn end_to_end_failure_report_shape() {
    let state = state();
    let doc = WorkflowDocument::from_json(
        r#"{"actions":[{"id":"sum","tool":"add","parameters":{"a":1,"b":"two"}}]}"#,
    )
    .unwrap();

    let report = state
        .executor
        .execute(&doc, Map::new(), &ExecuteOptions::default())
        .await
        .unwrap();

    let wire = serde_json::to_value(&report).unwrap();
    assert_eq!(wire["success"], json!(false));
    assert_eq!(wire["results"], json!([]));
    assert_eq!(wire["errors"][0]["actionId"], json!("sum"));
    assert_eq!(wire["errors"][0]["kind"], json!("TypeMismatch"));
    assert!(wire["errors"][0]["error"]
        .as_str()
        .unwrap()
        .contains("TypeMismatch"));
}

#[tokio::test]
async fn yaml_workflow_with_config_and_mapping() {
    let state = state();
    state
        .config_store
        .set("report_fields", json!(["name", "role"]))
        .await
        .unwrap();

    let doc = WorkflowDocument::from_yaml(
        r#"
type: workflow
description: Summarise team members
actions:
  - id: fields
    tool: get_config
    parameters:
      key: report_fields
  - id: trimmed
    tool: pick_fields
    map: true
    parameters:
      item: userInput.members
      fields: '["name", "role"]'
  - id: table
    tool: markdown_table
    parameters:
      rows: trimmed[*]
  - id: names
    tool: join_text
    parameters:
      values: trimmed[*].name
      separator: " & "
  - id: remember
    tool: set_config
    parameters:
      key: last_names
      value: names.missing
"#,
    )
    .unwrap();

    let report = state
        .executor
        .execute(
            &doc,
            input(json!({
                "members": [
                    { "name": "ada", "role": "admin", "ssn": "x" },
                    { "name": "bob", "role": "viewer", "ssn": "y" }
                ]
            })),
            &ExecuteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.result("fields"), Some(&json!(["name", "role"])));
    assert_eq!(
        report.result("trimmed"),
        Some(&json!([
            { "name": "ada", "role": "admin" },
            { "name": "bob", "role": "viewer" }
        ]))
    );
    assert_eq!(
        report.result("table"),
        Some(&json!(
            "| name | role |\n| --- | --- |\n| ada | admin |\n| bob | viewer |"
        ))
    );
    assert_eq!(report.result("names"), Some(&json!("ada & bob")));

    // "names" is a string, so "names.missing" is absent and "value" is required
    let failure = report.error("remember").unwrap();
    assert_eq!(failure.kind, ErrorKind::MissingRequiredParameter);
    assert!(!report.success);
    assert_eq!(state.config_store.get("last_names").await.unwrap(), None);
}

#[tokio::test]
async fn dotted_config_keys_need_literal_escape() {
    let state = state();
    let doc = WorkflowDocument::from_value(json!({
        "actions": [
            { "id": "bare", "tool": "set_config", "parameters": { "key": "smtp.host", "value": "mail.local" } },
            {
                "id": "escaped",
                "tool": "set_config",
                "parameters": { "key": { "_literal": "smtp.host" }, "value": "mail.local" }
            },
            { "id": "read", "tool": "get_config", "parameters": { "key": { "_literal": "smtp.host" } } }
        ]
    }))
    .unwrap();

    let report = state
        .executor
        .execute(&doc, Map::new(), &ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(report.error("bare").unwrap().kind, ErrorKind::UnresolvedReference);
    assert_eq!(report.result("read"), Some(&json!("mail.local")));
    assert_eq!(
        state.config_store.get("smtp.host").await.unwrap(),
        Some(json!("mail.local"))
    );
}

#[tokio::test]
async fn mapped_array_must_align() {
    let state = state();
    let doc = WorkflowDocument::from_value(json!({
        "actions": [
            { "id": "sums", "tool": "add", "map": true, "parameters": { "a": [1, 2, 3], "b": [1, 2] } },
            { "id": "after", "tool": "join_text", "parameters": { "values": "sums[*]" } },
            { "id": "independent", "tool": "add", "parameters": { "a": 4, "b": 4 } }
        ]
    }))
    .unwrap();

    let report = state
        .executor
        .execute(&doc, Map::new(), &ExecuteOptions::default())
        .await
        .unwrap();

    let kinds: Vec<(&str, ErrorKind)> = report
        .errors
        .iter()
        .map(|e| (e.action_id.as_str(), e.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("sums", ErrorKind::MapLengthMismatch),
            ("after", ErrorKind::UnresolvedReference)
        ]
    );
    assert_eq!(report.result("independent"), Some(&json!(8)));
}

#[tokio::test]
async fn preflight_rejects_unknown_tools_and_forward_references() {
    let state = state();

    let unknown = WorkflowDocument::from_value(json!({
        "actions": [ { "id": "x", "tool": "drop_database" } ]
    }))
    .unwrap();
    let err = state
        .executor
        .execute(&unknown, Map::new(), &ExecuteOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::UnknownTool(vec!["drop_database".into()]));

    let forward = WorkflowDocument::from_value(json!({
        "actions": [
            { "id": "a", "tool": "join_text", "parameters": { "values": "b[*]" } },
            { "id": "b", "tool": "add", "parameters": { "a": 1, "b": 1 } }
        ]
    }))
    .unwrap();
    let err = state
        .executor
        .execute(&forward, Map::new(), &ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::ForwardReference { .. }));
}

struct SqlWriter;

#[async_trait]
impl Generator for SqlWriter {
    async fn generate(&self, prompt: &str, context: GenerationContext) -> Result<Value, String> {
        match context {
            GenerationContext::Sql => Ok(json!(format!(
                "```sql\nSELECT * FROM users WHERE team = '{}'\n```",
                prompt
            ))),
            _ => Err(format!("unexpected context {}", context.as_str())),
        }
    }

    async fn transform(
        &self,
        raw: &Value,
        _prompt: &str,
        _context: GenerationContext,
    ) -> Result<Value, String> {
        let length = raw["value"].as_str().map(str::len).unwrap_or(0);
        Ok(json!(format!("{{\"length\": {}}}", length)))
    }
}

#[tokio::test]
async fn generation_hook_is_injected() {
    let state = state().with_generator(Arc::new(SqlWriter));
    let doc = WorkflowDocument::from_value(json!({
        "actions": [
            {
                "id": "sql",
                "tool": "set_config",
                "parameters": {
                    "key": "last_query",
                    "value": { "_generate": "{{userInput.team}}", "_context": "sql" }
                },
                "_transform": { "_transform": "Measure the query", "_context": "json" }
            }
        ]
    }))
    .unwrap();

    let report = state
        .executor
        .execute(&doc, input(json!({ "team": "ops" })), &ExecuteOptions::default())
        .await
        .unwrap();

    let query = "SELECT * FROM users WHERE team = 'ops'";
    assert!(report.success, "{:?}", report.errors);
    assert_eq!(report.result("sql"), Some(&json!({ "length": query.len() })));
    assert_eq!(
        state.config_store.get("last_query").await.unwrap(),
        Some(json!(query))
    );
}

#[test]
fn schema_coercion_round_trip() {
    let cases = [
        (ParamSpec::string("s"), json!("text"), json!("text")),
        (ParamSpec::number("n"), json!(42), json!(42)),
        (ParamSpec::number("n"), json!("42"), json!(42)),
        (ParamSpec::boolean("b"), json!("TRUE"), json!(true)),
        (ParamSpec::array("a"), json!("[1, 2]"), json!([1, 2])),
        (ParamSpec::any_object("o"), json!({ "k": 1 }), json!({ "k": 1 })),
    ];
    for (spec, raw, expected) in cases {
        assert_eq!(spec.coerce(Some(&raw)).unwrap(), Some(expected), "{}", spec.name);
    }

    let priority = ParamSpec::enumeration("priority", ["high", "normal", "low"]);
    assert!(priority.coerce(Some(&json!("high"))).is_ok());
    let err = priority.coerce(Some(&json!("High"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEnumValue);

    let err = ParamSpec::number("n").coerce(Some(&json!("4x2"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn describe_is_idempotent() {
    let state = state();
    let first = state.registry.describe_all();
    let second = state.registry.describe_all();
    assert_eq!(first, second);
    let names: Vec<&str> = first.iter().filter_map(|d| d["name"].as_str()).collect();
    assert_eq!(
        names,
        vec!["add", "get_config", "join_text", "markdown_table", "pick_fields", "set_config"]
    );
}
