//! End-to-end runs of the command runners against a local project.

use std::fs;
use std::sync::Arc;

use polaris::annotate::AnnotateOptions;
use polaris::cli::{
    render_tree_text, run_annotate, run_complete, run_goto, run_outline, run_search, run_tree,
};
use polaris::error::{OutputErrorCode, PolarisError};
use polaris::expand::TreeExpander;
use polaris::local::{file_id, LocalProject};
use polaris::observer::RequestCounters;
use polaris::service::SourceSelector;
use polaris::types::{EntityId, EntityRef, UsageKind};

const APP: &str = "class App {\n  Foo foo = new Foo();\n}\n";

fn usages() -> serde_json::Value {
    let foo = serde_json::json!({
        "file": {"project": "demo", "path": "/src/Foo.java", "id": 2, "kind": "NORMAL_FILE"},
        "span": {"from": {"line": 0, "column": 6}, "to": {"line": 0, "column": 9}}
    });
    serde_json::json!([
        {
            "span": {"from": {"line": 1, "column": 2}, "to": {"line": 1, "column": 5}},
            "kind": "TYPE", "entityId": 5, "jumpTarget": foo, "definitionJumpTarget": foo
        },
        {
            "span": {"from": {"line": 1, "column": 16}, "to": {"line": 1, "column": 19}},
            "kind": "TYPE", "entityId": 5, "jumpTarget": foo
        }
    ])
}

fn demo() -> (tempfile::TempDir, LocalProject) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src/util")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("src/App.java"), APP).unwrap();
    fs::write(root.join("src/App.java.usages.json"), usages().to_string()).unwrap();
    fs::write(root.join("src/Foo.java"), "class Foo {}\n").unwrap();
    fs::write(root.join("src/util/Strings.java"), "class Strings {}\n").unwrap();
    fs::write(root.join("docs/guide.md"), "Use Foo wisely.\n").unwrap();
    let project = LocalProject::new("demo", root, ".usages.json");
    (dir, project)
}

#[tokio::test]
async fn annotate_json_groups_entity_occurrences() {
    let (_dir, project) = demo();
    let output = run_annotate(
        &project,
        SourceSelector::by_path("demo", "/src/App.java"),
        AnnotateOptions::default(),
        false,
        Arc::new(RequestCounters::new()),
    )
    .await
    .unwrap();
    assert_eq!(output.code, None);

    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["lines"], 3);
    assert_eq!(json["file"]["id"], file_id("demo", "/src/App.java").0);
    assert_eq!(json["entityIndex"]["5"], serde_json::json!([1, 3]));
    let text: String = json["segments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["text"].as_str().unwrap())
        .collect();
    assert_eq!(text, APP);
}

#[tokio::test]
async fn annotate_html_links_to_definition() {
    let (_dir, project) = demo();
    let id = file_id("demo", "/src/App.java");
    let output = run_annotate(
        &project,
        SourceSelector::ById(id),
        AnnotateOptions::default(),
        true,
        Arc::new(RequestCounters::new()),
    )
    .await
    .unwrap();
    assert!(output
        .body
        .contains("href=\"demo/src/Foo.java?line=0\">Foo</a>"));
    assert!(output.body.contains("href=\"demo/src/Foo.java?line=0\">Foo</a>();"));
}

#[tokio::test]
async fn missing_file_maps_to_resolution_error() {
    let (_dir, project) = demo();
    let err = run_annotate(
        &project,
        SourceSelector::by_path("demo", "/src/Nope.java"),
        AnnotateOptions::default(),
        false,
        Arc::new(RequestCounters::new()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PolarisError::FileNotFound { .. }));
    assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);
}

#[tokio::test]
async fn tree_expands_real_directories() {
    let (_dir, project) = demo();
    let counters = Arc::new(RequestCounters::new());
    let targets = vec!["/src/util/Strings.java".to_string(), "/src/App.java".to_string()];
    let output = run_tree("demo", project.clone(), &targets, true, counters.clone())
        .await
        .unwrap();
    assert_eq!(output.code, None);
    assert_eq!(
        output.body,
        "docs/\nsrc/\n  util/\n    Strings.java\n  App.java\n  Foo.java\n"
    );
    assert_eq!(counters.snapshot().fetches, 3);

    let expander = TreeExpander::new("demo", project);
    expander.expand(["/docs/"]).await;
    let text = expander.with_store(render_tree_text);
    assert_eq!(text, "docs/\n  guide.md\nsrc/\n");
}

#[tokio::test]
async fn tree_reports_partial_failure() {
    let (_dir, project) = demo();
    let targets = vec!["/src/App.java".to_string(), "/src/missing/X.java".to_string()];
    let output = run_tree(
        "demo",
        project,
        &targets,
        false,
        Arc::new(RequestCounters::new()),
    )
    .await
    .unwrap();
    assert_eq!(output.code, Some(OutputErrorCode::ResolutionError));
    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["status"], "partial");
    assert_eq!(json["resolved"][0]["path"], "/src/App.java");
    assert_eq!(json["failures"][0]["target"], "/src/missing/X.java");
}

#[tokio::test]
async fn complete_and_search_emit_envelopes() {
    let (_dir, project) = demo();
    let output = run_complete(&project, "st", 8, Arc::new(RequestCounters::new()))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["choices"][0]["name"], "Strings.java");
    assert_eq!(json["choices"][0]["url"], "demo/src/util/Strings.java");

    let err = run_complete(&project, "", 8, Arc::new(RequestCounters::new()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), OutputErrorCode::InvalidArguments);

    let output = run_search(&project, "Foo", 10).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["count"], 3);
    assert_eq!(json["hits"][0]["jumpTarget"]["file"]["path"], "/docs/guide.md");
}

fn write_foo_types(root: &std::path::Path) {
    let at = |line: u32, from: u32, to: u32| {
        serde_json::json!({
            "file": {"project": "demo", "path": "/src/Foo.java", "id": 2, "kind": "NORMAL_FILE"},
            "span": {"from": {"line": line, "column": from}, "to": {"line": line, "column": to}}
        })
    };
    let types = serde_json::json!([{
        "id": 5,
        "name": "demo.Foo",
        "jumpTarget": at(0, 6, 9),
        "methods": [{
            "id": 6,
            "name": "demo.Foo#<init>",
            "parameterTypes": ["java.lang.String"],
            "returnType": "void",
            "jumpTarget": at(0, 6, 9)
        }]
    }]);
    fs::write(root.join("src/Foo.java.types.json"), types.to_string()).unwrap();
}

#[tokio::test]
async fn outline_and_goto_use_declared_types() {
    let (dir, project) = demo();
    write_foo_types(dir.path());

    let output = run_outline(&project, SourceSelector::by_path("demo", "/src/Foo.java"))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["file"]["path"], "/src/Foo.java");
    assert_eq!(json["types"][0]["label"], "Foo");
    assert_eq!(json["types"][0]["members"][0]["label"], "constructor(String): void");

    // The type a usage in App.java links to resolves to its declaration.
    let entity = EntityRef {
        kind: UsageKind::Type,
        id: EntityId(5),
    };
    let output = run_goto(&project, entity).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["url"], "demo/src/Foo.java?line=0");

    let missing = EntityRef {
        kind: UsageKind::Variable,
        id: EntityId(5),
    };
    let err = run_goto(&project, missing).await.unwrap_err();
    assert_eq!(err.error_code(), OutputErrorCode::ResolutionError);

    // Files without declared types have an empty outline.
    let output = run_outline(&project, SourceSelector::by_path("demo", "/docs/guide.md"))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&output.body).unwrap();
    assert_eq!(json["types"], serde_json::json!([]));
}
