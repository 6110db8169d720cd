// todo-plus/tests/end_to_end.rs

use std::fs;
use std::path::Path;

use todo_plus::{
    ConfigResolver, LanguageInfo, SIDECAR_FILE_NAME, SidecarDoc, TodoItem, TodoScanner, Workspace,
};

fn read_doc(path: &Path) -> SidecarDoc {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn identity_survives_edits_and_rescans() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("main.rs");
    fs::write(&file, "fn main() {}\n// TODO: investigate flake\n").unwrap();

    let ws = Workspace::open(dir.path()).unwrap();
    assert_eq!(ws.track_file(&file).await.unwrap(), 1);

    let items = ws.scan_file(&file).await.unwrap().unwrap();
    let id = items[0].id.clone().unwrap();
    assert_eq!(items[0].todo_line_index(), 1);

    // Attach metadata and push it into the sidecar. The mutation must land
    // on a strictly newer millisecond than the tracking timestamps.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let mut item = items[0].clone();
    item.add_custom_metadata("assignee", "sam");
    ws.resolver().sync_todos(std::slice::from_mut(&mut item)).await.unwrap();

    // The file is edited: lines added above, the annotation moves.
    let text = fs::read_to_string(&file).unwrap();
    fs::write(&file, format!("// a new header comment\nuse std::fmt;\n\n{text}")).unwrap();

    // A fresh workspace (fresh caches) re-scans and re-joins by embedded id.
    let ws2 = Workspace::open(dir.path()).unwrap();
    let rescanned = ws2.scan_file(&file).await.unwrap().unwrap();
    assert_eq!(rescanned.len(), 1);
    assert_eq!(rescanned[0].id.as_deref(), Some(id.as_str()));
    assert_eq!(rescanned[0].todo_line_index(), 4);
    assert_eq!(
        rescanned[0].custom_metadata,
        Some(vec![("assignee".to_string(), "sam".to_string())])
    );
    assert!(rescanned[0].is_synced());
}

#[tokio::test]
async fn reconciliation_precedence_matches_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(SIDECAR_FILE_NAME),
        r#"{"file.ts": {"xyz1234": {"created": 100, "updated": 100}}}"#,
    )
    .unwrap();
    let resolver = ConfigResolver::new(dir.path());
    let file_uri = dir.path().join("file.ts").to_string_lossy().to_string();

    // Unsynced item: the store wins wholesale.
    let mut unsynced = TodoItem {
        file_uri: file_uri.clone(),
        id: Some("xyz1234".into()),
        ..TodoItem::default()
    };
    resolver
        .sync_todos(std::slice::from_mut(&mut unsynced))
        .await
        .unwrap();
    assert_eq!((unsynced.created, unsynced.updated), (Some(100), Some(100)));

    // Newer item: the item wins field-by-field.
    let mut newer = TodoItem {
        file_uri,
        id: Some("xyz1234".into()),
        updated: Some(200),
        ..TodoItem::default()
    };
    resolver
        .sync_todos(std::slice::from_mut(&mut newer))
        .await
        .unwrap();
    let doc = read_doc(&dir.path().join(SIDECAR_FILE_NAME));
    assert_eq!(doc["file.ts"]["xyz1234"].updated, Some(200));
    assert_eq!(doc["file.ts"]["xyz1234"].created, Some(100));
}

#[tokio::test]
async fn purge_removes_exactly_the_stale_ids() {
    let dir = tempfile::tempdir().unwrap();
    let keep = dir.path().join("keep.rs");
    let other = dir.path().join("other.rs");
    fs::write(&keep, "// TODO(aaaa000001): alive\n").unwrap();
    fs::write(&other, "// TODO(bbbb000002): also alive\n").unwrap();
    fs::write(
        dir.path().join(SIDECAR_FILE_NAME),
        r#"{
            "keep.rs": {
                "aaaa000001": {"created": 1, "updated": 1},
                "cccc000003": {"created": 2, "updated": 2}
            },
            "other.rs": {
                "bbbb000002": {"created": 3, "updated": 3}
            },
            "vanished.rs": {
                "dddd000004": {"created": 4, "updated": 4}
            }
        }"#,
    )
    .unwrap();

    let resolver = ConfigResolver::new(dir.path());
    resolver.purge().await.unwrap();

    let doc = read_doc(&dir.path().join(SIDECAR_FILE_NAME));
    assert_eq!(doc.len(), 2);
    assert_eq!(doc["keep.rs"].len(), 1);
    assert!(doc["keep.rs"].contains_key("aaaa000001"));
    assert!(doc["other.rs"].contains_key("bbbb000002"));
    assert!(!doc.contains_key("vanished.rs"));
}

#[test]
fn round_trip_law_across_comment_syntaxes() {
    let syntaxes = [
        LanguageInfo {
            extensions: vec![".rs".into()],
            line_comment: Some("//".into()),
            block_comment: Some(("/*".into(), "*/".into())),
        },
        LanguageInfo {
            extensions: vec![".py".into()],
            line_comment: Some("#".into()),
            block_comment: Some(("'''".into(), "'''".into())),
        },
        LanguageInfo {
            extensions: vec![".lua".into()],
            line_comment: Some("--".into()),
            block_comment: Some(("--[[".into(), "]]".into())),
        },
    ];
    let descriptions = ["plain single line", "multi\nline\ndescription"];
    for language in &syntaxes {
        for description in descriptions {
            let item = TodoItem {
                file_uri: "/tmp/subject".into(),
                text: description.to_string(),
                id: Some("abc123defg".into()),
                ..TodoItem::default()
            };
            let rendered = item.render(language).unwrap();
            let reparsed = TodoScanner::scan_with_language("/tmp/subject", &rendered, language)
                .unwrap();
            assert_eq!(reparsed.len(), 1, "{language:?} / {description:?}");
            assert_eq!(reparsed[0].id, item.id);
            assert_eq!(reparsed[0].text.trim(), description);
        }
    }
}

#[test]
fn fast_path_holds_for_any_syntax() {
    let text = "nothing to see here\njust code\n";
    assert!(TodoScanner::scan("/tmp/x", text, Some("//"), None).unwrap().is_empty());
    assert!(
        TodoScanner::scan("/tmp/x", text, None, Some(&("(*".to_string(), "*)".to_string())))
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn nested_sidecars_partition_by_nearest_ancestor() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("crates").join("core");
    fs::create_dir_all(&sub).unwrap();
    fs::write(dir.path().join(SIDECAR_FILE_NAME), "{}").unwrap();
    fs::write(sub.join(SIDECAR_FILE_NAME), "{}").unwrap();
    fs::write(dir.path().join("top.rs"), "// TODO: top level\n").unwrap();
    fs::write(sub.join("deep.rs"), "// TODO: nested\n").unwrap();

    let ws = Workspace::open(dir.path()).unwrap();
    ws.track_file(&dir.path().join("top.rs")).await.unwrap();
    ws.track_file(&sub.join("deep.rs")).await.unwrap();

    let root_doc = read_doc(&dir.path().join(SIDECAR_FILE_NAME));
    assert!(root_doc.contains_key("top.rs"));
    assert!(!root_doc.contains_key("crates/core/deep.rs"));
    let sub_doc = read_doc(&sub.join(SIDECAR_FILE_NAME));
    assert!(sub_doc.contains_key("deep.rs"));
}
