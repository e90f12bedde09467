use std::path::PathBuf;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pulsar::cloud::auth::{AuthSession, Tokens, decode_token, is_token_expired_at, login_url, token_subject};
use pulsar::editor::store::GraphStore;
use pulsar::graph_utils::graph::{Graph, NodePatch};
use pulsar::persistence::autosave::{Autosaver, ChangeTracker, Debouncer};
use pulsar::persistence::document::DiagramDocument;
use pulsar::persistence::persist::{AUTH_KEY, AUTOSAVE_KEY, LocalStore, export_to_dir, load_from_path};
use pulsar::persistence::settings::{AppSettings, AuthSettings};
use serde_json::json;

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pulsar-test-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

// A JWT-shaped string; the signature part is never checked.
fn make_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

fn tokens_expiring_at(exp: i64) -> Tokens {
    Tokens {
        access_token: make_token(json!({"sub": "user-1", "exp": exp})),
        id_token: make_token(json!({"sub": "user-1", "email": "ada@example.com", "exp": exp})),
        refresh_token: None,
    }
}

// Local storage

#[test]
fn autosave_document_survives_a_restart() {
    let store = LocalStore::new(temp_dir("roundtrip"));
    assert!(store.is_available());
    assert!(store.load_document().is_none());

    let graph = Graph::sample();
    store.save_document(&DiagramDocument::from_graph(&graph)).expect("save");
    let restored = store.load_or_default();
    assert_eq!(restored.id, graph.id);
    assert_eq!(restored.nodes, graph.nodes);
    assert_eq!(restored.edges, graph.edges);

    store.clear().expect("clear");
    assert!(store.load_document().is_none());
    // clearing twice is fine
    store.clear().expect("clear again");
}

#[test]
fn invalid_autosave_falls_back_to_sample() {
    let store = LocalStore::new(temp_dir("invalid"));
    store
        .set_raw(AUTOSAVE_KEY, r#"{"nodes":[{"id":"a"}],"edges":[]}"#)
        .expect("write");
    assert!(store.load_document().is_none());
    let g = store.load_or_default();
    assert_eq!(g.nodes, Graph::sample().nodes);
}

#[test]
fn storage_under_a_file_is_unavailable() {
    let dir = temp_dir("blocked");
    let file = dir.join("not-a-dir");
    std::fs::write(&file, "x").expect("write file");
    let store = LocalStore::new(file.join("store"));
    assert!(!store.is_available());
}

#[test]
fn versions_are_listed_newest_first() {
    let store = LocalStore::new(temp_dir("versions"));
    let doc = DiagramDocument::from_graph(&Graph::sample());
    for name in ["state_20240101_000000.json", "state_20240301_120000.json", "state_20240201_000000.json"] {
        std::fs::write(store.dir().join(name), serde_json::to_string(&doc).expect("json")).expect("write");
    }
    std::fs::write(store.dir().join("notes.txt"), "ignored").expect("write");
    let saved = store.save_versioned(&doc).expect("backup");

    let versions = store.list_versions().expect("list");
    assert_eq!(versions.len(), 4);
    assert_eq!(versions[0], saved);
    let names: Vec<String> = versions[1..]
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();
    assert_eq!(names, ["state_20240301_120000.json", "state_20240201_000000.json", "state_20240101_000000.json"]);
}

#[test]
fn back_to_back_backups_do_not_overwrite_each_other() {
    let store = LocalStore::new(temp_dir("backups"));
    let mut first = Graph::sample();
    first.rename("First");
    let mut second = Graph::new("Second");
    second.add_node();

    let a = store.save_versioned(&DiagramDocument::from_graph(&first)).expect("first backup");
    let b = store.save_versioned(&DiagramDocument::from_graph(&second)).expect("second backup");
    let c = store.save_versioned(&DiagramDocument::from_graph(&second)).expect("third backup");
    assert_ne!(a, b);
    assert_ne!(b, c);

    assert_eq!(store.list_versions().expect("list"), [c.clone(), b.clone(), a.clone()]);
    assert_eq!(load_from_path(&a).expect("first").name, "First");
    assert_eq!(load_from_path(&b).expect("second").name, "Second");
}

#[test]
fn export_writes_named_file_that_imports_back() {
    let dir = temp_dir("export");
    let mut graph = Graph::sample();
    graph.rename("Order Pipeline");
    let doc = DiagramDocument::from_graph(&graph);
    let path = export_to_dir(&doc, &dir.join("out")).expect("export");

    let name = path.file_name().and_then(|n| n.to_str()).expect("file name");
    assert!(name.starts_with("pulsar-diagram-order-pipeline-"), "{}", name);
    assert!(name.ends_with(".json"));
    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.ends_with('\n'));

    let back = load_from_path(&path).expect("import");
    assert_eq!(back, doc);
}

#[test]
fn importing_a_broken_file_reports_errors() {
    let dir = temp_dir("broken");
    let path = dir.join("broken.json");
    std::fs::write(&path, r#"{"nodes": [], "edges": [{"id": "e", "source": "x", "target": "y"}]}"#).expect("write");
    let err = load_from_path(&path).expect_err("dangling edge");
    let msg = err.to_string();
    assert!(msg.contains(r#"Edge 0: source "x" not found in nodes"#), "{}", msg);
    assert!(msg.contains(r#"Edge 0: target "y" not found in nodes"#), "{}", msg);
}

// Settings

#[test]
fn settings_fill_defaults_from_partial_files() {
    let s: AppSettings = serde_json::from_str(r#"{"api_port": 9000}"#).expect("json settings");
    assert_eq!(s.api_port, 9000);
    assert_eq!(s.autosave_debounce(), Duration::from_millis(500));
    assert_eq!(s.api_endpoint(), "127.0.0.1:9000");
    assert_eq!(s.auth.scope, "openid email profile");
    assert!(!s.auth.is_configured());
}

#[test]
fn settings_round_trip_through_the_settings_dir() {
    let dir = temp_dir("settings");
    assert_eq!(AppSettings::load_from(&dir).expect("missing file"), AppSettings::default());

    let s = AppSettings {
        autosave_debounce_ms: 250,
        cloud_api_url: Some("https://diagrams.example.com/prod".into()),
        ..AppSettings::default()
    };
    s.save_to(&dir).expect("save");
    assert!(dir.join("settings.json").exists());
    assert_eq!(AppSettings::load_from(&dir).expect("load"), s);

    std::fs::write(dir.join("settings.json"), "{ not json").expect("write");
    assert!(AppSettings::load_from(&dir).is_err());
}

#[test]
fn directory_overrides_win() {
    let dir = temp_dir("overrides");
    let s = AppSettings {
        autosave_override: Some(dir.join("autosave")),
        export_override: Some(dir.join("exports")),
        api_log_override: Some(dir.join("logs")),
        ..AppSettings::default()
    };
    assert_eq!(s.autosave_dir(), dir.join("autosave"));
    assert_eq!(s.export_dir(), dir.join("exports"));
    assert_eq!(s.api_log_dir(), dir.join("logs"));
    assert_eq!(LocalStore::from_settings(&s).dir(), dir.join("autosave").as_path());
}

// Debounce and autosave

#[test]
fn debouncer_fires_once_for_the_latest_schedule() {
    let t0 = Instant::now();
    let mut d = Debouncer::new(Duration::from_millis(500));
    assert!(!d.poll(t0));
    d.schedule(t0);
    d.schedule(t0 + Duration::from_millis(300));
    assert!(!d.poll(t0 + Duration::from_millis(500)));
    assert!(d.is_pending());
    assert!(d.poll(t0 + Duration::from_millis(800)));
    assert!(!d.poll(t0 + Duration::from_millis(900)));
    assert!(!d.is_pending());

    d.schedule(t0);
    d.cancel();
    assert!(!d.poll(t0 + Duration::from_secs(5)));
}

#[test]
fn autosave_waits_for_quiet_period() {
    let storage = LocalStore::new(temp_dir("autosave"));
    let mut store = GraphStore::default();
    let mut saver = Autosaver::new(storage.clone(), Duration::from_millis(500), &mut store);
    let t0 = Instant::now();

    let id = store.add_node();
    assert_eq!(saver.tick(&store, t0), None);
    store.update_node(&id, NodePatch { label: Some("Queue".into()), ..Default::default() });
    assert_eq!(saver.tick(&store, t0 + Duration::from_millis(200)), None);
    // 500ms after the first edit, but only 300ms after the last one
    assert_eq!(saver.tick(&store, t0 + Duration::from_millis(500)), None);

    let path = saver.tick(&store, t0 + Duration::from_millis(700)).expect("saved");
    assert_eq!(saver.last_saved(), Some(&path));
    let saved = storage.load_document().expect("autosave on disk");
    assert_eq!(saved.id.as_deref(), Some(store.diagram_id()));
    assert!(saved.nodes.iter().any(|n| n.label == "Queue"));

    // selection changes alone do not trigger a save
    store.clear_selection();
    assert_eq!(saver.tick(&store, t0 + Duration::from_secs(2)), None);
    assert!(!saver.is_pending());
}

#[test]
fn cancelled_autosave_never_writes() {
    let storage = LocalStore::new(temp_dir("cancel"));
    let mut store = GraphStore::default();
    let mut saver = Autosaver::new(storage.clone(), Duration::from_millis(500), &mut store);
    let t0 = Instant::now();
    store.add_node();
    saver.tick(&store, t0);
    saver.cancel();
    assert_eq!(saver.tick(&store, t0 + Duration::from_secs(1)), None);
    assert!(storage.load_document().is_none());
}

#[test]
fn flush_writes_pending_save_immediately() {
    let storage = LocalStore::new(temp_dir("flush"));
    let mut store = GraphStore::default();
    let mut saver = Autosaver::new(storage.clone(), Duration::from_secs(60), &mut store);
    assert_eq!(saver.flush(&store), None);
    store.rename("Flushed");
    saver.tick(&store, Instant::now());
    assert!(saver.flush(&store).is_some());
    assert_eq!(storage.load_document().map(|d| d.name), Some("Flushed".to_string()));
}

#[test]
fn autosave_disables_itself_without_storage() {
    let dir = temp_dir("nostorage");
    let file = dir.join("file");
    std::fs::write(&file, "x").expect("write");
    let mut store = GraphStore::default();
    let mut saver = Autosaver::new(LocalStore::new(file.join("x")), Duration::ZERO, &mut store);
    assert!(!saver.is_enabled());
    store.add_node();
    assert_eq!(saver.tick(&store, Instant::now()), None);
}

#[test]
fn new_diagram_backs_up_non_empty_work() {
    let storage = LocalStore::new(temp_dir("backup"));
    let mut store = GraphStore::default();
    let old_id = store.diagram_id().to_string();
    let mut saver = Autosaver::new(storage.clone(), Duration::from_millis(500), &mut store);

    let backup = saver.new_diagram(&mut store).expect("backup written");
    assert!(store.graph().is_empty());
    let restored = load_from_path(&backup).expect("backup readable");
    assert_eq!(restored.id.as_deref(), Some(old_id.as_str()));
    assert_eq!(storage.list_versions().expect("list"), vec![backup]);

    // an empty diagram is not worth a backup
    assert_eq!(saver.new_diagram(&mut store), None);
}

#[test]
fn change_tracker_only_marks_signed_in_edits() {
    let mut g = Graph::sample();
    let mut tracker = ChangeTracker::new(&g);
    g.rename("Changed");
    assert!(!tracker.observe(&g, false));
    assert!(tracker.observe(&g, true));

    // stays dirty even when the edit is undone
    g.rename("Untitled Diagram");
    assert!(tracker.observe(&g, true));
    tracker.mark_synced(&g);
    assert!(!tracker.has_unsaved_changes());
    assert!(!tracker.observe(&g, true));

    tracker.mark_dirty();
    assert!(tracker.has_unsaved_changes());
    tracker.reset();
    assert!(!tracker.has_unsaved_changes());
}

// Auth

#[test]
fn token_claims_decode_without_verification() {
    let token = make_token(json!({"sub": "abc", "email": "a@b.c"}));
    assert_eq!(token_subject(&token).as_deref(), Some("abc"));
    assert_eq!(decode_token(&token).and_then(|c| c.get("email").cloned()), Some(json!("a@b.c")));
    assert!(decode_token("garbage").is_none());
    assert!(decode_token("a.!!!.c").is_none());
}

#[test]
fn expiry_includes_a_sixty_second_buffer() {
    let now = 1_700_000_000;
    assert!(is_token_expired_at(&make_token(json!({"exp": now + 30})), now));
    assert!(is_token_expired_at(&make_token(json!({"exp": now + 60})), now));
    assert!(!is_token_expired_at(&make_token(json!({"exp": now + 61})), now));
    assert!(is_token_expired_at(&make_token(json!({"sub": "no-exp"})), now));
    assert!(is_token_expired_at("not-a-token", now));
}

#[test]
fn out_of_range_expiry_claims_do_not_overflow() {
    let now = 1_700_000_000;
    assert!(is_token_expired_at(&make_token(json!({"sub": "u", "exp": -1e300})), now));
    assert!(is_token_expired_at(&make_token(json!({"sub": "u", "exp": i64::MIN})), now));
    assert!(is_token_expired_at(&make_token(json!({"sub": "u", "exp": -1e300})), i64::MIN));
    assert!(!is_token_expired_at(&make_token(json!({"sub": "u", "exp": 1e300})), now));
    assert!(!is_token_expired_at(&make_token(json!({"sub": "u", "exp": u64::MAX})), i64::MAX - 1));
}

#[test]
fn auth_tokens_persist_across_sessions() {
    let storage = LocalStore::new(temp_dir("auth"));
    let mut session = AuthSession::restore(storage.clone());
    assert!(!session.is_authenticated());
    session.set_tokens(tokens_expiring_at(now_unix() + 3600));
    assert!(storage.get_raw(AUTH_KEY).expect("read").is_some());

    let mut restored = AuthSession::restore(storage.clone());
    assert!(restored.is_authenticated());
    assert_eq!(
        restored.user_claims().and_then(|c| c.get("email")).and_then(|v| v.as_str()),
        Some("ada@example.com")
    );
    assert!(restored.access_token().is_some());

    restored.logout();
    assert!(!restored.is_authenticated());
    assert!(storage.get_raw(AUTH_KEY).expect("read").is_none());
}

#[test]
fn expired_tokens_are_dropped_on_restore_and_use() {
    let storage = LocalStore::new(temp_dir("expired"));
    let mut session = AuthSession::restore(storage.clone());
    session.set_tokens(tokens_expiring_at(now_unix() - 10));
    assert!(!AuthSession::restore(storage.clone()).is_authenticated());
    assert!(storage.get_raw(AUTH_KEY).expect("read").is_none());

    let mut live = AuthSession::anonymous();
    let exp = now_unix() + 3600;
    live.set_tokens(tokens_expiring_at(exp));
    assert!(live.access_token_at(exp - 120).is_some());
    assert!(live.access_token_at(exp).is_none());
    assert!(!live.is_authenticated());
}

#[test]
fn login_url_carries_the_code_flow_parameters() {
    let settings = AuthSettings {
        cognito_domain: "auth.example.com".into(),
        client_id: "client-123".into(),
        redirect_uri: "http://localhost:5173/callback".into(),
        scope: "openid email profile".into(),
    };
    let url = login_url(&settings).expect("url");
    assert_eq!(url.host_str(), Some("auth.example.com"));
    assert_eq!(url.path(), "/login");
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("client_id".into(), "client-123".into())));
    assert!(pairs.contains(&("response_type".into(), "code".into())));
    assert!(pairs.contains(&("redirect_uri".into(), "http://localhost:5173/callback".into())));
}
