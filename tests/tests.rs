//! Integration tests for `chat_cloud`.
//
// This suite verifies:
// - Library behavior end to end (tokenize, normalize, pipeline, reports) through the public API
// - CLI behavior: subcommands, JSON envelope, stdin upload, stopwords, exports, failures
//
// Notes:
// - CLI runs pass a nonexistent --font so no image is produced; tests never depend on system fonts.
// - Fixture databases are built with rusqlite in per-test temp dirs.

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use rusqlite::{Connection, params};
use serde_json::Value as Json;
use tempfile::tempdir;

use chat_cloud::normalize::{RawFrequency, Tier};
use chat_cloud::{
    AnalysisError, AnalysisResult, CloudPipeline, RenderError, Renderer, SegmenterKind,
    TermFilter, Tokenizer, WeightedTermSet, closest_contact, group_activity, list_groups,
    normalize, open_export,
};

// --------------------- helpers ---------------------

const NO_FONT: &str = "/nonexistent/chat_cloud/font.ttf";

/// Build a small chat export at `path`.
fn build_export(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE WL_MSG (room_name TEXT, talker TEXT, type_name TEXT, content TEXT,
                              CreateTime INTEGER, Is_sender INTEGER);
         CREATE TABLE Contact (UserName TEXT, NickName TEXT, Remark TEXT);
         INSERT INTO Contact VALUES ('wxid_lin', NULL, 'Lin');
         INSERT INTO Contact VALUES ('42@chatroom', 'Book Club', NULL);
         INSERT INTO Contact VALUES ('7@chatroom', '', NULL);",
    )
    .unwrap();

    let day = 86_400;
    for i in 0..20 {
        conn.execute(
            "INSERT INTO WL_MSG VALUES ('wxid_lin', 'wxid_lin', '文本', ?1, ?2, 0)",
            params![
                format!("dinner plans tonight, dinner at {}", i % 4),
                1_700_000_000 + (i % 5) * day
            ],
        )
        .unwrap();
    }
    for _ in 0..5 {
        conn.execute(
            "INSERT INTO WL_MSG VALUES ('wxid_lin', 'me', '文本', 'dinner sounds great', 1700000000, 1)",
            [],
        )
        .unwrap();
    }
    // system notices never count towards the ranking
    for _ in 0..30 {
        conn.execute(
            "INSERT INTO WL_MSG VALUES ('wxid_sys', 'wxid_sys', '系统通知', 'update available', 1700000000, 0)",
            [],
        )
        .unwrap();
    }
    for (talker, text, ts) in [
        ("ann", "chapter seven chapter eight", 1_700_300_000),
        ("ben", "chapter seven was long", 1_700_400_000),
        ("cai", "{\"content\":\"next meeting friday\"}", 1_700_500_000),
    ] {
        conn.execute(
            "INSERT INTO WL_MSG VALUES ('42@chatroom', ?1, '文本', ?2, ?3, 0)",
            params![talker, text, ts],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO WL_MSG VALUES ('7@chatroom', 'dan', '文本', 'hello', 1600000000, 0)",
        [],
    )
    .unwrap();
}

/// Export in a fresh temp dir.
fn export_in(dir: &assert_fs::TempDir) -> PathBuf {
    let path = dir.child("export.db").path().to_path_buf();
    build_export(&path);
    path
}

/// Run CLI with a specific working directory and parse its JSON stdout.
fn run_cli_json(dir: &Path, args: &[&str], expect_success: bool) -> Json {
    let mut cmd = assert_cmd::Command::cargo_bin("chat_cloud").unwrap();
    cmd.current_dir(dir);
    cmd.args(args);
    let assert = if expect_success {
        cmd.assert().success()
    } else {
        cmd.assert().failure()
    };
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    serde_json::from_str(stdout.trim()).expect("valid json envelope")
}

/// Renderer that always fails, like a host without fonts.
struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _: &WeightedTermSet) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::FontUnavailable("none".into()))
    }
}

/// Renderer returning a fixed byte string.
struct FixedRenderer;

impl Renderer for FixedRenderer {
    fn render(&self, _: &WeightedTermSet) -> Result<Vec<u8>, RenderError> {
        Ok(b"png".to_vec())
    }
}

fn words_pipeline<R: Renderer>(renderer: R) -> CloudPipeline<R> {
    CloudPipeline::new(
        Tokenizer::new(SegmenterKind::Words, TermFilter::default()),
        renderer,
    )
}

// --------------------- library tests ---------------------

#[test]
fn lib_distinct_terms_capped_at_thirty() {
    for distinct in [1usize, 9, 10, 11, 29, 30, 31, 80] {
        let tokens: Vec<String> = (0..distinct)
            .flat_map(|i| std::iter::repeat_n(format!("term{i}"), 1 + i % 4))
            .collect();
        let set = normalize(&tokens).unwrap();
        assert_eq!(set.distinct_terms(), distinct.min(30), "distinct={distinct}");
        assert!(set.iter().all(|e| e.weight.is_finite() && e.weight > 0.0));
    }
}

#[test]
fn lib_degenerate_distribution_weights() {
    let tokens: Vec<String> = (0..25).map(|i| format!("w{i}")).collect();
    let set = normalize(&tokens).unwrap();
    for e in &set {
        match (e.tier, e.variant_index) {
            (Tier::High, _) => assert_eq!(e.weight, 80.0),
            (Tier::Mid, 0) => assert_eq!(e.weight, 35.0),
            (Tier::Mid, _) => assert_eq!(e.weight, 28.0),
            (Tier::Low, _) => assert!([13.5, 15.0, 17.0, 15.3, 17.1, 19.0]
                .iter()
                .any(|w| (w - e.weight).abs() < 1e-9)),
        }
    }
}

#[test]
fn lib_raw_frequency_counts() {
    let freq = RawFrequency::from_terms(["猫", "狗", "猫"]);
    assert_eq!(freq.len(), 2);
    assert_eq!(freq.get("猫"), Some(2));
    assert_eq!(freq.get("鱼"), None);
}

#[test]
fn lib_chinese_text_end_to_end() {
    let tokenizer = Tokenizer::new(SegmenterKind::Jieba, TermFilter::default());
    let terms = tokenizer.tokenize("我们今天一起去公园散步，然后我们去吃火锅。火锅真好吃！");
    assert!(!terms.is_empty());
    assert!(terms.iter().all(|t| t.chars().count() >= 2));
    assert!(terms.iter().all(|t| t != "的" && t != "了"));
    let set = normalize(&terms).unwrap();
    assert!(set.distinct_terms() <= 30);
}

#[test]
fn lib_reports_survive_renderer_failure() {
    let td = assert_fs::TempDir::new().unwrap();
    let conn = open_export(&export_in(&td)).unwrap();
    let result = group_activity(&conn, "42@chatroom", &words_pipeline(FailingRenderer)).unwrap();
    assert_eq!(result.text, "[Book Club] has 3 message records.\n");
    assert!(result.wordcloud.is_none());
    // the weights were still computed
    let cloud = result.cloud.unwrap();
    assert!(cloud.png.is_none());
    assert_eq!(cloud.terms.get("chapter", 0), Some(120.0));
}

#[test]
fn lib_closest_contact_falls_back_to_remark() {
    let td = assert_fs::TempDir::new().unwrap();
    let conn = open_export(&export_in(&td)).unwrap();
    let result = closest_contact(&conn, &words_pipeline(FixedRenderer)).unwrap();
    assert!(result.text.starts_with("Your closest contact is [Lin]"));
    assert!(result.text.contains("You talked on 5 days"));
    assert!(result.text.contains("Received 20 messages"));
    assert!(result.text.contains("Sent 5 messages"));
    assert!(result.text.contains("5.0 messages per day"));
    assert_eq!(result.wordcloud.as_deref(), Some("cG5n"));
    let terms = &result.cloud.unwrap().terms;
    assert_eq!(terms.primaries().next().unwrap().source_term, "dinner");
}

#[test]
fn lib_open_export_validates_schema() {
    let td = tempdir().unwrap();
    let path = td.path().join("empty.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE WL_MSG (room_name TEXT);")
        .unwrap();
    assert!(matches!(
        open_export(&path),
        Err(AnalysisError::MissingTables)
    ));

    let bad_columns = td.path().join("columns.db");
    Connection::open(&bad_columns)
        .unwrap()
        .execute_batch(
            "CREATE TABLE WL_MSG (room_name TEXT);
             CREATE TABLE Contact (UserName TEXT, NickName TEXT, Remark TEXT);",
        )
        .unwrap();
    assert!(matches!(
        open_export(&bad_columns),
        Err(AnalysisError::Database(_))
    ));

    let garbage = td.path().join("garbage.db");
    fs::write(&garbage, b"definitely not sqlite, just some bytes padding it out").unwrap();
    assert!(open_export(&garbage).is_err());
}

#[test]
fn lib_group_listing_labels() {
    let td = assert_fs::TempDir::new().unwrap();
    let conn = open_export(&export_in(&td)).unwrap();
    let groups = list_groups(&conn).unwrap();
    let re = Regex::new(r"^Book Club \(\d{4}-\d{2}-\d{2}\)$").unwrap();
    assert_eq!(groups[0].room_name, "42@chatroom");
    assert!(re.is_match(&groups[0].nickname), "{}", groups[0].nickname);
    // empty nickname falls back to the room id
    assert!(groups[1].nickname.starts_with("7@chatroom ("));
}

#[test]
fn lib_analysis_result_serialises_without_cloud_internals() {
    let r = AnalysisResult::text_only("x");
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v, serde_json::json!({"text": "x", "wordcloud": null}));
}

// --------------------- CLI tests ---------------------

#[test]
fn cli_missing_database_fails_with_envelope() {
    let td = tempdir().unwrap();
    let v = run_cli_json(td.path(), &["friend", "does_not_exist.db", "--font", NO_FONT], false);
    assert_eq!(v["success"], false);
    assert!(v["error"].as_str().unwrap().len() > 0);
}

#[test]
fn cli_rejects_non_db_extension() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = td.child("export.sqlite");
    f.write_str("whatever").unwrap();
    let v = run_cli_json(td.path(), &["groups", f.path().to_str().unwrap()], false);
    assert!(v["error"].as_str().unwrap().contains(".db"));
}

#[test]
fn cli_groups_lists_rooms() {
    let td = assert_fs::TempDir::new().unwrap();
    let db = export_in(&td);
    let v = run_cli_json(td.path(), &["groups", db.to_str().unwrap()], true);
    assert_eq!(v["success"], true);
    let groups = v["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["room_name"], "42@chatroom");
}

#[test]
fn cli_group_report_with_term_export() {
    let td = assert_fs::TempDir::new().unwrap();
    let db = export_in(&td);
    let out = td.child("terms.csv");
    let v = run_cli_json(
        td.path(),
        &[
            "group",
            db.to_str().unwrap(),
            "--group-id",
            "42@chatroom",
            "--segmenter",
            "words",
            "--font",
            NO_FONT,
            "--export-terms",
            out.path().to_str().unwrap(),
            "--export-format",
            "csv",
        ],
        true,
    );
    assert_eq!(v["result"]["text"], "[Book Club] has 3 message records.\n");
    assert!(v["result"]["wordcloud"].is_null());
    out.assert(predicate::str::starts_with("term,variant,tier,weight\nchapter,0,high,120.000"));
}

#[test]
fn cli_friend_reads_database_from_stdin() {
    let td = assert_fs::TempDir::new().unwrap();
    let db = export_in(&td);
    let bytes = fs::read(&db).unwrap();

    let mut cmd = assert_cmd::Command::cargo_bin("chat_cloud").unwrap();
    cmd.current_dir(td.path())
        .args(["friend", "-", "--segmenter", "words", "--font", NO_FONT])
        .write_stdin(bytes)
        .assert()
        .success()
        .stdout(predicate::str::contains("Received 20 messages"))
        .stdout(predicate::str::contains("\"success\":true"));
}

#[test]
fn cli_unknown_group_reports_no_data() {
    let td = assert_fs::TempDir::new().unwrap();
    let db = export_in(&td);
    let v = run_cli_json(
        td.path(),
        &["group", db.to_str().unwrap(), "--group-id", "nope@chatroom", "--font", NO_FONT],
        true,
    );
    assert_eq!(v["result"]["text"], "No data available.");
}

#[test]
fn cli_cloud_honours_stopwords_and_exports_json() {
    let td = assert_fs::TempDir::new().unwrap();
    let text = td.child("chat.txt");
    text.write_str("Alice meets Bob. Alice meets Carol. Alice waves.").unwrap();
    let stop = td.child("stop.txt");
    stop.write_str("# noise\nmeets\n").unwrap();
    let export = td.child("terms.json");

    let v = run_cli_json(
        td.path(),
        &[
            "cloud",
            text.path().to_str().unwrap(),
            "--stopwords",
            stop.path().to_str().unwrap(),
            "--segmenter",
            "words",
            "--font",
            NO_FONT,
            "--export-terms",
            export.path().to_str().unwrap(),
            "--export-format",
            "json",
        ],
        true,
    );
    assert_eq!(v["result"]["text"], "4 distinct terms in the cloud (4 entries).\n");

    let rows: Json = serde_json::from_str(&fs::read_to_string(export.path()).unwrap()).unwrap();
    let terms: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["term"].as_str().unwrap())
        .collect();
    assert_eq!(terms[0], "alice");
    assert!(!terms.contains(&"meets"));
}

#[test]
fn cli_min_chars_filters_short_terms() {
    let td = assert_fs::TempDir::new().unwrap();
    let text = td.child("short.txt");
    text.write_str("ok ok fine fine fine").unwrap();
    let v = run_cli_json(
        td.path(),
        &[
            "cloud",
            text.path().to_str().unwrap(),
            "--segmenter",
            "words",
            "--min-chars",
            "3",
            "--font",
            NO_FONT,
        ],
        true,
    );
    assert_eq!(v["result"]["text"], "1 distinct term in the cloud (1 entry).\n");
}

#[test]
fn cli_missing_stopword_file_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    let text = td.child("t.txt");
    text.write_str("hello world").unwrap();
    let v = run_cli_json(
        td.path(),
        &["cloud", text.path().to_str().unwrap(), "--stopwords", "missing.txt"],
        false,
    );
    assert!(v["error"].as_str().unwrap().contains("stopwords"));
}

#[test]
fn cli_default_segmenter_keeps_chinese_in_mixed_chat() {
    let td = assert_fs::TempDir::new().unwrap();
    let text = td.child("mixed.txt");
    text.write_str(
        "晚上一起吃火锅吗\n\
         https://maps.example.com/restaurant/hotpot-downtown-location\n\
         火锅太好吃了\n\
         see you tonight at seven okay\n\
         我们明天见\n",
    )
    .unwrap();
    let export = td.child("terms.json");

    run_cli_json(
        td.path(),
        &[
            "cloud",
            text.path().to_str().unwrap(),
            "--font",
            NO_FONT,
            "--export-terms",
            export.path().to_str().unwrap(),
            "--export-format",
            "json",
        ],
        true,
    );

    let rows: Json = serde_json::from_str(&fs::read_to_string(export.path()).unwrap()).unwrap();
    let terms: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["term"].as_str().unwrap())
        .collect();
    assert_eq!(terms[0], "火锅", "{terms:?}");
    assert!(terms.contains(&"tonight"), "{terms:?}");
}
