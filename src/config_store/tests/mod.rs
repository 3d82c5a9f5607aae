//! Unit tests for config_store module
//! No filesystem, timing, or external dependencies.

#![allow(clippy::panic)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde::Deserialize;
use toml::{Table, Value};

use crate::config_store::{
    ConfigError, ConfigLoaded, ConfigStore, Lookup, Source, parse_duration,
};

fn table(src: &str) -> Table {
    match toml::from_str::<Table>(src) {
        Ok(table) => table,
        Err(e) => panic!("bad fixture: {e}"),
    }
}

#[test]
fn unwritten_paths_are_absent_and_yield_defaults() {
    let store = ConfigStore::new();

    assert!(store.get("never.written").is_none());
    assert!(!store.has_key("never.written"));
    assert!(store.get_bool("never.written", true));
    assert!(!store.get_bool("never.written", false));
    assert_eq!(store.get_int("never.written", -3), -3);
    assert_eq!(store.get_uint64("never.written", 7), 7);
    assert_eq!(store.get_float64("never.written", 1.5), 1.5);
    assert_eq!(store.get_string("never.written", "fallback"), "fallback");
    assert_eq!(
        store.get_duration("never.written", Duration::from_secs(9)),
        Duration::from_secs(9)
    );
    assert_eq!(store.get_string_slice("never.written", &["a", "b"]), vec!["a", "b"]);
}

#[test]
fn set_then_get_returns_the_written_value() {
    let store = ConfigStore::new();

    let cases = [
        ("app.a", Value::Boolean(true)),
        ("app.b", Value::Integer(-42)),
        ("app.c", Value::Float(2.5)),
        ("app.d", Value::String("hello".to_string())),
        (
            "app.e",
            Value::Array(vec![Value::String("x".to_string()), Value::String("y".to_string())]),
        ),
    ];

    for (path, value) in cases {
        assert!(store.set(path, value.clone()).is_ok());
        assert_eq!(store.get(path), Some(value));
    }
}

#[test]
fn set_creates_intermediate_tables() {
    let store = ConfigStore::new();
    assert!(store.set("app.server.http.port", 8080).is_ok());

    assert!(store.get_map("app.server").contains_key("http"));
    assert_eq!(store.get_int64("app.server.http.port", 0), 8080);
}

#[test]
fn set_on_empty_or_malformed_path_is_rejected() {
    let store = ConfigStore::new();

    assert!(matches!(store.set("", 1), Err(ConfigError::EmptyPath { .. })));
    assert!(matches!(store.set("a..b", 1), Err(ConfigError::InvalidPath(_))));
    assert!(store.dump_hierarchy().is_empty());
}

#[test]
fn leaf_write_replaces_subtree() {
    let store = ConfigStore::new();
    assert!(store.set("app.logger.level", "debug").is_ok());
    assert!(store.set("app.logger", "off").is_ok());

    assert_eq!(store.get("app.logger"), Some(Value::String("off".to_string())));
    assert!(store.get("app.logger.level").is_none());
}

#[test]
fn merge_scalar_over_map_wins() {
    let store = ConfigStore::new();

    assert!(store.merge_with(table("[a.b]\nc = 1\n")).is_ok());
    assert!(store.merge_with(table("[a]\nb = 5\n")).is_ok());
    assert_eq!(store.get("a.b"), Some(Value::Integer(5)));

    let inverse = ConfigStore::new();
    assert!(inverse.merge_with(table("[a]\nb = 5\n")).is_ok());
    assert!(inverse.merge_with(table("[a.b]\nc = 1\n")).is_ok());
    assert_eq!(inverse.get_map("a.b"), table("c = 1\n"));
}

#[test]
fn merge_list_and_scalar_overwrite_each_other() {
    let store = ConfigStore::new();

    assert!(store.merge_with(table("tags = [\"a\"]\n")).is_ok());
    assert!(store.merge_with(table("tags = \"b\"\n")).is_ok());
    assert_eq!(store.get("tags"), Some(Value::String("b".to_string())));
}

#[test]
fn merge_rejects_non_mapping_input() {
    let store = ConfigStore::new();
    assert!(store.set("keep", 1).is_ok());

    let result = store.merge_with(Value::Integer(3));
    assert!(matches!(result, Err(ConfigError::StructuralMerge { .. })));

    let mut dotted = Table::new();
    dotted.insert("a.b".to_string(), Value::Integer(1));
    let result = store.merge_with(dotted);
    assert!(matches!(result, Err(ConfigError::StructuralMerge { .. })));

    assert_eq!(store.dump_hierarchy(), table("keep = 1\n"));
}

#[test]
fn precedence_follows_layers_not_write_order() {
    let store = ConfigStore::new();

    assert!(store.set_from(Source::Flag, "app.port", 3).is_ok());
    assert!(store.set("app.port", 2).is_ok());
    assert!(store.set_from(Source::Env, "app.port", 1).is_ok());
    assert!(store.set_from(Source::Default, "app.port", 0).is_ok());
    assert!(store.set_from(Source::Default, "app.host", "localhost").is_ok());

    assert_eq!(store.get_int("app.port", -1), 3);
    assert_eq!(store.source_of("app.port"), Some(Source::Flag));
    assert_eq!(store.source_of("app.host"), Some(Source::Default));
    assert_eq!(store.source_of("app.missing"), None);
}

#[test]
fn replace_layer_drops_removed_keys_and_reports_changes() {
    let store = ConfigStore::new();
    assert!(store.replace_layer(Source::File, table("a = 1\nb = 2\n")).is_ok());

    let changes = match store.replace_layer(Source::File, table("a = 3\n")) {
        Ok(changes) => changes,
        Err(e) => panic!("replace failed: {e}"),
    };

    assert_eq!(store.get("a"), Some(Value::Integer(3)));
    assert!(store.get("b").is_none());

    let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["a", "b"]);
}

#[test]
fn reset_clears_values_but_keeps_hooks() {
    let store = ConfigStore::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    store.on_config_loaded(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(store.merge_with(table("x = 1\n")).is_ok());
    assert!(store.reset().is_ok());
    assert!(store.dump_hierarchy().is_empty());
    assert!(store.get("x").is_none());

    assert!(store.merge_with(table("y = 1\n")).is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn prefixed_view_wraps_keys() {
    let store = ConfigStore::new();
    assert!(store.prefixed().set("logger.level", "warn").is_ok());

    assert_eq!(store.get_string("app.logger.level", ""), "warn");
    assert_eq!(store.prefixed().get_string("logger.level", ""), "warn");
    assert_eq!(store.prefixed().within("logger").get_string("level", ""), "warn");
    assert_eq!(store.within("app.logger").get_string("level", ""), "warn");
    assert_eq!(store.wrap_with_prefix("logger.level"), "app.logger.level");
}

#[test]
fn store_without_prefix_uses_raw_keys() {
    let store = ConfigStore::with_prefix(Vec::new());
    assert_eq!(store.wrap_with_prefix("x"), "x");

    assert!(store.prefixed().set("x", true).is_ok());
    assert!(store.get_bool("x", false));
}

#[test]
fn independent_stores_keep_their_own_prefix() {
    let a = ConfigStore::with_prefix(vec!["one".to_string()]);
    let b = ConfigStore::with_prefix(vec!["two".to_string()]);

    assert!(a.prefixed().set("k", 1).is_ok());
    assert!(b.prefixed().set("k", 2).is_ok());

    assert_eq!(a.get_int("one.k", 0), 1);
    assert!(a.get("two.k").is_none());
    assert_eq!(b.get_int("two.k", 0), 2);
}

#[test]
fn numeric_coercion_crosses_representations() {
    let store = ConfigStore::new();
    assert!(store.set("n.int", 42).is_ok());
    assert!(store.set("n.float_whole", 7.0).is_ok());
    assert!(store.set("n.text", "19").is_ok());
    assert!(store.set("n.flag", true).is_ok());

    assert_eq!(store.get_int("n.int", 0), 42);
    assert_eq!(store.get_uint("n.int", 0), 42);
    assert_eq!(store.get_float32("n.int", 0.0), 42.0);
    assert_eq!(store.get_int64("n.float_whole", 0), 7);
    assert_eq!(store.get_uint64("n.text", 0), 19);
    assert_eq!(store.get_int("n.flag", 0), 1);
    assert_eq!(store.get_string("n.int", ""), "42");
}

#[test]
fn coercion_failures_fall_back_to_default() {
    let store = ConfigStore::new();
    assert!(store.set("bad.negative", -1).is_ok());
    assert!(store.set("bad.fraction", 1.5).is_ok());
    assert!(store.set("bad.text", "not a number").is_ok());
    assert!(store.set("bad.large", 300).is_ok());
    assert!(store.set("bad.table.inner", 1).is_ok());

    assert_eq!(store.get_uint64("bad.negative", 11), 11);
    assert_eq!(store.get_int64("bad.fraction", 12), 12);
    assert_eq!(store.get_int("bad.text", 13), 13);
    assert!(store.get_bool("bad.text", true));
    assert_eq!(store.get_or::<u8>("bad.large", 14), 14);
    assert_eq!(store.get_string("bad.table", "tbl"), "tbl");
    assert_eq!(
        store.get_duration("bad.text", Duration::from_millis(15)),
        Duration::from_millis(15)
    );
}

#[test]
fn repeated_signs_are_not_numbers() {
    let store = ConfigStore::new();
    assert!(store.set("n.double_minus", "--5").is_ok());
    assert!(store.set("n.mixed", "+-5").is_ok());
    assert!(store.set("n.neg_hex", "-0x10").is_ok());

    assert_eq!(store.get_int64("n.double_minus", 99), 99);
    assert_eq!(store.get_int("n.mixed", 98), 98);
    assert_eq!(store.get_int64("n.neg_hex", 0), -16);
}

#[test]
fn booleans_accept_common_spellings() {
    let store = ConfigStore::new();
    for (i, text) in ["yes", "on", "1", "TRUE", "t"].into_iter().enumerate() {
        let path = format!("b.t{i}");
        assert!(store.set(&path, text).is_ok());
        assert!(store.get_bool(&path, false), "{text} should be true");
    }
    assert!(store.set("b.off", "off").is_ok());
    assert!(!store.get_bool("b.off", true));
}

#[test]
fn durations_parse_compound_and_bare_values() {
    assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
    assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
    assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
    assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
    assert_eq!(parse_duration("5 min"), Some(Duration::from_secs(300)));
    assert_eq!(parse_duration("soon"), None);
    assert_eq!(parse_duration(""), None);

    let store = ConfigStore::new();
    assert!(store.set("t.secs", 3).is_ok());
    assert_eq!(store.get_duration("t.secs", Duration::ZERO), Duration::from_secs(3));
}

#[test]
fn slices_coerce_elementwise_and_fall_back_as_a_whole() {
    let store = ConfigStore::new();
    assert!(store.set("s.ints", vec![1, 2, 3]).is_ok());
    assert!(store.set("s.csv", "a, b,c").is_ok());
    assert!(store.set("s.csv_ints", "4,5").is_ok());
    assert!(
        store
            .set("s.mixed", vec![Value::Integer(1), Value::String("x".to_string())])
            .is_ok()
    );

    assert_eq!(store.get_int64_slice("s.ints", &[]), vec![1, 2, 3]);
    assert_eq!(store.get_string_slice("s.ints", &[]), vec!["1", "2", "3"]);
    assert_eq!(store.get_string_slice("s.csv", &[]), vec!["a", "b", "c"]);
    assert_eq!(store.get_uint64_slice("s.csv_ints", &[]), vec![4, 5]);
    assert_eq!(store.get_int_slice("s.mixed", &[9]), vec![9]);
}

#[test]
fn get_section_decodes_subtree() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
        #[serde(default)]
        tls: bool,
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Optional {
        #[serde(default)]
        level: Option<String>,
    }

    let store = ConfigStore::new();
    assert!(store.merge_with(table("[app.server]\nhost = \"h\"\nport = 80\n")).is_ok());

    let server: Result<Server, _> = store.prefixed().get_section("server");
    assert_eq!(
        server.ok(),
        Some(Server {
            host: "h".to_string(),
            port: 80,
            tls: false
        })
    );

    let missing: Result<Optional, _> = store.get_section("app.logger");
    assert_eq!(missing.ok(), Some(Optional::default()));

    assert!(store.set("app.server.port", "eighty").is_ok());
    let mismatch: Result<Server, _> = store.prefixed().get_section("server");
    assert!(matches!(mismatch, Err(ConfigError::SectionDecode { .. })));
}

#[test]
fn empty_key_reads_whole_tree() {
    let store = ConfigStore::new();
    assert!(store.set("a.b", 1).is_ok());

    assert_eq!(store.get(""), Some(Value::Table(table("[a]\nb = 1\n"))));
    assert_eq!(store.prefixed().get_map(""), Table::new());
}

#[test]
fn hooks_run_in_registration_order_with_written_paths() {
    let store = ConfigStore::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

    for id in 0..3 {
        let seen = Arc::clone(&seen);
        store.on_config_loaded(move |loaded: &ConfigLoaded| {
            if let Ok(mut seen) = seen.lock() {
                seen.push((id, loaded.source, loaded.paths.clone()));
            }
        });
    }

    assert!(store.merge_from(Source::Env, table("[app]\nx = 1\ny = 2\n")).is_ok());

    let seen = seen.lock().map(|s| s.clone()).unwrap_or_default();
    let ids: Vec<i32> = seen.iter().map(|(id, _, _)| *id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(seen[0].1, Source::Env);
    assert_eq!(seen[0].2, vec!["app.x".to_string(), "app.y".to_string()]);
}

#[test]
fn hook_registered_during_dispatch_runs_next_time() {
    let store = ConfigStore::new();
    let late_calls = Arc::new(AtomicUsize::new(0));

    let registrar = store.clone();
    let late = Arc::clone(&late_calls);
    let registered = Arc::new(AtomicUsize::new(0));
    store.on_config_loaded(move |_| {
        if registered.fetch_add(1, Ordering::SeqCst) == 0 {
            let late = Arc::clone(&late);
            registrar.on_config_loaded(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    assert!(store.merge_with(table("a = 1\n")).is_ok());
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);

    assert!(store.merge_with(table("a = 2\n")).is_ok());
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn nested_merge_from_hook_does_not_redispatch() {
    let store = ConfigStore::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let inner = store.clone();
    let counter = Arc::clone(&calls);
    store.on_config_loaded(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = inner.merge_with(toml::toml! { derived = true });
    });

    assert!(store.merge_with(table("a = 1\n")).is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.get_bool("derived", false));
}

#[test]
fn write_access_defers_hooks_until_released() {
    let store = ConfigStore::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    store.on_config_loaded(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    {
        let mut access = match store.write_access() {
            Ok(access) => access,
            Err(e) => panic!("lock failed: {e}"),
        };
        assert!(access.reset().is_ok());
        assert!(access.merge_from(Source::File, table("a = 1\n")).is_ok());
        assert!(access.set("b", 2).is_ok());
        assert_eq!(access.get("a"), Some(Value::Integer(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_int("b", 0), 2);
}

#[test]
fn dump_preserves_key_order() {
    let store = ConfigStore::new();
    assert!(store.set("z", 1).is_ok());
    assert!(store.set("a", 2).is_ok());
    assert!(store.set("m.y", 3).is_ok());
    assert!(store.set("m.b", 4).is_ok());

    let dump = store.dump_hierarchy();
    let keys: Vec<&str> = dump.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["z", "a", "m"]);

    let inner: Vec<String> = store.get_map("m").keys().cloned().collect();
    assert_eq!(inner, vec!["y", "b"]);
}

#[test]
fn config_change_extracts_typed_value() {
    let store = ConfigStore::new();
    assert!(store.replace_layer(Source::File, table("port = 1\n")).is_ok());

    let changes = store
        .replace_layer(Source::File, table("port = 2\n"))
        .unwrap_or_default();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].extract::<u16>().ok(), Some(2));
    assert_eq!(changes[0].source, Source::File);
}

#[test]
fn concurrent_readers_never_see_partial_writes() {
    const ROUNDS: i64 = 500;
    let store = ConfigStore::new();
    assert!(store.set("pair.a", 0).is_ok());
    assert!(store.set("pair.b", 0).is_ok());

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let store = store.clone();
            scope.spawn(move || {
                for i in 1..=ROUNDS {
                    let result = match writer {
                        0 => store.set(&format!("w{writer}.last"), i),
                        1 => store.merge_from(
                            Source::Env,
                            table(&format!("[pair]\na = {i}\nb = {i}\n[w1]\nlast = {i}\n")),
                        ),
                        2 => store.replace_layer(
                            Source::File,
                            table(&format!("[w2]\nlast = {i}\n")),
                        ).map(|_| ()),
                        _ => store.write_access().and_then(|mut access| {
                            access.set("pair.a", -i)?;
                            access.set("pair.b", -i)?;
                            access.set("w3.last", i)
                        }),
                    };
                    assert!(result.is_ok(), "writer {writer} failed: {result:?}");
                }
            });
        }

        for _ in 0..4 {
            let store = store.clone();
            scope.spawn(move || {
                for _ in 0..ROUNDS {
                    let pair = store.get_map("pair");
                    assert_eq!(pair.get("a"), pair.get("b"), "torn pair: {pair:?}");
                    assert!(store.get("pair").is_some());
                }
            });
        }
    });

    for writer in 0..4 {
        assert_eq!(store.get_int64(&format!("w{writer}.last"), 0), ROUNDS);
    }
}
