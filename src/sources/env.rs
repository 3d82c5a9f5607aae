use std::collections::{BTreeMap, HashMap};

use toml::Table;
use tracing::debug;

use crate::config_store::{infer_scalar, key, set_value_at_path};

/// Read access to environment variables.
///
/// The process environment is the default; tests inject a map instead of
/// mutating global state.
pub trait EnvSource: Send + Sync {
    /// Every variable as `(name, value)`, in any order.
    fn vars(&self) -> Vec<(String, String)>;

    /// Value of a single variable.
    fn var(&self, name: &str) -> Option<String> {
        self.vars()
            .into_iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn vars(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn vars(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Maps `PREFIX_SUB_KEY` variables to `sub.key` paths under
/// `store_prefix`.
///
/// Prefixes are matched case-sensitively and in the order given, so a later
/// prefix overrides an earlier one for the same key. Within a prefix the
/// variables are applied by name. Names with an empty segment
/// (`APP__X`, `APP_X_`) are ignored.
///
/// ```
/// use std::collections::HashMap;
/// use cmdopt::sources::scan_env;
///
/// let env = HashMap::from([("DEMO_SERVER_PORT".to_string(), "8080".to_string())]);
/// let table = scan_env(&env, &["DEMO".to_string()], &["app".to_string()]);
///
/// assert_eq!(table["app"]["server"]["port"].as_integer(), Some(8080));
/// ```
pub fn scan_env(env: &dyn EnvSource, prefixes: &[String], store_prefix: &[String]) -> Table {
    let mut vars = env.vars();
    vars.sort();

    let mut table = Table::new();

    for prefix in prefixes.iter().filter(|p| !p.is_empty()) {
        let marker = format!("{prefix}_");

        for (name, raw) in &vars {
            let Some(rest) = name.strip_prefix(&marker) else {
                continue;
            };

            let lowered = rest.to_ascii_lowercase();
            let segments: Vec<&str> = lowered.split('_').collect();
            if segments.iter().any(|s| s.is_empty()) {
                debug!(var = %name, "ignoring environment variable with empty segment");
                continue;
            }

            let path = key::wrap_with_prefix(store_prefix, &key::from_segments(segments));
            if let Err(e) = set_value_at_path(&mut table, &path, infer_scalar(raw)) {
                debug!(var = %name, error = %e, "ignoring environment variable");
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn maps_and_infers_values() {
        let env = env(&[
            ("APP_DEBUG", "true"),
            ("APP_SERVER_PORT", "8080"),
            ("APP_RATIO", "0.25"),
            ("APP_NAME", "demo"),
            ("OTHER_THING", "x"),
        ]);

        let table = scan_env(&env, &["APP".to_string()], &["app".to_string()]);
        let app = table["app"].as_table().cloned().unwrap_or_default();

        assert_eq!(app["debug"].as_bool(), Some(true));
        assert_eq!(app["server"]["port"].as_integer(), Some(8080));
        assert_eq!(app["ratio"].as_float(), Some(0.25));
        assert_eq!(app["name"].as_str(), Some("demo"));
        assert_eq!(app.len(), 4);
    }

    #[test]
    fn later_prefix_overrides_earlier() {
        let env = env(&[("A_LEVEL", "1"), ("B_LEVEL", "2")]);
        let table = scan_env(&env, &["A".to_string(), "B".to_string()], &[]);
        assert_eq!(table["level"].as_integer(), Some(2));
    }

    #[test]
    fn empty_segments_are_ignored() {
        let env = env(&[("APP__X", "1"), ("APP_Y_", "2"), ("APP_", "3")]);
        let table = scan_env(&env, &["APP".to_string()], &[]);
        assert!(table.is_empty());
    }

    #[test]
    fn single_lookup_uses_map() {
        let env = env(&[("HOME_DIR", "/h")]);
        assert_eq!(env.var("HOME_DIR").as_deref(), Some("/h"));
        assert_eq!(env.var("MISSING"), None);
    }
}
