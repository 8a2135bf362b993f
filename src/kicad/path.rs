//! Sheet file path resolution.
//!
//! Legacy sheet blocks name their child page relative to the parent page's
//! directory, optionally through `${VAR}` tokens (`${KIPRJMOD}` being the
//! usual one). Resolution reads variables from an explicit [`EnvSnapshot`]
//! so the result never depends on the process environment changing mid-walk.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use super::{KicadError, KicadResult};

/// A frozen copy of the environment variables used for path expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Returns the snapshot with one variable set, replacing any previous value.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Overlays every pair from `overrides` onto the snapshot.
    #[must_use]
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in overrides {
            self.vars.insert(k.into(), v.into());
        }
        self
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

fn variable_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("variable token pattern is valid"))
}

/// Substitutes every `${VAR}` token in `raw` from `env`.
///
/// # Errors
///
/// Returns [`KicadError::UnresolvedVariable`] for the first token whose
/// variable is not set.
pub fn expand_variables(raw: &str, env: &EnvSnapshot) -> KicadResult<String> {
    let mut expanded = String::with_capacity(raw.len());
    let mut last = 0;

    for caps in variable_token().captures_iter(raw) {
        let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = env
            .get(name.as_str())
            .ok_or_else(|| KicadError::UnresolvedVariable {
                variable: name.as_str().to_string(),
                raw_path: raw.to_string(),
            })?;
        expanded.push_str(&raw[last..token.start()]);
        expanded.push_str(value);
        last = token.end();
    }
    expanded.push_str(&raw[last..]);

    Ok(expanded)
}

/// Lexically normalises a path: drops `.` and folds `..` into its parent.
///
/// `..` at the root of an absolute path is discarded; leading `..` of a
/// relative path is kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves a sheet file reference to a normalised absolute path.
///
/// `referencing_dir` is the directory of the page that declares the sheet.
///
/// # Errors
///
/// Returns [`KicadError::UnresolvedVariable`] if a `${VAR}` token cannot be
/// expanded.
pub fn resolve_sheet_path(
    raw_path: &str,
    referencing_dir: &Path,
    env: &EnvSnapshot,
) -> KicadResult<PathBuf> {
    let expanded = expand_variables(raw_path, env)?.replace('\\', "/");
    let candidate = PathBuf::from(expanded);

    let absolute = if candidate.is_absolute() {
        candidate
    } else {
        referencing_dir.join(candidate)
    };

    Ok(normalize(&absolute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_joins_referencing_dir() {
        let env = EnvSnapshot::new();
        let path = resolve_sheet_path("sub.sch", Path::new("/proj"), &env).unwrap();
        assert_eq!(path, PathBuf::from("/proj/sub.sch"));
    }

    #[test]
    fn variable_expanded_from_snapshot() {
        let env = EnvSnapshot::new().with_var("KIPRJMOD", "/home/me/proj");
        let path =
            resolve_sheet_path("${KIPRJMOD}/lib/sub.sch", Path::new("/elsewhere"), &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/me/proj/lib/sub.sch"));
    }

    #[test]
    fn unset_variable_is_an_error() {
        let env = EnvSnapshot::new();
        let err = resolve_sheet_path("${KIPRJMOD}/lib/sub.sch", Path::new("/proj"), &env)
            .unwrap_err();
        match err {
            KicadError::UnresolvedVariable { variable, raw_path } => {
                assert_eq!(variable, "KIPRJMOD");
                assert_eq!(raw_path, "${KIPRJMOD}/lib/sub.sch");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn several_tokens_expand() {
        let env = EnvSnapshot::new()
            .with_var("ROOT", "/data")
            .with_var("BLOCK", "power");
        let expanded = expand_variables("${ROOT}/${BLOCK}/${BLOCK}.sch", &env).unwrap();
        assert_eq!(expanded, "/data/power/power.sch");
    }

    #[test]
    fn dot_segments_are_folded() {
        let env = EnvSnapshot::new();
        let path = resolve_sheet_path("../shared/./io.sch", Path::new("/proj/sub"), &env).unwrap();
        assert_eq!(path, PathBuf::from("/proj/shared/io.sch"));
    }

    #[test]
    fn backslashes_become_separators() {
        let env = EnvSnapshot::new();
        let path = resolve_sheet_path(r"blocks\uart.sch", Path::new("/proj"), &env).unwrap();
        assert_eq!(path, PathBuf::from("/proj/blocks/uart.sch"));
    }

    #[test]
    fn parent_of_root_is_dropped() {
        assert_eq!(normalize(Path::new("/../a/b/..")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("../a")), PathBuf::from("../a"));
    }

    #[test]
    fn overrides_replace_process_values() {
        let env = EnvSnapshot::new()
            .with_var("KIPRJMOD", "/old")
            .with_overrides([("KIPRJMOD", "/new")]);
        assert_eq!(env.get("KIPRJMOD"), Some("/new"));
    }
}
