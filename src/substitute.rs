use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// Answers bound by `Question` commands, scoped to one program run.
pub type Bindings = HashMap<String, String>;

/// Replaces each `{name}` with its bound answer in a single left-to-right
/// pass. Unbound placeholders stay verbatim so the defect is visible in the
/// persisted record; inserted values are never rescanned.
pub fn substitute(template: &str, bindings: &Bindings) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match bindings.get(&caps[1]) {
            Some(v) => v.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
