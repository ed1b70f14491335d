use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::PlanError;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

pub type Vars = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Copy)]
pub struct Template {
    name: &'static str,
    text: &'static str,
}

impl Template {
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for caps in PLACEHOLDER_RE.captures_iter(self.text) {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitutes every placeholder in one pass. Values are inserted
    /// verbatim and never re-expanded.
    pub fn render(&self, vars: &Vars) -> Result<String, PlanError> {
        if let Some(missing) = self
            .placeholders()
            .into_iter()
            .find(|name| !vars.contains_key(name))
        {
            return Err(PlanError::UnknownPlaceholder {
                template: self.name.to_string(),
                placeholder: missing.to_string(),
            });
        }
        let rendered = PLACEHOLDER_RE.replace_all(self.text, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

pub fn shell_word(word: &str) -> String {
    let is_safe = !word.is_empty()
        && word
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || "_-./:=,+@%".contains(ch));
    if is_safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
