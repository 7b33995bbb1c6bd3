use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use regex::Regex;

use crate::kernel::constants::MACRO_DELIMITER;
use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;

static MACRO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$[^\$]*\$)").expect("macro pattern is valid"));

/// Ordered mapping from `$TOKEN$` macros to the path fragments they stand for.
///
/// Entries are never removed. Re-adding a token replaces its expansion but keeps
/// its original position; position matters for [`collapse`](MacroTable::collapse).
#[derive(Debug, Default)]
pub struct MacroTable {
    entries: Mutex<Vec<(String, String)>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(String, String)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite a macro. Bare tokens (`NAME`) are wrapped into
    /// `$NAME$` for backward compatibility.
    pub fn add(&self, token: &str, expansion: &str) {
        debug_assert!(!token.is_empty(), "macro token must not be empty");
        let token = if is_wrapped(token) {
            token.to_string()
        } else {
            log::warn!("Add macros instead of macro name: {}", token);
            format!("{MACRO_DELIMITER}{token}{MACRO_DELIMITER}")
        };

        let mut entries = self.entries();
        match entries.iter_mut().find(|(existing, _)| *existing == token) {
            Some(entry) => entry.1 = expansion.to_string(),
            None => entries.push((token, expansion.to_string())),
        }
    }

    pub fn get(&self, token: &str) -> Option<String> {
        self.entries()
            .iter()
            .find(|(existing, _)| existing == token)
            .map(|(_, expansion)| expansion.clone())
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries_snapshot(&self) -> Vec<(String, String)> {
        self.entries().clone()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Expand every macro in `path`.
    ///
    /// Every `$...$` occurrence must be a known token, otherwise
    /// [`StorageSystemError::UnknownMacro`] is returned and nothing is replaced.
    /// Substitution then runs over the whole table, not only the tokens found.
    pub fn expand(&self, path: &str) -> Result<String> {
        let entries = self.entries();
        for found in MACRO_PATTERN.find_iter(path) {
            let token = found.as_str();
            if !entries.iter().any(|(existing, _)| existing == token) {
                return Err(StorageSystemError::UnknownMacro {
                    macro_name: token.to_string(),
                    path: path.to_string(),
                }
                .into());
            }
        }

        let mut expanded = path.to_string();
        for (token, expansion) in entries.iter() {
            expanded = expanded.replace(token.as_str(), expansion);
        }
        Ok(expanded)
    }

    /// Replace expansions with their tokens, entry by entry in insertion order.
    ///
    /// Replacement is sequential: when one expansion is a substring of another,
    /// the result depends on which entry was added first.
    pub fn collapse(&self, path: &str) -> String {
        let entries = self.entries();
        let mut collapsed = path.to_string();
        for (token, expansion) in entries.iter() {
            // An empty expansion would match between every character.
            if expansion.is_empty() {
                continue;
            }
            collapsed = collapsed.replace(expansion.as_str(), token);
        }
        collapsed
    }
}

fn is_wrapped(token: &str) -> bool {
    token.len() >= 2 && token.starts_with(MACRO_DELIMITER) && token.ends_with(MACRO_DELIMITER)
}
