use serde::Serialize;
use tracing::trace;

/// A single column-scoped constraint applied server-side. Field names
/// match the wire format expected by the `filters` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnFilter {
    pub col: String,
    pub val: String,
}

/// The set of active column filters. At most one filter per column;
/// an empty value is the sentinel for "no filter" and removes the
/// entry instead of storing it. Insertion order is kept so the
/// serialized array is stable across refreshes.
#[derive(Debug, Default, Clone)]
pub struct FilterStore {
    filters: Vec<ColumnFilter>,
}

impl FilterStore {
    /// Insert, overwrite or remove the filter for `column`.
    /// Returns true if the active set changed, which is the signal
    /// for the caller to re-fetch.
    pub fn set(&mut self, column: &str, value: &str) -> bool {
        let existing = self.filters.iter().position(|f| f.col == column);
        let changed = match (existing, value.is_empty()) {
            (Some(idx), true) => {
                self.filters.remove(idx);
                true
            }
            (Some(idx), false) => {
                if self.filters[idx].val == value {
                    false
                } else {
                    self.filters[idx].val = value.to_string();
                    true
                }
            }
            (None, true) => false,
            (None, false) => {
                self.filters.push(ColumnFilter {
                    col: column.to_string(),
                    val: value.to_string(),
                });
                true
            }
        };
        trace!("Filter set {column}={value:?}, changed: {changed}");
        changed
    }

    /// Active value for `column`, if any. Used by the UI to prefill
    /// the filter prompt.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.col == column)
            .map(|f| f.val.as_str())
    }

    pub fn active(&self) -> &[ColumnFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// JSON array of `{col, val}` pairs for the query string.
    pub fn to_query_json(&self) -> String {
        serde_json::to_string(&self.filters).unwrap_or_else(|_| "[]".to_string())
    }
}
