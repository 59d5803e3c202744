use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;

/// A file known to the server. Identity is `id`; entries are
/// immutable once listed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub file_name: String,
    pub url: String,
}

/// Server-reported pagination meta of one fetch response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub page_size: u32,
    pub total_records: u64,
    pub total_pages: u32,
}

/// One server-paginated, filtered view of a file's tabular contents,
/// exactly as the wire delivers it. Replaced wholesale on every
/// successful fetch; never merged incrementally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileTable {
    pub headers: Vec<String>,
    pub data: Vec<serde_json::Map<String, Value>>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl FileTable {
    pub fn empty(page_size: u32) -> Self {
        Self {
            headers: Vec::new(),
            data: Vec::new(),
            meta: PageMeta {
                page: 1,
                page_size,
                total_records: 0,
                total_pages: 1,
            },
        }
    }

    /// Project `headers` over each record, producing the row-major
    /// matrix the grid renders. Header order is display order; a key
    /// missing from a record projects to an empty cell, not an error.
    pub fn row_matrix(&self) -> Vec<Vec<String>> {
        self.data
            .iter()
            .map(|record| {
                self.headers
                    .iter()
                    .map(|header| render_cell(record.get(header)))
                    .collect()
            })
            .collect()
    }
}

/// Display form of one cell. Strings render bare, scalars via their
/// JSON form, null and absent values as empty.
fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Render width per column over the current page: the widest of
/// header and cells, capped. Columns are measured in parallel, one
/// rayon task each.
pub fn column_widths(headers: &[String], rows: &[Vec<String>], max_width: usize) -> Vec<usize> {
    headers
        .par_iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut width = name.chars().count();
            for row in rows {
                if let Some(cell) = row.get(idx) {
                    width = width.max(cell.chars().count());
                }
            }
            width.min(max_width)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> FileTable {
        serde_json::from_value(json!({
            "headers": ["name", "age", "city"],
            "data": [
                {"name": "alice", "age": 30, "city": "Graz"},
                {"city": "Wien", "age": 41, "name": "bob"},
                {"name": "carol", "age": null}
            ],
            "page": 1,
            "page_size": 10,
            "total_records": 3,
            "total_pages": 1
        }))
        .unwrap()
    }

    #[test]
    fn projection_preserves_header_order() {
        let table = fixture();
        let rows = table.row_matrix();
        assert_eq!(rows[0], vec!["alice", "30", "Graz"]);
        // Record key order on the wire is irrelevant.
        assert_eq!(rows[1], vec!["bob", "41", "Wien"]);
    }

    #[test]
    fn matrix_matches_records_cell_by_cell() {
        let table = fixture();
        let rows = table.row_matrix();
        for (i, record) in table.data.iter().enumerate() {
            for (j, header) in table.headers.iter().enumerate() {
                assert_eq!(rows[i][j], render_cell(record.get(header)), "cell [{i}][{j}]");
            }
        }
    }

    #[test]
    fn missing_and_null_keys_project_to_empty() {
        let table = fixture();
        let rows = table.row_matrix();
        assert_eq!(rows[2], vec!["carol", "", ""]);
    }

    #[test]
    fn deserializes_flat_wire_shape() {
        let table = fixture();
        assert_eq!(table.meta.page, 1);
        assert_eq!(table.meta.total_records, 3);
        assert_eq!(table.meta.total_pages, 1);
    }

    #[test]
    fn widths_cover_header_and_cells() {
        let table = fixture();
        let rows = table.row_matrix();
        let widths = column_widths(&table.headers, &rows, 80);
        assert_eq!(widths, vec![5, 3, 4]); // "carol", "age", "Graz"/"Wien"
    }

    #[test]
    fn widths_are_capped() {
        let headers = vec!["c".to_string()];
        let rows = vec![vec!["x".repeat(200)]];
        assert_eq!(column_widths(&headers, &rows, 32), vec![32]);
    }
}
