use crate::types::{LineId, RowData, MAX_TABLE_CELLS};

/// Set one cell of the row for `line`, creating the row if needed. Rows are
/// padded to the full cell count.
pub fn set_cell(rows: &mut Vec<RowData>, line: &LineId, index: usize, text: &str) {
    let pos = match rows.iter().position(|r| &r.line == line) {
        Some(pos) => pos,
        None => {
            rows.push(RowData::new(line.as_str()));
            rows.len() - 1
        }
    };
    let row = &mut rows[pos];
    let len = MAX_TABLE_CELLS.max(index + 1);
    if row.cells.len() < len {
        row.cells.resize(len, String::new());
    }
    row.cells[index] = text.trim().to_string();
}

/// Rows to display: all of them, or only rows with content when the filter
/// is on.
pub fn visible_rows(rows: &[RowData], hide_blank: bool) -> Vec<RowData> {
    rows.iter()
        .filter(|r| !hide_blank || !r.is_blank())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cell_creates_and_pads_row() {
        let mut rows = vec![RowData {
            line: LineId::new("1"),
            cells: vec!["10".to_string()],
        }];
        set_cell(&mut rows, &LineId::new("1"), 3, " 250 ");
        set_cell(&mut rows, &LineId::new("2"), 0, "x");

        assert_eq!(rows[0].cells, vec!["10", "", "", "250", "", ""]);
        assert_eq!(rows[1].line, LineId::new("2"));
        assert_eq!(rows[1].cells[0], "x");
    }

    #[test]
    fn test_filter_hides_blank_rows() {
        let mut rows = vec![RowData::new("1"), RowData::new("2")];
        set_cell(&mut rows, &LineId::new("2"), 1, "5");
        assert_eq!(visible_rows(&rows, false).len(), 2);
        let shown = visible_rows(&rows, true);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].line, LineId::new("2"));
    }
}
