// Tabular dataset model shared by every downstream stage
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DELIMITER: char = ',';

/// A single cell. Numeric if the whole trimmed text parsed as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Coerce raw text into a cell, preferring a number.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }
}

/// Every declared column has an entry; `None` marks an absent value.
pub type Row = HashMap<String, Option<CellValue>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Parse comma-delimited text. The first non-empty line is the header.
    pub fn parse(text: &str) -> Self {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let Some(header) = lines.next() else {
            return Self::default();
        };

        // Each unique column reads the cell at its last position in the header.
        let mut columns: Vec<String> = Vec::new();
        let mut positions: Vec<usize> = Vec::new();
        for (index, name) in header.split(DELIMITER).map(|c| c.trim()).enumerate() {
            match columns.iter().position(|c| c == name) {
                Some(slot) => positions[slot] = index,
                None => {
                    columns.push(name.to_string());
                    positions.push(index);
                }
            }
        }

        let rows = lines
            .map(|line| {
                let cells: Vec<&str> = line.split(DELIMITER).collect();
                columns
                    .iter()
                    .zip(&positions)
                    .map(|(col, &i)| (col.clone(), cells.get(i).map(|c| CellValue::coerce(c))))
                    .collect::<Row>()
            })
            .collect();

        Self { columns, rows }
    }

    /// Build a dataset from ordered rows; the first row's keys become the columns.
    /// Fields of later rows outside that header are dropped.
    pub fn from_ordered_rows(rows: Vec<Vec<(String, CellValue)>>) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };
        let columns: Vec<String> = first.iter().map(|(k, _)| k.clone()).collect();

        let rows = rows
            .into_iter()
            .map(|fields| {
                let mut row: Row = columns.iter().map(|c| (c.clone(), None)).collect();
                for (key, value) in fields {
                    if let Some(slot) = row.get_mut(&key) {
                        *slot = Some(value);
                    }
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_yields_zero_rows() {
        let ds = Dataset::parse("timestamp,IAQ,VOC,label\n");
        assert_eq!(ds.columns, vec!["timestamp", "IAQ", "VOC", "label"]);
        assert!(ds.rows.is_empty());
    }

    #[test]
    fn test_parse_example_dataset() {
        let ds = Dataset::parse(
            "timestamp,IAQ,CO2eq,VOC,label\n0,25,450,0.32,fresh\n1,60,700,0.90,spoiled",
        );
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0]["IAQ"], Some(CellValue::Number(25.0)));
        assert_eq!(ds.rows[1]["VOC"], Some(CellValue::Number(0.9)));
        assert_eq!(
            ds.rows[1]["label"],
            Some(CellValue::Text("spoiled".to_string()))
        );
    }

    #[test]
    fn test_duplicate_header_keeps_cells_aligned() {
        let ds = Dataset::parse("a,a,b\n1,2,3\n");
        assert_eq!(ds.columns, vec!["a", "b"]);
        assert_eq!(ds.rows[0]["a"], Some(CellValue::Number(2.0)));
        assert_eq!(ds.rows[0]["b"], Some(CellValue::Number(3.0)));
    }

    #[test]
    fn test_short_row_leaves_trailing_columns_absent() {
        let ds = Dataset::parse("a,b,c\n1,2\n");
        assert_eq!(ds.rows.len(), 1);
        assert_eq!(ds.rows[0]["b"], Some(CellValue::Number(2.0)));
        assert_eq!(ds.rows[0]["c"], None);
        assert!(ds.rows[0].contains_key("c"));
    }

    #[test]
    fn test_cells_are_trimmed_and_blank_lines_skipped() {
        let ds = Dataset::parse(" a , b \n\n  x , 3.5 \n\n");
        assert_eq!(ds.columns, vec!["a", "b"]);
        assert_eq!(ds.rows[0]["a"], Some(CellValue::Text("x".to_string())));
        assert_eq!(ds.rows[0]["b"], Some(CellValue::Number(3.5)));
    }

    #[test]
    fn test_empty_cell_stays_text() {
        assert_eq!(CellValue::coerce("  "), CellValue::Text(String::new()));
    }

    #[test]
    fn test_from_ordered_rows_uses_first_row_shape() {
        let rows = vec![
            vec![("a".to_string(), CellValue::Number(1.0))],
            vec![
                ("a".to_string(), CellValue::Number(2.0)),
                ("extra".to_string(), CellValue::Number(9.0)),
            ],
        ];
        let ds = Dataset::from_ordered_rows(rows);
        assert_eq!(ds.columns, vec!["a"]);
        assert_eq!(ds.rows[1].len(), 1);
        assert_eq!(ds.rows[1]["a"], Some(CellValue::Number(2.0)));
    }
}
