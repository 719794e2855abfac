//! Numeric CSV table and positional target extraction.

use ndarray::{Array1, Array2, Axis};
use std::path::Path;
use tracing::info;

use crate::error::{RegshipError, Result};

/// A fully numeric CSV: header names plus row-major values.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Features and target separated out of a [`Table`].
#[derive(Debug, Clone)]
pub struct TargetSplit {
    pub feature_names: Vec<String>,
    pub target_name: String,
    /// Shape: [rows][features]
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

impl Table {
    /// Read a CSV file with a header row. Every cell must parse as `f64`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let table = Self::from_reader(reader)?;

        info!(
            "Loaded {} rows and {} columns from {}",
            table.height(),
            table.width(),
            path.display()
        );
        Ok(table)
    }

    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let columns: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let mut row = Vec::with_capacity(record.len());
            for (col, raw) in record.iter().enumerate() {
                let value: f64 = raw.parse().map_err(|_| {
                    RegshipError::Dataset(format!(
                        "row {} column '{}': cannot parse '{}' as a number",
                        idx + 1,
                        columns.get(col).map(String::as_str).unwrap_or("?"),
                        raw
                    ))
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Split out the column at `target_index` as the target; every other
    /// column, in file order, becomes a feature. The header name of the
    /// target column plays no role.
    pub fn split_target(&self, target_index: usize) -> Result<TargetSplit> {
        if target_index >= self.width() {
            return Err(RegshipError::Dataset(format!(
                "target column index {} out of range: CSV has {} columns",
                target_index,
                self.width()
            )));
        }
        if self.width() < 2 {
            return Err(RegshipError::Dataset(
                "CSV needs at least one feature column besides the target".to_string(),
            ));
        }

        let n_features = self.width() - 1;
        let mut features = Array2::<f64>::zeros((self.height(), n_features));
        let mut target = Array1::<f64>::zeros(self.height());

        for (r, row) in self.rows.iter().enumerate() {
            let mut c = 0;
            for (idx, value) in row.iter().enumerate() {
                if idx == target_index {
                    target[r] = *value;
                } else {
                    features[[r, c]] = *value;
                    c += 1;
                }
            }
        }

        let feature_names = self
            .columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != target_index)
            .map(|(_, name)| name.clone())
            .collect();

        Ok(TargetSplit {
            feature_names,
            target_name: self.columns[target_index].clone(),
            features,
            target,
        })
    }
}

impl TargetSplit {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Rows picked by index, in the given order.
    pub fn select(&self, indices: &[usize]) -> (Array2<f64>, Array1<f64>) {
        (
            self.features.select(Axis(0), indices),
            self.target.select(Axis(0), indices),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv_text: &str) -> Result<Table> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_text.as_bytes());
        Table::from_reader(reader)
    }

    #[test]
    fn third_column_is_target_whatever_its_name() {
        let t = table("sqft,baths,notprice,extra\n1000,2,300000,7\n1500,3,450000,8\n").unwrap();
        let split = t.split_target(2).unwrap();

        assert_eq!(split.target_name, "notprice");
        assert_eq!(split.feature_names, vec!["sqft", "baths", "extra"]);
        assert_eq!(split.target.to_vec(), vec![300000.0, 450000.0]);
        assert_eq!(split.features.row(1).to_vec(), vec![1500.0, 3.0, 8.0]);
    }

    #[test]
    fn fewer_than_three_columns_is_an_error() {
        let t = table("sqft,baths\n1000,2\n").unwrap();
        let err = t.split_target(2).unwrap_err();
        assert!(matches!(err, RegshipError::Dataset(_)));
    }

    #[test]
    fn non_numeric_cell_names_row_and_column() {
        let err = table("a,b,c\n1,2,3\n4,x,6\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 2"), "{msg}");
        assert!(msg.contains("'b'"), "{msg}");
    }

    #[test]
    fn ragged_rows_are_rejected_by_reader() {
        let err = table("a,b,c\n1,2,3\n4,5\n").unwrap_err();
        assert!(matches!(err, RegshipError::Csv(_)));
    }

    #[test]
    fn select_keeps_rows_aligned() {
        let t = table("a,b,c\n1,10,100\n2,20,200\n3,30,300\n").unwrap();
        let split = t.split_target(2).unwrap();
        let (x, y) = split.select(&[2, 0]);

        assert_eq!(x.row(0).to_vec(), vec![3.0, 30.0]);
        assert_eq!(y.to_vec(), vec![300.0, 100.0]);
    }
}
