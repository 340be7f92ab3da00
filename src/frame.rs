//! Tabular results.
//!
//! A [`Frame`] is what queries return and what the bulk loaders consume:
//! ordered column names plus rows of [`Value`]s.

use crate::error::{DbError, DbResult};
use crate::value::{Value, ValueKind};

use csv::{ReaderBuilder, Writer};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// A rectangular result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a frame from rows, checking each row's arity.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> DbResult<Self> {
        let mut frame = Self::new(columns);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    /// Rows decoded from one result set, whose arity already matches.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> DbResult<()> {
        if row.len() != self.columns.len() {
            return Err(DbError::Decode(format!(
                "row has {} values but frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// The value at `row` in column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// First cell of the first row, the shape of scalar queries.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.first())
    }

    /// Project onto a subset of columns, in the given order.
    pub fn select(&self, names: &[&str]) -> DbResult<Frame> {
        let idx: Vec<usize> = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| DbError::missing_column(*n, "frame"))
            })
            .collect::<DbResult<_>>()?;

        Ok(Frame {
            columns: idx.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Kind of the first non-null value in each column; `None` when a
    /// column holds only nulls.
    pub fn kinds(&self) -> Vec<Option<ValueKind>> {
        (0..self.columns.len())
            .map(|i| self.rows.iter().find_map(|r| r[i].kind()))
            .collect()
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect()
            })
            .collect()
    }

    /// Read a CSV with a header row, inferring each field's type.
    pub fn read_csv(path: impl AsRef<Path>) -> DbResult<Frame> {
        Self::from_csv_reader(File::open(path)?)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> DbResult<Frame> {
        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

        let mut frame = Frame::new(headers);
        for (line, record) in csv_reader.records().enumerate() {
            let record = record?;
            let row: Vec<Value> = record.iter().map(Value::infer).collect();
            frame.push_row(row).map_err(|_| {
                DbError::Decode(format!(
                    "CSV row {} has {} fields, expected {}",
                    line + 1,
                    record.len(),
                    frame.columns.len()
                ))
            })?;
        }
        Ok(frame)
    }

    /// Write the frame as CSV: header row, then one record per row.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> DbResult<()> {
        let file = File::create(path)?;
        self.to_csv_writer(BufWriter::new(file))
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> DbResult<()> {
        let mut writer = Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(Value::to_field))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Frame {
        Frame::from_rows(
            ["id", "name", "score"],
            vec![
                vec![1.into(), "ada".into(), Value::Float(9.5)],
                vec![2.into(), Value::Null, Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_push_row_checks_arity() {
        let mut frame = Frame::new(["a", "b"]);
        assert!(frame.push_row(vec![Value::Int(1)]).is_err());
        assert!(frame.push_row(vec![Value::Int(1), Value::Null]).is_ok());
        assert_eq!(frame.len(), 1);
    }

    #[test]
    fn test_select_and_column() {
        let frame = sample();
        let projected = frame.select(&["NAME", "id"]).unwrap();
        assert_eq!(projected.columns(), &["name".to_string(), "id".to_string()]);
        assert_eq!(projected.rows()[0], vec![Value::from("ada"), Value::Int(1)]);
        assert!(frame.select(&["missing"]).is_err());
        assert_eq!(frame.get(1, "id"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_kinds() {
        let frame = sample();
        assert_eq!(
            frame.kinds(),
            vec![Some(ValueKind::Int), Some(ValueKind::Text), Some(ValueKind::Float)]
        );
        let nulls = Frame::from_rows(["x"], vec![vec![Value::Null]]).unwrap();
        assert_eq!(nulls.kinds(), vec![None]);
    }

    #[test]
    fn test_csv_round_trip_keeps_nulls_and_header() {
        let mut out = Vec::new();
        sample().to_csv_writer(&mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert_eq!(text, "id,name,score\n1,ada,9.5\n2,,\n");

        let back = Frame::from_csv_reader(out.as_slice()).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_csv_ragged_row_is_rejected() {
        let err = Frame::from_csv_reader("a,b\n1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DbError::Csv(_) | DbError::Decode(_)));
    }

    #[test]
    fn test_records() {
        let records = sample().to_records();
        assert_eq!(records[0]["name"], serde_json::json!("ada"));
        assert_eq!(records[1]["score"], serde_json::Value::Null);
    }
}
