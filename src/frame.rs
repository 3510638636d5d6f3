//! Basin record I/O on top of polars.
//!
//! Every column is read as text so station codes and passthrough fields
//! survive unchanged; numeric columns are cast on demand. Writes go to a
//! temporary file next to the destination and are renamed into place.

use crate::error::{Result, StreamflowError};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Timestamp layouts accepted in the `TM` column
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

/// Layout of timestamps written by the final backtrack stage
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse one `TM` cell
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// One basin's table together with the file it came from
#[derive(Debug, Clone)]
pub struct BasinFrame {
    path: PathBuf,
    df: DataFrame,
}

impl BasinFrame {
    /// Read a basin CSV with every column as text
    pub fn read_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StreamflowError::DatasetNotFound {
                path: path.to_path_buf(),
            });
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        debug!(
            "Read {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            df,
        })
    }

    pub fn from_dataframe(path: impl Into<PathBuf>, df: DataFrame) -> Self {
        Self {
            path: path.into(),
            df,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    /// Fail with `Schema` naming the first absent column
    pub fn require_columns(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|name| !self.has_column(name)) {
            Some(missing) => Err(StreamflowError::Schema {
                path: self.path.clone(),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn series(&self, name: &str) -> Result<&Series> {
        self.require_columns(&[name])?;
        Ok(self.df.column(name)?.as_materialized_series())
    }

    /// Numeric view of a column; missing or unparseable cells are `NaN`
    pub fn float_column(&self, name: &str) -> Result<Vec<f64>> {
        let series = self.series(name)?;
        if series.dtype() == &DataType::String {
            return Ok(series
                .str()?
                .iter()
                .map(|cell| {
                    cell.and_then(|text| text.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect());
        }

        let numbers = series.cast(&DataType::Float64)?;
        Ok(numbers
            .f64()?
            .iter()
            .map(|value| value.unwrap_or(f64::NAN))
            .collect())
    }

    /// Text view of a column; missing cells are `None`
    pub fn string_column(&self, name: &str) -> Result<Vec<Option<String>>> {
        let text = self.series(name)?.cast(&DataType::String)?;
        Ok(text
            .str()?
            .iter()
            .map(|value| value.map(str::to_string))
            .collect())
    }

    /// Parsed `TM` column; the first unparseable cell is an error
    pub fn timestamps(&self, name: &str) -> Result<Vec<NaiveDateTime>> {
        self.string_column(name)?
            .into_iter()
            .enumerate()
            .map(|(row, cell)| {
                let text = cell.unwrap_or_default();
                parse_timestamp(&text).ok_or_else(|| StreamflowError::InvalidTimestamp {
                    path: self.path.clone(),
                    row,
                    value: text,
                })
            })
            .collect()
    }

    /// Add or replace a numeric column; `NaN` is written as an empty cell
    pub fn set_float_column(&mut self, name: &str, values: &[f64]) -> Result<()> {
        let cells: Vec<Option<f64>> = values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        self.df.with_column(Column::new(name.into(), cells))?;
        Ok(())
    }

    /// Add or replace a text column
    pub fn set_string_column(&mut self, name: &str, values: Vec<Option<String>>) -> Result<()> {
        self.df.with_column(Column::new(name.into(), values))?;
        Ok(())
    }

    /// Rows where `keep` is true
    pub fn filter_rows(&self, keep: &[bool]) -> Result<Self> {
        let mask = BooleanChunked::from_slice("keep".into(), keep);
        Ok(Self {
            path: self.path.clone(),
            df: self.df.filter(&mask)?,
        })
    }

    /// Rebuild the frame row by row: `rows[i]` names the source row of
    /// output row `i`, or `None` for an empty row. Every column becomes text.
    pub fn take_rows(&self, rows: &[Option<usize>]) -> Result<Self> {
        let columns = self
            .column_names()
            .iter()
            .map(|name| {
                let source = self.string_column(name)?;
                let cells: Vec<Option<String>> = rows
                    .iter()
                    .map(|row| row.and_then(|r| source.get(r).cloned().flatten()))
                    .collect();
                Ok(Column::new(name.as_str().into(), cells))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: self.path.clone(),
            df: DataFrame::new(columns)?,
        })
    }

    /// Project onto `names` in that order, adding empty text columns for absent names
    pub fn select_or_empty(&self, names: &[&str]) -> Result<Self> {
        let height = self.height();
        let columns = names
            .iter()
            .map(|name| {
                Ok(match self.df.column(name) {
                    Ok(column) => column.clone(),
                    Err(_) => Column::full_null((*name).into(), height, &DataType::String),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: self.path.clone(),
            df: DataFrame::new(columns)?,
        })
    }

    /// Write as CSV via a temporary file renamed over `path`
    pub fn write_csv_atomic(&mut self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut tmp = NamedTempFile::new_in(&parent)?;
        CsvWriter::new(tmp.as_file_mut())
            .include_header(true)
            .finish(&mut self.df)
            .map_err(|e| StreamflowError::ProcessingFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write CSV: {}", e),
            })?;
        tmp.persist(path).map_err(|e| e.error)?;

        debug!("Wrote {} rows to {}", self.df.height(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn timestamp_layouts() {
        let expected = NaiveDate::from_ymd_opt(2020, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        for text in [
            "2020-07-01 08:00:00",
            "2020-07-01T08:00:00",
            "2020-07-01 08:00",
            "2020/07/01 08:00:00",
            "2020/07/01 08:00",
            " 2020-07-01 08:00:00.000 ",
        ] {
            assert_eq!(parse_timestamp(text), Some(expected), "{text}");
        }
        assert_eq!(
            parse_timestamp("2020-07-01"),
            Some(expected - chrono::Duration::hours(8))
        );
        assert_eq!(parse_timestamp("01.07.2020"), None);
    }

    #[test]
    fn text_columns_survive_and_numbers_cast() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "basin.csv",
            "STCD,TM,INQ\n00123,2020-07-01 08:00:00,1.5\n00123,2020-07-01 09:00:00,\n00123,2020-07-01 10:00:00,bad\n",
        );
        let frame = BasinFrame::read_csv(&path).unwrap();
        assert_eq!(frame.height(), 3);
        assert_eq!(
            frame.string_column("STCD").unwrap()[0].as_deref(),
            Some("00123")
        );
        let inq = frame.float_column("INQ").unwrap();
        assert_eq!(inq[0], 1.5);
        assert!(inq[1].is_nan());
        assert!(inq[2].is_nan());
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "basin.csv", "TM,INQ\n2020-07-01 08:00:00,1\n");
        let frame = BasinFrame::read_csv(&path).unwrap();
        let err = frame.require_columns(&["TM", "W"]).unwrap_err();
        assert!(matches!(err, StreamflowError::Schema { ref column, .. } if column == "W"));
    }

    #[test]
    fn bad_timestamp_names_the_row() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "basin.csv",
            "TM,INQ\n2020-07-01 08:00:00,1\nyesterday,2\n",
        );
        let frame = BasinFrame::read_csv(&path).unwrap();
        let err = frame.timestamps("TM").unwrap_err();
        assert!(matches!(err, StreamflowError::InvalidTimestamp { row: 1, .. }));
    }

    #[test]
    fn atomic_write_round_trips_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "basin.csv", "TM,INQ\n2020-07-01 08:00:00,1\n2020-07-01 09:00:00,2\n");
        let mut frame = BasinFrame::read_csv(&path).unwrap();
        frame.set_float_column("INQ", &[f64::NAN, 4.0]).unwrap();

        let out = dir.path().join("nested").join("out.csv");
        frame.write_csv_atomic(&out).unwrap();

        let reread = BasinFrame::read_csv(&out).unwrap();
        let inq = reread.float_column("INQ").unwrap();
        assert!(inq[0].is_nan());
        assert_eq!(inq[1], 4.0);
        // no temporary files left behind
        assert_eq!(fs::read_dir(out.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn take_rows_inserts_empty_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "basin.csv", "STCD,INQ\nA,1\nA,2\n");
        let frame = BasinFrame::read_csv(&path).unwrap();
        let taken = frame.take_rows(&[Some(0), None, Some(1)]).unwrap();
        assert_eq!(
            taken.string_column("INQ").unwrap(),
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
    }

    #[test]
    fn select_adds_absent_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "basin.csv", "INQ,TM\n1,2020-07-01\n");
        let frame = BasinFrame::read_csv(&path).unwrap();
        let projected = frame.select_or_empty(&["TM", "INQ", "BLRZ"]).unwrap();
        assert_eq!(projected.column_names(), vec!["TM", "INQ", "BLRZ"]);
        assert_eq!(projected.string_column("BLRZ").unwrap(), vec![None]);
    }
}
