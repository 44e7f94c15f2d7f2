use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// A mixture channel, i.e. one of the abundance columns of a mixture table.
#[derive(Serialize, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Channel {
    /// the first abundance column (mixture A)
    A,

    /// the second abundance column (mixture B)
    B,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::A => f.write_str("A"),
            Channel::B => f.write_str("B"),
        }
    }
}

/// A single row of a mixture table.
#[derive(Clone, Debug, PartialEq)]
pub struct SequinRecord {
    pub id: String,
    /// Nominal length of the sequin, in bases
    pub length: f64,
    pub mix_a: f64,
    pub mix_b: f64,
}

impl SequinRecord {
    pub fn abundance(&self, channel: Channel) -> f64 {
        match channel {
            Channel::A => self.mix_a,
            Channel::B => self.mix_b,
        }
    }
}

/// Sequin records keyed by identifier, in order of first appearance.
#[derive(Default, Debug)]
pub struct MixtureTable {
    records: IndexMap<String, SequinRecord>,
}

#[derive(Error, Debug)]
pub enum MixtureErr {
    #[error(
        "malformed mixture row at line {line}: expected at least 4 fields \
        (id, length, mixA, mixB), got {count}
    `{row}`"
    )]
    TooFewFields {
        line: u64,
        count: usize,
        row: String,
    },

    #[error(
        "malformed mixture row at line {line}: {column} `{value}` is not a number
    `{row}`"
    )]
    NotANumber {
        line: u64,
        column: &'static str,
        value: String,
        row: String,
    },
}

impl MixtureTable {
    /// Reads a mixture table from a comma or tab separated file.
    ///
    /// The delimiter is chosen from the first line, which is always treated as a header and
    /// discarded. Any later row starting with `id` is also skipped. When an identifier appears
    /// more than once, the last row wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or a [`MixtureErr`] if a data row has fewer
    /// than four fields or a non-numeric length or abundance.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Unable to open mixture table {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse mixture table {}", path.display()))
    }

    pub fn from_reader(mut reader: impl BufRead) -> Result<Self> {
        // the header decides the delimiter, and is not part of the CSV body
        let mut header = String::new();
        reader
            .read_line(&mut header)
            .context("Could not read the first line")?;

        let delimiter = if header.contains(',') { b',' } else { b'\t' };

        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut table = MixtureTable::default();

        for row in rdr.records() {
            let row = row?;

            // csv line numbers start after the header we consumed
            let line = row.position().map_or(0, |p| p.line()) + 1;

            if row.get(0).is_some_and(|id| id.eq_ignore_ascii_case("id")) {
                continue;
            }

            let record = parse_row(&row, line)?;
            table.records.insert(record.id.clone(), record);
        }

        debug!("Read {} sequins from mixture table", table.len());
        Ok(table)
    }

    pub fn get(&self, id: &str) -> Option<&SequinRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_row(row: &StringRecord, line: u64) -> Result<SequinRecord, MixtureErr> {
    let joined = || row.iter().collect::<Vec<_>>().join(" ");

    if row.len() < 4 {
        return Err(MixtureErr::TooFewFields {
            line,
            count: row.len(),
            row: joined(),
        });
    }

    let number = |idx: usize, column: &'static str| -> Result<f64, MixtureErr> {
        row[idx].parse::<f64>().map_err(|_| MixtureErr::NotANumber {
            line,
            column,
            value: row[idx].to_string(),
            row: joined(),
        })
    };

    Ok(SequinRecord {
        id: row[0].to_string(),
        length: number(1, "length")?,
        mix_a: number(2, "mixA")?,
        mix_b: number(3, "mixB")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(s: &str) -> Result<MixtureTable> {
        MixtureTable::from_reader(Cursor::new(s.to_string()))
    }

    #[test]
    fn comma_separated() {
        let t = table("ID,Length,MixA,MixB\nR1_1,1689,10,2.5\nR1_2,800,0.5,1\n").unwrap();
        assert_eq!(t.len(), 2);

        let r = t.get("R1_1").unwrap();
        assert_eq!(r.length, 1689.0);
        assert_eq!(r.abundance(Channel::A), 10.0);
        assert_eq!(r.abundance(Channel::B), 2.5);
    }

    #[test]
    fn tab_separated() {
        let t = table("ID\tLength\tMixA\tMixB\nM1\t2000\t1.5\t3\n").unwrap();
        assert_eq!(t.get("M1").unwrap().mix_b, 3.0);
    }

    #[test]
    fn first_line_is_always_discarded() {
        // even when it looks like data
        let t = table("S0,100,1,1\nS1,200,2,2\n").unwrap();
        assert!(t.get("S0").is_none());
        assert!(t.get("S1").is_some());
    }

    #[test]
    fn repeated_header_is_skipped() {
        let t = table("x,y,z,w\nid,length,A,B\nS1,200,2,2\nID,length,A,B\n").unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn duplicate_last_row_wins() {
        let t = table("id,len,A,B\nS1,1000,1,1\nS1,2000,7,8\n").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(
            t.get("S1").unwrap(),
            &SequinRecord {
                id: "S1".to_string(),
                length: 2000.0,
                mix_a: 7.0,
                mix_b: 8.0
            }
        );
    }

    #[test]
    fn blank_lines_and_extra_columns() {
        let t = table("id,len,A,B,notes\n\nS1,1000,1,1,spike\n\n").unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn too_few_fields() {
        let err = table("id,len,A,B\nS1,1000,1\n").unwrap_err();
        let err = err.downcast::<MixtureErr>().unwrap();
        assert!(matches!(
            err,
            MixtureErr::TooFewFields { line: 2, count: 3, .. }
        ));
    }

    #[test]
    fn non_numeric_abundance() {
        let err = table("id,len,A,B\nS1,1000,1,1\nS2,1000,high,1\n").unwrap_err();
        let err = err.downcast::<MixtureErr>().unwrap();
        match err {
            MixtureErr::NotANumber {
                line,
                column,
                value,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "mixA");
                assert_eq!(value, "high");
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn empty_file() {
        assert!(table("").unwrap().is_empty());
    }
}
