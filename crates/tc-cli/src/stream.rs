//! JSON-lines record input for `textclust run`.
//!
//! One record per line:
//! `{"id": "doc-1", "time": 12.5, "terms": {"rust": 2}, "text": "..."}`.
//! Every field is optional. `terms` wins over `text` when both are present.

use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;

use anyhow::{Context, Result};
use serde::Deserialize;
use tc_core::{BagOfWords, ClusterError, ClusterId, TermFrequencies, TextClust};

/// Record ids may be strings or numbers in the input.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Record {
    pub id: Option<RecordKey>,
    pub time: Option<f64>,
    pub terms: Option<HashMap<String, f64>>,
    pub text: Option<String>,
}

impl Record {
    pub fn term_frequencies(&self, bow: &BagOfWords) -> TermFrequencies {
        match (&self.terms, &self.text) {
            (Some(terms), _) => terms.clone(),
            (None, Some(text)) => bow.term_frequencies(text),
            (None, None) => TermFrequencies::new(),
        }
    }
}

/// Parse records from `reader`, skipping blank lines. Yields `(line, record)`
/// with 1-based line numbers.
pub fn read_records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, Record)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line_no = i + 1;
            match line {
                Err(e) => Some(Err(anyhow::Error::new(e).context(format!("failed to read line {line_no}")))),
                Ok(l) if l.trim().is_empty() => None,
                Ok(l) => Some(
                    serde_json::from_str::<Record>(&l)
                        .map(|r| (line_no, r))
                        .with_context(|| format!("invalid record on line {line_no}")),
                ),
            }
        })
}

/// Per-record outcome of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordAssignment {
    pub line: usize,
    pub record_id: Option<String>,
    pub cluster: ClusterId,
}

#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub learned: usize,
    pub skipped: usize,
    pub assignments: Vec<RecordAssignment>,
}

/// Feed every record to `engine`. Records without terms are skipped; any
/// other rejection stops the run.
pub fn run_stream<R: BufRead>(engine: &mut TextClust, reader: R, bow: &BagOfWords) -> Result<RunReport> {
    let mut report = RunReport::default();
    for item in read_records(reader) {
        let (line, record) = item?;
        let terms = record.term_frequencies(bow);
        let record_id = record.id.as_ref().map(ToString::to_string);

        match engine.learn_one(&terms, record.time, record_id.as_deref()) {
            Ok(cluster) => {
                report.learned += 1;
                report.assignments.push(RecordAssignment {
                    line,
                    record_id,
                    cluster,
                });
            }
            Err(ClusterError::EmptyObservation) => {
                tracing::debug!(line, "skipping record without terms");
                report.skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("record on line {line} rejected")),
        }
    }
    Ok(report)
}
