//! Parallel corpus loading.
//!
//! One example per line: `normalized<TAB>raw`. Runs of tabs count as a
//! single separator, fields are trimmed and extra fields are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use regex::Regex;
use seiki_core::CharVocab;

use crate::error::TrainError;

/// Aligned source (raw) and target (normalized) strings of one split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    pub sources: Vec<String>,
    pub targets: Vec<String>,
}

impl Corpus {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Add one aligned pair.
    pub fn push(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.sources.push(source.into());
        self.targets.push(target.into());
    }
}

/// Line parser for corpus files.
#[derive(Debug, Clone)]
pub struct CorpusParser {
    separator: Regex,
}

impl CorpusParser {
    /// Create a parser splitting on runs of tabs.
    pub fn new() -> Result<Self, TrainError> {
        Ok(Self {
            separator: Regex::new(r"\t+")?,
        })
    }

    /// Parse a corpus from any line reader.
    pub fn parse<R: BufRead>(&self, reader: R) -> Result<Corpus, TrainError> {
        let mut corpus = Corpus::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let mut fields = self.separator.split(&line);
            let target = fields.next().unwrap_or_default();
            let source = fields
                .next()
                .ok_or(TrainError::MissingField { line: index + 1 })?;
            corpus.push(source.trim(), target.trim());
        }

        Ok(corpus)
    }
}

/// Load a corpus file.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> anyhow::Result<Corpus> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("cannot open corpus '{}'", path.display()))?;
    let corpus = CorpusParser::new()?
        .parse(BufReader::new(file))
        .with_context(|| format!("cannot parse corpus '{}'", path.display()))?;
    Ok(corpus)
}

/// The train, dev and test splits of one run.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub train: Corpus,
    pub dev: Corpus,
    pub test: Corpus,
}

impl Datasets {
    /// Load all three splits.
    pub fn load<P: AsRef<Path>>(train: P, dev: P, test: P) -> anyhow::Result<Self> {
        Ok(Self {
            train: load_corpus(train)?,
            dev: load_corpus(dev)?,
            test: load_corpus(test)?,
        })
    }

    fn splits(&self) -> [&Corpus; 3] {
        [&self.train, &self.dev, &self.test]
    }

    /// Source vocabulary over every split.
    pub fn source_vocab(&self) -> CharVocab {
        CharVocab::source(self.splits().into_iter().flat_map(|c| c.sources.iter()))
    }

    /// Target vocabulary over every split.
    pub fn target_vocab(&self) -> CharVocab {
        CharVocab::target(self.splits().into_iter().flat_map(|c| c.targets.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_corpus(input: &str) -> Result<Corpus, TrainError> {
        CorpusParser::new().unwrap().parse(Cursor::new(input))
    }

    #[test]
    fn test_target_is_first_field() {
        let corpus = parse_corpus("01/02/2020\t2020-01-02\n").unwrap();
        assert_eq!(corpus.targets, vec!["01/02/2020"]);
        assert_eq!(corpus.sources, vec!["2020-01-02"]);
    }

    #[test]
    fn test_tab_runs_whitespace_and_extra_fields() {
        let input = " 12/31/1999 \t\t 1999-12-31 \tignored\n01/01/2000\t2000-01-01\r\n";
        let corpus = parse_corpus(input).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.targets, vec!["12/31/1999", "01/01/2000"]);
        assert_eq!(corpus.sources, vec!["1999-12-31", "2000-01-01"]);
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let err = parse_corpus("a\tb\nno-tab-here\n").unwrap_err();
        assert!(matches!(err, TrainError::MissingField { line: 2 }));
    }

    #[test]
    fn test_vocabs_cover_all_splits() {
        let mut data = Datasets::default();
        data.train.push("ab", "x");
        data.dev.push("c", "y");
        data.test.push("d", "z");

        let source = data.source_vocab();
        let target = data.target_vocab();
        for c in ['a', 'b', 'c', 'd'] {
            assert!(source.id(c).is_some());
        }
        for c in ['x', 'y', 'z'] {
            assert!(target.id(c).is_some());
        }
    }
}
