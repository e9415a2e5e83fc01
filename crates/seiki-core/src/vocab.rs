//! # Character Vocabularies
//!
//! Maps characters to dense integer ids and back. Two flavours exist:
//!
//! - **Source**: id 0 is the padding/unknown sentinel (U+0000); natural
//!   characters take ids `1..=N`.
//! - **Target**: natural characters take ids `0..N`; START (U+0002) is `N`
//!   and END (U+0003) is `N + 1`.
//!
//! Natural characters are ordered by code point, so building from the same
//! character content always yields the same ids regardless of corpus order.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{Result, SeikiError};

/// Source padding/unknown sentinel.
pub const PAD_CHAR: char = '\u{0}';
/// Target start-of-sequence sentinel (ASCII STX).
pub const START_CHAR: char = '\u{2}';
/// Target end-of-sequence sentinel (ASCII ETX).
pub const END_CHAR: char = '\u{3}';

/// Which side of the model a vocabulary belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VocabKind {
    /// Encoder side; reserves id 0 for padding.
    Source,
    /// Decoder side; reserves the two highest ids for START and END.
    Target,
}

/// A character vocabulary with ids dense in `[0, len)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharVocab {
    kind: VocabKind,
    chars: Vec<char>,
    index: HashMap<char, u32>,
}

impl CharVocab {
    /// Build a source vocabulary from every character in `corpora`.
    pub fn source<I, S>(corpora: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let natural = distinct_chars(corpora);
        let mut chars = Vec::with_capacity(natural.len() + 1);
        chars.push(PAD_CHAR);
        // A literal NUL in the corpus collapses onto the pad id.
        chars.extend(natural.into_iter().filter(|&c| c != PAD_CHAR));
        Self::with_kind(VocabKind::Source, chars)
    }

    /// Build a target vocabulary from every character in `corpora`.
    pub fn target<I, S>(corpora: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let natural = distinct_chars(corpora);
        let mut chars: Vec<char> = natural
            .into_iter()
            .filter(|&c| c != START_CHAR && c != END_CHAR)
            .collect();
        chars.push(START_CHAR);
        chars.push(END_CHAR);
        Self::with_kind(VocabKind::Target, chars)
    }

    /// Rebuild a vocabulary from its ordered character list (id = position).
    pub fn from_ordered(kind: VocabKind, chars: Vec<char>) -> Result<Self> {
        let sentinels_ok = match kind {
            VocabKind::Source => chars.first() == Some(&PAD_CHAR),
            VocabKind::Target => chars.ends_with(&[START_CHAR, END_CHAR]),
        };
        if !sentinels_ok {
            return Err(SeikiError::InvalidBundle(format!(
                "{kind:?} vocabulary is missing its sentinel entries"
            )));
        }

        let vocab = Self::with_kind(kind, chars);
        if vocab.index.len() != vocab.chars.len() {
            return Err(SeikiError::InvalidBundle(format!(
                "{kind:?} vocabulary contains duplicate characters"
            )));
        }
        Ok(vocab)
    }

    fn with_kind(kind: VocabKind, chars: Vec<char>) -> Self {
        let index = chars
            .iter()
            .enumerate()
            .map(|(id, &c)| (c, id as u32))
            .collect();
        Self { kind, chars, index }
    }

    /// Which side of the model this vocabulary serves.
    pub fn kind(&self) -> VocabKind {
        self.kind
    }

    /// Total number of ids, sentinels included.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// `true` when the vocabulary holds no natural characters.
    pub fn is_empty(&self) -> bool {
        self.natural_len() == 0
    }

    /// Number of ids held by characters observed in the corpus.
    pub fn natural_len(&self) -> usize {
        match self.kind {
            VocabKind::Source => self.chars.len() - 1,
            VocabKind::Target => self.chars.len() - 2,
        }
    }

    /// Characters in id order.
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Look up the id of a character.
    pub fn id(&self, c: char) -> Option<u32> {
        self.index.get(&c).copied()
    }

    /// Look up the character of an id.
    pub fn char(&self, id: u32) -> Option<char> {
        self.chars.get(id as usize).copied()
    }

    /// Padding/unknown id (source side).
    pub fn pad_id(&self) -> u32 {
        0
    }

    /// START id; `None` on a source vocabulary.
    pub fn start_id(&self) -> Option<u32> {
        match self.kind {
            VocabKind::Source => None,
            VocabKind::Target => Some((self.chars.len() - 2) as u32),
        }
    }

    /// END id; `None` on a source vocabulary.
    pub fn end_id(&self) -> Option<u32> {
        match self.kind {
            VocabKind::Source => None,
            VocabKind::Target => Some((self.chars.len() - 1) as u32),
        }
    }

    /// Encode a string, failing on the first unmapped character.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        text.chars()
            .map(|c| {
                self.id(c)
                    .ok_or(SeikiError::UnknownCharacter { character: c })
            })
            .collect()
    }

    /// Encode a string, mapping unmapped characters to the pad/unknown id.
    pub fn encode_lossy(&self, text: &str) -> Vec<u32> {
        text.chars()
            .map(|c| self.id(c).unwrap_or(self.pad_id()))
            .collect()
    }

    /// Decode ids back into text.
    ///
    /// On a target vocabulary decoding stops at the first END and START
    /// entries are skipped.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        let mut text = String::with_capacity(ids.len());
        let start = self.start_id();
        let end = self.end_id();
        for &id in ids {
            if Some(id) == end {
                break;
            }
            if Some(id) == start {
                continue;
            }
            let c = self.char(id).ok_or(SeikiError::UnknownId {
                id,
                size: self.len(),
            })?;
            text.push(c);
        }
        Ok(text)
    }

    /// Persist as one character per line; the line number is the id.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut out = String::with_capacity(self.chars.len() * 2);
        for c in &self.chars {
            out.push(*c);
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Read a vocabulary written by [`CharVocab::write_to`].
    pub fn read_from<P: AsRef<Path>>(kind: VocabKind, path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let body = content.strip_suffix('\n').unwrap_or(&content);

        let mut chars = Vec::new();
        for (line_no, line) in body.split('\n').enumerate() {
            let mut it = line.chars();
            match (it.next(), it.next()) {
                (Some(c), None) => chars.push(c),
                _ => {
                    return Err(SeikiError::InvalidBundle(format!(
                        "{}:{}: expected exactly one character per line",
                        path.display(),
                        line_no + 1
                    )));
                }
            }
        }

        Self::from_ordered(kind, chars)
    }
}

fn distinct_chars<I, S>(corpora: I) -> BTreeSet<char>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    corpora
        .into_iter()
        .flat_map(|s| s.as_ref().chars().collect::<Vec<_>>())
        .collect()
}
