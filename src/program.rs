use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use color_eyre::eyre::{eyre, Result, WrapErr};

use crate::memory::Word;

pub mod parse;

pub use parse::{Format, ParseError, ParseErrorKind, Parser};

/// Instruction words of a program, indexed by their address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Address of the first instruction
    entry: Word,
    words: BTreeMap<Word, Word>,
}

impl Program {
    /// Creates an empty program starting at `entry`
    pub fn new(entry: Word) -> Self {
        Self {
            entry,
            words: BTreeMap::new(),
        }
    }

    /// Address of the first instruction
    pub fn entry(&self) -> Word {
        self.entry
    }

    /// Maps `word` to `address`, returning the word it replaced
    pub fn insert(&mut self, address: Word, word: Word) -> Option<Word> {
        self.words.insert(address, word)
    }

    /// Returns the instruction word at `address`, if any
    pub fn fetch(&self, address: Word) -> Option<Word> {
        self.words.get(&address).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterates over `(address, word)` pairs in address order
    pub fn iter(&self) -> impl Iterator<Item = (Word, Word)> + '_ {
        self.words.iter().map(|(&address, &word)| (address, word))
    }

    /// Loads a program from a file, picking the format from its extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = Format::from_path(path.as_ref());
        Self::from_file_with_format(path, format)
    }

    /// Loads a program from a file in the given format
    pub fn from_file_with_format<P: AsRef<Path>>(path: P, format: Format) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read `{}`", path.display()))?;

        Parser::new(&data, format).parse().map_err(|errors| {
            let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
            eyre!(
                "Failed to parse `{}`:\n{}",
                path.display(),
                errors.join("\n")
            )
        })
    }
}

impl FromStr for Program {
    type Err = Vec<ParseError>;

    /// Parses a disassembly dump
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(s, Format::Dump).parse()
    }
}
