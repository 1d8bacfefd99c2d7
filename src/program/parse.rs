//! Disassembly dump:
//!
//! ```text
//! 80000000 <_start>:
//! 80000000:	00500093          	li	ra,5
//! ```
//!
//! Hex pairs, as written by the hex converter:
//!
//! ```text
//! 0x80000000 00500093
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error;
use std::path::Path;
use std::str::FromStr;
use std::{fmt, str::Lines};

use crate::memory::Word;

use super::Program;

macro_rules! propagate {
    ( $res:expr ) => {
        match $res {
            Ok(value) => value,
            Err(err) => return Some(Err(err)),
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidAddress,
    InvalidWord,
    EmptyProgram,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidAddress => f.write_str("invalid address"),
            ParseErrorKind::InvalidWord => f.write_str("invalid instruction word"),
            ParseErrorKind::EmptyProgram => f.write_str("no instructions found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseError {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// Layout of the lines holding instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `<address>: <word> <disassembly>` as printed by objdump
    Dump,
    /// `0x<address> <word>`
    Hex,
}

impl Default for Format {
    fn default() -> Self {
        Self::Dump
    }
}

impl Format {
    /// `.hex` files hold hex pairs, everything else is treated as a dump
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("hex") => Self::Hex,
            _ => Self::Dump,
        }
    }

    /// Splits an instruction line into its address and word digits. Returns
    /// `None` for any other line.
    pub fn split(self, line: &str) -> Option<(&str, &str)> {
        match self {
            Format::Dump => split_dump_line(line),
            Format::Hex => split_hex_line(line),
        }
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dump" => Ok(Self::Dump),
            "hex" => Ok(Self::Hex),
            _ => Err(format!("unknown format `{}`, expected `dump` or `hex`", s)),
        }
    }
}

fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

/// Splits `<address>: <word> <anything>` into address and word digits.
///
/// Both numbers are lowercase hex without prefix. The word has to be followed
/// by whitespace or the end of the line.
pub fn split_dump_line(line: &str) -> Option<(&str, &str)> {
    let (address, rest) = line.trim_start().split_once(':')?;
    if !is_hex(address) {
        return None;
    }

    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !matches!(c, '0'..='9' | 'a'..='f'))
        .unwrap_or(rest.len());
    let (word, tail) = rest.split_at(end);

    if word.is_empty() || !(tail.is_empty() || tail.starts_with(char::is_whitespace)) {
        return None;
    }

    Some((address, word))
}

/// Splits `0x<address> <word>` into address and word digits
pub fn split_hex_line(line: &str) -> Option<(&str, &str)> {
    let mut fields = line.split_whitespace();
    let address = fields.next()?.strip_prefix("0x")?;
    let word = fields.next()?;

    if is_hex(address) && is_hex(word) {
        Some((address, word))
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lines: Lines<'a>,
    line_nr: usize,
    format: Format,
    entry: Option<Word>,
    words: BTreeMap<Word, Word>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for `data` holding lines in `format`.
    pub fn new(data: &'a str, format: Format) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            format,
            entry: None,
            words: BTreeMap::new(),
        }
    }

    /// Consumes `self` and collects all instruction lines into a [`Program`].
    /// The first instruction line gives the entry point.
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(mut self) -> Result<Program, Vec<ParseError>> {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        let entry = match self.entry {
            Some(entry) => entry,
            None if errors.is_empty() => {
                let err = ParseError::new(
                    ParseErrorKind::EmptyProgram,
                    "no line holds an instruction",
                    self.line_nr,
                );
                log::error!("{}", err);
                return Err(vec![err]);
            }
            None => return Err(errors),
        };

        if errors.is_empty() {
            Ok(Program {
                entry,
                words: self.words,
            })
        } else {
            Err(errors)
        }
    }

    /// Tries to parse the next line of the input. Lines which do not hold an
    /// instruction are skipped.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?;
        self.line_nr += 1;

        let (address, word) = match self.format.split(line) {
            Some(fields) => fields,
            // Label, section header or other text; skip
            None => return Some(Ok(())),
        };

        let address = propagate!(Word::from_str_radix(address, 16).map_err(|_| {
            ParseError::new(
                ParseErrorKind::InvalidAddress,
                format!("`{}` does not fit into 32 bits", address),
                self.line_nr,
            )
        }));
        let word = propagate!(Word::from_str_radix(word, 16).map_err(|_| {
            ParseError::new(
                ParseErrorKind::InvalidWord,
                format!("`{}` does not fit into 32 bits", word),
                self.line_nr,
            )
        }));

        if self.entry.is_none() {
            log::debug!("[{}] Entry point `0x{:08x}`", self.line_nr, address);
            self.entry = Some(address);
        }

        if let Some(previous) = self.words.insert(address, word) {
            log::debug!(
                "[{}] Replacing `0x{:08x}` at `0x{:08x}`",
                self.line_nr,
                previous,
                address
            );
        }

        log::trace!("[{}] 0x{:08x}: 0x{:08x}", self.line_nr, address, word);

        Some(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    const DUMP: &str = r#"
rv32ui-p-simple:     file format elf32-littleriscv


Disassembly of section .text.init:

80000000 <_start>:
80000000:	0500006f          	j	80000050 <reset_vector>

80000004 <trap_vector>:
80000004:	34202f73          	csrr	t5,mcause
80000008:	00800f93          	li	t6,8
"#;

    #[test]
    fn parse_dump() -> Result<()> {
        let program = Program::from_str(DUMP).unwrap();

        assert_eq!(program.entry(), 0x8000_0000);
        assert_eq!(program.len(), 3);
        assert_eq!(program.fetch(0x8000_0000), Some(0x0500_006F));
        assert_eq!(program.fetch(0x8000_0004), Some(0x3420_2F73));
        assert_eq!(program.fetch(0x8000_0008), Some(0x0080_0F93));

        Ok(())
    }

    #[test]
    fn parse_entry_is_first_line_not_lowest() -> Result<()> {
        let data = "  8:\t00000013\tnop\n  4:\t00000013\tnop\n";
        let program = Program::from_str(data).unwrap();

        assert_eq!(program.entry(), 0x8);
        assert_eq!(program.len(), 2);

        Ok(())
    }

    #[test]
    fn parse_duplicates_overwrite() -> Result<()> {
        let data = "0: 00500093 li ra,5\n4: 00000013 nop\n0: 00a00093 li ra,10\n";
        let program = Program::from_str(data).unwrap();

        assert_eq!(program.entry(), 0);
        assert_eq!(program.fetch(0), Some(0x00A0_0093));
        assert_eq!(program.len(), 2);

        Ok(())
    }

    #[test]
    fn parse_hex() -> Result<()> {
        let data = "0x100 00500093\n\n0x104 00a00113\n";
        let program = Parser::new(data, Format::Hex).parse().unwrap();

        assert_eq!(program.entry(), 0x100);
        assert_eq!(program.fetch(0x104), Some(0x00A0_0113));

        // dump lines are not hex pairs
        assert!(Parser::new(DUMP, Format::Hex).parse().is_err());

        Ok(())
    }

    #[test]
    fn parse_overflow() {
        let data = "0: 00000013 nop\n123456789: 00000013 nop\n4: 123456789 ?\n";
        let errors = Program::from_str(data).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].kind(), ParseErrorKind::InvalidAddress);
        assert_eq!(errors[0].line_nr(), 2);
        assert_eq!(errors[1].kind(), ParseErrorKind::InvalidWord);
        assert_eq!(errors[1].line_nr(), 3);
    }

    #[test]
    fn parse_empty() {
        let errors = Program::from_str("hello\nworld\n").unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ParseErrorKind::EmptyProgram);
        assert_eq!(
            errors[0].to_string(),
            "error [ln: 2]: no instructions found - no line holds an instruction"
        );
    }

    #[test]
    fn split_dump_lines() {
        assert_eq!(split_dump_line("  0:\t00500093"), Some(("0", "00500093")));
        assert_eq!(split_dump_line("1c:00500093 x"), Some(("1c", "00500093")));
        assert_eq!(split_dump_line("0: 0050009g"), None);
        assert_eq!(split_dump_line("0: "), None);
        assert_eq!(split_dump_line("0X: 00500093 "), None);
        assert_eq!(split_dump_line("80000000 <_start>:"), None);
        assert_eq!(split_dump_line(": 00500093 "), None);
        assert_eq!(split_dump_line("A0: 00500093 "), None);
    }

    #[test]
    fn split_hex_lines() {
        assert_eq!(split_hex_line("0x1c 00500093"), Some(("1c", "00500093")));
        assert_eq!(split_hex_line("1c 00500093"), None);
        assert_eq!(split_hex_line("0x1c"), None);
        assert_eq!(split_hex_line("0x 00500093"), None);
    }

    #[test]
    fn format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/rv32ui-p-add.hex")), Format::Hex);
        assert_eq!(Format::from_path(Path::new("a/rv32ui-p-add.dump")), Format::Dump);
        assert_eq!(Format::from_path(Path::new("a/program")), Format::Dump);
        assert_eq!("hex".parse::<Format>(), Ok(Format::Hex));
        assert!("elf".parse::<Format>().is_err());
    }
}
