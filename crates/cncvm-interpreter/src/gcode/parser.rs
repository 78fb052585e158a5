//! G-Code tokenizer
//!
//! Turns program text into a [`Document`] of blocks. Each block is one
//! source line with its comments stripped and its words split into
//! address/value tokens. Line numbers (`N` words) are kept as block metadata
//! rather than tokens, and a leading `/` marks the block as deleted.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::{Address, Token};
use crate::error::{ParseError, ParseResult};

/// One parsed program line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based line in the source text
    pub line_number: usize,
    /// `N` word, if the line carried one
    pub sequence_number: Option<u32>,
    /// Whether the line started with the block-delete character `/`
    pub block_delete: bool,
    /// Words in source order
    pub tokens: Vec<Token>,
}

/// A parsed program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Blocks in source order. Blank and comment-only lines are omitted.
    pub blocks: Vec<Block>,
}

impl Document {
    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the document has no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// G-Code text parser
#[derive(Debug, Default, Clone, Copy)]
pub struct GcodeParser;

impl GcodeParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a whole program
    pub fn parse(&self, text: &str) -> ParseResult<Document> {
        let mut blocks = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if let Some(block) = self.parse_line(index + 1, line)? {
                blocks.push(block);
            }
        }
        Ok(Document { blocks })
    }

    /// Parse a single line
    ///
    /// Returns `Ok(None)` for lines that carry no words: blank lines,
    /// comment-only lines and `%` tape markers.
    pub fn parse_line(&self, line_number: usize, line: &str) -> ParseResult<Option<Block>> {
        let cleaned = remove_comments(line);
        if cleaned.contains('(') {
            return Err(ParseError::UnterminatedComment { line_number });
        }

        let mut body = cleaned.trim();
        if body.is_empty() || body == "%" {
            return Ok(None);
        }

        let block_delete = body.starts_with('/');
        if block_delete {
            body = body[1..].trim_start();
        }

        let mut tokens = Vec::new();
        let mut sequence_number = None;
        let mut last_end = 0;

        for captures in word_regex().captures_iter(body) {
            let (Some(whole), Some(letter), Some(number)) =
                (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };

            check_gap(line_number, &body[last_end..whole.start()])?;
            last_end = whole.end();

            let letter = letter.as_str().chars().next().unwrap_or_default();
            let value: f64 = number
                .as_str()
                .parse()
                .map_err(|_| ParseError::InvalidSyntax {
                    line_number,
                    reason: format!("invalid number '{}'", number.as_str()),
                })?;

            if letter.eq_ignore_ascii_case(&'N') {
                if value < 0.0 || value.fract() != 0.0 {
                    return Err(ParseError::InvalidSyntax {
                        line_number,
                        reason: format!("invalid line number N{}", number.as_str()),
                    });
                }
                sequence_number = Some(value as u32);
                continue;
            }

            let address = Address::from_letter(letter).ok_or(ParseError::UnsupportedAddress {
                line_number,
                letter: letter.to_ascii_uppercase(),
            })?;
            tokens.push(Token::new(address, value));
        }
        check_gap(line_number, &body[last_end..])?;

        if tokens.is_empty() && sequence_number.is_none() {
            return Ok(None);
        }

        Ok(Some(Block {
            line_number,
            sequence_number,
            block_delete,
            tokens,
        }))
    }
}

/// Parse program text with a default parser
pub fn parse(text: &str) -> ParseResult<Document> {
    GcodeParser::new().parse(text)
}

/// Remove `( ... )` and `; ...` comments from a line
fn remove_comments(line: &str) -> String {
    static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = COMMENT_REGEX
        .get_or_init(|| Regex::new(r"\([^)]*\)|;.*").expect("invalid regex pattern"));
    regex.replace_all(line, " ").to_string()
}

fn word_regex() -> &'static Regex {
    static WORD_REGEX: OnceLock<Regex> = OnceLock::new();
    WORD_REGEX.get_or_init(|| {
        Regex::new(r"([A-Za-z])\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+))").expect("invalid regex pattern")
    })
}

/// Text between words may only be whitespace
fn check_gap(line_number: usize, gap: &str) -> ParseResult<()> {
    let gap = gap.trim();
    if gap.is_empty() {
        Ok(())
    } else {
        Err(ParseError::InvalidSyntax {
            line_number,
            reason: format!("unexpected '{}'", gap),
        })
    }
}
