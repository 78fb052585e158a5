//! G-Code text handling
//!
//! This module provides:
//! - Address/value tokens
//! - The line-oriented tokenizer producing a [`Document`] of blocks

pub mod parser;
pub mod token;

pub use parser::{parse, Block, Document, GcodeParser};
pub use token::{Address, Token};
