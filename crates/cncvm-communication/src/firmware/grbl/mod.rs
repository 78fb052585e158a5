//! GRBL protocol support

pub mod response_parser;

pub use response_parser::{GrblResponse, GrblResponseParser, StatusReport};
