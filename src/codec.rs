//! Line codec for the import engine's multi-value columns.
//!
//! A column holds a list of lines separated by `|`; each line is a list of `key=value`
//! pairs separated by `,`. Decoding splits a pair on its first `=` only, so values may
//! contain `=` but neither of the outer delimiters.

use crate::error::CodecError;
use indexmap::IndexMap;

pub const LINE_DELIMITER: char = '|';
pub const PAIR_DELIMITER: char = ',';
pub const VALUE_DELIMITER: char = '=';

/// One decoded line, keys kept in their original order
pub type VariationLine = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl LineCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_line(&self, line: &VariationLine) -> String {
        line.iter()
            .map(|(key, value)| format!("{key}{VALUE_DELIMITER}{value}"))
            .collect::<Vec<_>>()
            .join(&PAIR_DELIMITER.to_string())
    }

    pub fn encode(&self, lines: &[VariationLine]) -> String {
        lines
            .iter()
            .map(|line| self.encode_line(line))
            .collect::<Vec<_>>()
            .join(&LINE_DELIMITER.to_string())
    }

    pub fn decode_line(&self, line: &str) -> Result<VariationLine, CodecError> {
        let mut decoded = VariationLine::new();
        if line.is_empty() {
            return Ok(decoded);
        }
        for pair in line.split(PAIR_DELIMITER) {
            let (key, value) = pair
                .split_once(VALUE_DELIMITER)
                .ok_or_else(|| CodecError::MissingSeparator(pair.to_string()))?;
            if key.is_empty() {
                return Err(CodecError::EmptyKey(pair.to_string()));
            }
            decoded.insert(key.to_string(), value.to_string());
        }
        Ok(decoded)
    }

    pub fn decode(&self, lines: &str) -> Result<Vec<VariationLine>, CodecError> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        lines
            .split(LINE_DELIMITER)
            .map(|line| self.decode_line(line))
            .collect()
    }
}
