//! Conversion error type.
//!
//! Errors carry a stable machine-readable code alongside the human-readable
//! message so callers can branch without string matching. Malformed markup is
//! deliberately not an error category here: structural problems are healed in
//! place and at most logged.

use core::fmt;

/// Error produced while converting a markup stream.
#[derive(Debug)]
pub struct ConvertError {
    /// Stable error code, one of the `pub const` codes on this type.
    pub code: &'static str,
    /// Human-readable detail.
    pub message: Box<str>,
    /// Tag being processed when the error occurred, when known.
    pub tag: Option<Box<str>>,
    /// Byte offset into the input, when the front end can supply one.
    pub offset: Option<usize>,
}

impl ConvertError {
    /// An external resource resolver reported a hard failure.
    pub const RESOURCE_FAILED: &'static str = "RESOURCE_FAILED";
    /// The underlying tokenizer rejected the input.
    pub const TOKENIZE_ERROR: &'static str = "TOKENIZE_ERROR";
    /// Text content could not be decoded.
    pub const TEXT_DECODE_ERROR: &'static str = "TEXT_DECODE_ERROR";
    /// A character or entity reference could not be resolved.
    pub const ENTITY_ERROR: &'static str = "ENTITY_ERROR";
    /// Attribute bytes on a single element exceeded the configured limit.
    pub const ATTR_BYTES_LIMIT: &'static str = "ATTR_BYTES_LIMIT";

    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
            tag: None,
            offset: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into().into_boxed_str());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(tag) = &self.tag {
            write!(f, " [tag={tag}]")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " [offset={offset}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConvertError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_context() {
        let err = ConvertError::new(ConvertError::TOKENIZE_ERROR, "unexpected end of input")
            .with_tag("table")
            .with_offset(42);
        let rendered = err.to_string();
        assert!(rendered.starts_with("TOKENIZE_ERROR: unexpected end of input"));
        assert!(rendered.contains("[tag=table]"));
        assert!(rendered.contains("[offset=42]"));
    }

    #[test]
    fn bare_error_omits_optional_fields() {
        let err = ConvertError::new(ConvertError::RESOURCE_FAILED, "fetch failed");
        assert_eq!(err.to_string(), "RESOURCE_FAILED: fetch failed");
    }
}
