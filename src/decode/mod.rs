//! Payload decoder cascade.
//!
//! A raw scanned string is offered to each grammar in a fixed priority order;
//! the first one that accepts it produces the `Record`. A grammar answers
//! `Ok(Some(_))` (accepted), `Ok(None)` (not this format) or `Err(_)` (the
//! payload is recognized but cannot be decoded here, which ends the cascade).

pub mod clean;
mod markup;
pub mod secure;
mod text;

#[cfg(feature = "inflate")]
pub use secure::FlateInflater;
pub use secure::{to_be_bytes_minimal, Inflater, MIN_SECURE_DIGITS, SECURE_FIELD_COUNT};

use crate::record::Record;
use crate::ScanError;

type GrammarResult = Result<Option<Record>, ScanError>;

/// One entry of the cascade.
struct Grammar {
    name: &'static str,
    attempt: fn(&PayloadDecoder, &str) -> GrammarResult,
}

const CASCADE: &[Grammar] = &[
    Grammar {
        name: "markup",
        attempt: try_markup,
    },
    Grammar {
        name: "secure_qr",
        attempt: try_secure,
    },
    Grammar {
        name: "json",
        attempt: try_json,
    },
    Grammar {
        name: "key_value",
        attempt: try_key_value,
    },
    Grammar {
        name: "delimited",
        attempt: try_delimited,
    },
];

fn try_markup(_: &PayloadDecoder, raw: &str) -> GrammarResult {
    Ok(markup::parse(raw))
}

fn try_secure(decoder: &PayloadDecoder, raw: &str) -> GrammarResult {
    secure::parse(raw, decoder.inflater.as_deref())
}

fn try_json(_: &PayloadDecoder, raw: &str) -> GrammarResult {
    Ok(text::parse_json(raw))
}

fn try_key_value(_: &PayloadDecoder, raw: &str) -> GrammarResult {
    Ok(text::parse_key_value(raw))
}

fn try_delimited(_: &PayloadDecoder, raw: &str) -> GrammarResult {
    Ok(text::parse_delimited(raw))
}

/// Stateless decoder apart from its inflate capability.
pub struct PayloadDecoder {
    inflater: Option<Box<dyn Inflater>>,
}

impl PayloadDecoder {
    /// Decoder with the inflate capability this build provides.
    pub fn new() -> Self {
        #[cfg(feature = "inflate")]
        {
            Self::with_inflater(Box::new(FlateInflater))
        }
        #[cfg(not(feature = "inflate"))]
        {
            Self::without_inflater()
        }
    }

    pub fn with_inflater(inflater: Box<dyn Inflater>) -> Self {
        Self {
            inflater: Some(inflater),
        }
    }

    /// Decoder for environments with no stream decompression.
    pub fn without_inflater() -> Self {
        Self { inflater: None }
    }

    pub fn can_inflate(&self) -> bool {
        self.inflater.is_some()
    }

    /// Names of the grammars in priority order.
    pub fn grammar_names() -> Vec<&'static str> {
        CASCADE.iter().map(|grammar| grammar.name).collect()
    }

    /// Classify and parse one raw payload.
    pub fn decode(&self, raw: &str) -> Result<Record, ScanError> {
        for grammar in CASCADE {
            if let Some(record) = (grammar.attempt)(self, raw)? {
                log::debug!("payload accepted by {} grammar", grammar.name);
                return Ok(record);
            }
        }
        log::debug!("payload ({} bytes) matched no grammar", raw.len());
        Err(ScanError::UnrecognizedFormat)
    }
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        Self::new()
    }
}
