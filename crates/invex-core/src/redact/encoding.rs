//! Single-byte phrase encoding and length-preserving buffer redaction.

use std::fmt::Write;

use regex::bytes::Regex;

use crate::error::RedactionError;

/// Byte written over every redacted position.
pub const FILLER: u8 = b'-';

const MIN_PHRASE_LEN: usize = 2;

/// A phrase ready to be searched for in a decompressed content stream.
#[derive(Debug, Clone)]
pub struct EncodedPhrase {
    pub phrase: String,
    pattern: Regex,
}

impl EncodedPhrase {
    /// Encode `phrase` as ISO-8859-1 and check it cannot interact with filler runs.
    pub fn new(phrase: &str) -> Result<Self, RedactionError> {
        let bytes = encode_latin1(phrase)?;
        check_filler_safe(phrase, &bytes)?;

        let mut pattern = String::from("(?-u)");
        for byte in &bytes {
            // Writing to a String cannot fail.
            let _ = write!(pattern, "\\x{:02X}", byte);
        }
        let pattern = Regex::new(&pattern).map_err(|e| RedactionError::UnsafePhrase {
            phrase: phrase.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            phrase: phrase.to_string(),
            pattern,
        })
    }
}

/// Encode one character per byte; characters above U+00FF are rejected.
pub fn encode_latin1(phrase: &str) -> Result<Vec<u8>, RedactionError> {
    phrase
        .chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| RedactionError::Unencodable {
                phrase: phrase.to_string(),
                character: c,
            })
        })
        .collect()
}

fn check_filler_safe(phrase: &str, bytes: &[u8]) -> Result<(), RedactionError> {
    let reason = if bytes.len() < MIN_PHRASE_LEN {
        Some(format!("shorter than {} characters", MIN_PHRASE_LEN))
    } else if bytes.first() == Some(&FILLER) || bytes.last() == Some(&FILLER) {
        Some("begins or ends with '-'".to_string())
    } else if bytes.windows(2).any(|w| w == [FILLER, FILLER]) {
        Some("contains '--'".to_string())
    } else {
        None
    };

    match reason {
        Some(reason) => Err(RedactionError::UnsafePhrase {
            phrase: phrase.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Outcome of [`redact_buffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRedaction {
    /// Match count per phrase, in input order.
    pub counts: Vec<usize>,
    /// Size of the union of all matched ranges.
    pub bytes: usize,
}

/// Overwrite every occurrence of every phrase with [`FILLER`].
///
/// All phrases are located in the unmodified buffer before anything is
/// written, so the result does not depend on phrase order.
pub fn redact_buffer(buffer: &mut [u8], phrases: &[EncodedPhrase]) -> BufferRedaction {
    let mut ranges = Vec::new();
    let mut counts = Vec::with_capacity(phrases.len());
    for phrase in phrases {
        let before = ranges.len();
        ranges.extend(phrase.pattern.find_iter(buffer).map(|m| m.range()));
        counts.push(ranges.len() - before);
    }

    ranges.sort_by_key(|r| r.start);
    let mut bytes = 0;
    let mut covered = 0;
    for range in ranges {
        bytes += range.end.saturating_sub(range.start.max(covered));
        covered = covered.max(range.end);
        buffer[range].fill(FILLER);
    }

    BufferRedaction { counts, bytes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(phrases: &[&str]) -> Vec<EncodedPhrase> {
        phrases.iter().map(|p| EncodedPhrase::new(p).unwrap()).collect()
    }

    #[test]
    fn test_latin1_encoding() {
        assert_eq!(encode_latin1("Müller").unwrap(), b"M\xfcller");
        assert_eq!(encode_latin1("Straße").unwrap().len(), 6);

        match encode_latin1("Łukasz") {
            Err(RedactionError::Unencodable { character, .. }) => assert_eq!(character, 'Ł'),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(encode_latin1("5 €").is_err());
    }

    #[test]
    fn test_unsafe_phrases() {
        for phrase in ["x", "-abc", "abc-", "a--b", ""] {
            assert!(
                matches!(
                    EncodedPhrase::new(phrase),
                    Err(RedactionError::UnsafePhrase { .. })
                ),
                "{:?} should be rejected",
                phrase
            );
        }
        assert!(EncodedPhrase::new("Kd-Nr. 4711").is_ok());
    }

    #[test]
    fn test_length_invariant() {
        let mut buffer = b"(Herr M\xfcller) Tj (12345 Musterstadt) Tj".to_vec();
        let len = buffer.len();

        let result = redact_buffer(&mut buffer, &encoded(&["Herr Müller", "12345 Musterstadt"]));

        assert_eq!(result.counts, vec![1, 1]);
        assert_eq!(result.bytes, 28);
        assert_eq!(buffer.len(), len);
        assert_eq!(buffer, b"(-----------) Tj (-----------------) Tj".to_vec());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let mut buffer = b"Kd.Nr (x) Kd-Nr. 4711".to_vec();
        let result = redact_buffer(&mut buffer, &encoded(&["Kd-Nr. 4711", "(x)"]));
        assert_eq!(result.counts, vec![1, 1]);
        assert_eq!(buffer, b"Kd.Nr --- -----------".to_vec());
    }

    #[test]
    fn test_order_independence() {
        let original = b"Firma ACME GmbH, ACME GmbH Hauptstr. 7".to_vec();
        let phrases = ["ACME GmbH", "Firma ACME GmbH", "GmbH Hauptstr", "Hauptstr. 7"];

        let mut forward = original.clone();
        let result = redact_buffer(&mut forward, &encoded(&phrases));
        assert_eq!(result.counts, vec![2, 1, 1, 1]);
        assert_eq!(result.bytes, 36);

        let mut reversed_phrases = phrases;
        reversed_phrases.reverse();
        let mut backward = original.clone();
        redact_buffer(&mut backward, &encoded(&reversed_phrases));

        assert_eq!(forward, backward);
        assert_eq!(forward, format!("{}, {}", "-".repeat(15), "-".repeat(21)).into_bytes());
    }

    #[test]
    fn test_idempotent() {
        let phrases = encoded(&["Herr Müller", "Frau Müller", "Kd-Nr. 4711"]);
        let mut buffer = b"Herr M\xfcllerFrau M\xfcller Kd-Nr. 4711 M\xfcller".to_vec();

        redact_buffer(&mut buffer, &phrases);
        let once = buffer.clone();
        let again = redact_buffer(&mut buffer, &phrases);

        assert_eq!(again.counts, vec![0, 0, 0]);
        assert_eq!(again.bytes, 0);
        assert_eq!(buffer, once);
        assert!(buffer.ends_with(b" M\xfcller"));
    }
}
