//! Incremental UTF-8 decoding
//!
//! The insight endpoint sends raw bytes with no framing, so a multi-byte
//! character (the rupee sign is three bytes) can be split across two reads.
//! [`Utf8Decoder`] holds the incomplete tail back until the rest arrives.

use thiserror::Error;

/// Longest possible incomplete UTF-8 prefix
const MAX_CARRY: usize = 3;

/// Bytes that cannot become text
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A byte sequence that is not UTF-8 no matter what follows
    #[error("invalid UTF-8 sequence at byte {offset}")]
    Invalid {
        /// Offset of the offending byte from the start of the stream
        offset: u64,
    },
    /// The stream ended in the middle of a character
    #[error("stream ended inside a multi-byte character ({pending} byte(s) pending)")]
    Truncated {
        /// Bytes left in the carry when the stream closed
        pending: usize,
    },
}

/// Stateful UTF-8 decoder with carry-over between blocks
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Incomplete trailing sequence from the previous block
    carry: Vec<u8>,
    /// Bytes turned into text so far (excludes the carry)
    decoded: u64,
    /// Set once an invalid sequence is seen; the decoder accepts nothing after
    failure: Option<DecodeError>,
}

impl Utf8Decoder {
    /// Create a decoder with an empty carry
    #[must_use]
    pub fn new() -> Self {
        Self {
            carry: Vec::with_capacity(MAX_CARRY),
            decoded: 0,
            failure: None,
        }
    }

    /// Decode the next block
    ///
    /// Returns only complete characters. An incomplete sequence at the end of
    /// `bytes` is kept for the next call and never shows up twice.
    ///
    /// When valid text precedes an invalid sequence, that text is returned
    /// and the failure is recorded; see [`Utf8Decoder::failure`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Invalid`] when the input starts with a sequence
    /// that can never be valid UTF-8, or once a failure has been recorded.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<String, DecodeError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let joined: Vec<u8>;
        let input: &[u8] = if self.carry.is_empty() {
            bytes
        } else {
            let mut pending = std::mem::take(&mut self.carry);
            pending.extend_from_slice(bytes);
            joined = pending;
            &joined
        };

        match std::str::from_utf8(input) {
            Ok(text) => {
                self.decoded += input.len() as u64;
                Ok(text.to_owned())
            }
            Err(err) => {
                let valid = err.valid_up_to();
                let (head, tail) = input.split_at(valid);
                let text = std::str::from_utf8(head).map_err(|_| DecodeError::Invalid {
                    offset: self.decoded,
                })?;

                if err.error_len().is_some() {
                    let failure = DecodeError::Invalid {
                        offset: self.decoded + valid as u64,
                    };
                    self.carry.clear();
                    if text.is_empty() {
                        self.failure = Some(failure.clone());
                        return Err(failure);
                    }
                    self.failure = Some(failure);
                } else {
                    self.carry.extend_from_slice(tail);
                }

                self.decoded += valid as u64;
                Ok(text.to_owned())
            }
        }
    }

    /// Invalid sequence found after the text last returned, if any
    #[must_use]
    pub fn failure(&self) -> Option<&DecodeError> {
        self.failure.as_ref()
    }

    /// Number of bytes held back waiting for the rest of a character
    #[must_use]
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Total bytes decoded into text
    #[must_use]
    pub fn decoded_bytes(&self) -> u64 {
        self.decoded
    }

    /// Signal end-of-stream
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Truncated`] if a partial character is still
    /// in the carry.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.carry.is_empty() {
            Ok(())
        } else {
            let pending = self.carry.len();
            self.carry.clear();
            Err(DecodeError::Truncated { pending })
        }
    }
}
