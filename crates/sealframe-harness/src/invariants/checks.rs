//! Standard message invariants.

use super::{Invariant, InvariantResult, MessageSnapshot, Violation};

/// Regular frames carry exactly `frame_length` bytes and the final frame at
/// most that many.
pub struct FramesFollowFrameLength;

impl Invariant for FramesFollowFrameLength {
    fn name(&self) -> &'static str {
        "frames_follow_frame_length"
    }

    fn check(&self, state: &MessageSnapshot) -> InvariantResult {
        let frame_length = state.frame_length() as usize;
        if frame_length == 0 {
            return Ok(());
        }

        for frame in &state.layout.frames {
            let len = frame.ciphertext.len();
            let fits = if frame.is_final { len <= frame_length } else { len == frame_length };
            if !fits {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "frame {} carries {len} bytes with frame length {frame_length}",
                        frame.sequence_number
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Sequence numbers run 1, 2, 3 … and only the last frame is final.
pub struct SequenceContiguity;

impl Invariant for SequenceContiguity {
    fn name(&self) -> &'static str {
        "sequence_contiguity"
    }

    fn check(&self, state: &MessageSnapshot) -> InvariantResult {
        let frames = &state.layout.frames;
        for (index, frame) in frames.iter().enumerate() {
            let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let last = index + 1 == frames.len();

            if frame.sequence_number != expected || frame.is_final != last {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "frame at position {index} has sequence {} (final: {}), \
                         expected {expected} (final: {last})",
                        frame.sequence_number, frame.is_final
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Body ciphertext is exactly as long as the plaintext.
pub struct CiphertextCoversPlaintext;

impl Invariant for CiphertextCoversPlaintext {
    fn name(&self) -> &'static str {
        "ciphertext_covers_plaintext"
    }

    fn check(&self, state: &MessageSnapshot) -> InvariantResult {
        let total: usize = state.layout.frames.iter().map(|frame| frame.ciphertext.len()).sum();
        if total != state.plaintext_len {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{total} ciphertext bytes for {} plaintext", state.plaintext_len),
            });
        }
        Ok(())
    }
}

/// Commitment, trailer and published verification key appear exactly when
/// the suite calls for them.
pub struct SuiteFeaturesPresent;

impl Invariant for SuiteFeaturesPresent {
    fn name(&self) -> &'static str {
        "suite_features_present"
    }

    fn check(&self, state: &MessageSnapshot) -> InvariantResult {
        let suite = state.layout.header.suite;
        let checks = [
            ("commitment", suite.is_committing(), state.layout.commitment.is_some()),
            ("trailer", suite.is_signed(), state.layout.trailer.is_some()),
            ("verification key", suite.is_signed(), state.publishes_verifying_key()),
        ];

        for (what, expected, present) in checks {
            if expected != present {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "suite {:#06x}: {what} present = {present}, expected {expected}",
                        suite.id
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The parsed message accounts for every byte.
pub struct NoTrailingBytes;

impl Invariant for NoTrailingBytes {
    fn name(&self) -> &'static str {
        "no_trailing_bytes"
    }

    fn check(&self, state: &MessageSnapshot) -> InvariantResult {
        let end = state.layout.trailer.as_ref().map_or(state.layout.body_end(), |t| t.end);
        if end != state.message_len {
            return Err(Violation {
                invariant: self.name(),
                message: format!("message ends at {end} but is {} bytes", state.message_len),
            });
        }
        Ok(())
    }
}
