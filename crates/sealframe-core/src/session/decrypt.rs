//! Decryption session.

use bytes::{Buf, Bytes, BytesMut};
use sealframe_crypto::{
    AlgorithmSuite, Commitment, ContentKey, CryptoError, DataKey, TrailerVerifier,
    derive_content_key, open_detached, verify_commitment,
};
use sealframe_proto::{
    BodyKind, ContentType, DecodedHeader, EncryptionContext, Frame, MessageHeader, NonFramedBody,
    ProtocolError, SINGLE_BLOCK_SEQUENCE_NUMBER, Trailer, body_aad, frame_iv,
};

use super::{
    Location, RESERVED_PUBLIC_KEY, SessionAction, SessionState, crypto_fault, strip_reserved,
};
use crate::{
    config::SessionConfig,
    error::{SessionError, SessionFault},
    materials::KeyRequest,
};

/// Parsed but unauthenticated header, waiting for the data key.
#[derive(Debug)]
struct PendingHeader {
    header: MessageHeader,
    /// Exact header bytes as received
    raw: Bytes,
    /// Length of the prefix covered by the header tag
    authenticated_len: usize,
}

/// Streaming decryption of one message.
///
/// ```text
/// update* ─> RequestDataKey ─> provide_data_key ─> update* ─> finish
/// ```
///
/// Input may be split anywhere. Nothing derived from the header is trusted
/// until its tag verifies with the content key, and each frame's plaintext is
/// released only after the frame itself authenticates.
///
/// # Security
///
/// Checks run in a fixed order. Structural header checks come first and never
/// touch key material, then the commitment policy, the key unwrap, the key
/// commitment and finally the header tag. Each frame's sequence number and IV
/// are checked before any decryption is attempted.
#[derive(Debug)]
pub struct Decryptor {
    state: SessionState,
    location: Location,
    config: SessionConfig,
    input: BytesMut,
    pending: Option<PendingHeader>,
    /// Set only once the header tag verified
    header: Option<MessageHeader>,
    content_key: Option<ContentKey>,
    verifier: Option<TrailerVerifier>,
    next_sequence_number: u32,
    plaintext_len: u64,
}

impl Decryptor {
    /// Create a session in [`SessionState::Initialized`].
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config` is inconsistent
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;

        Ok(Self {
            state: SessionState::Initialized,
            location: Location::default(),
            config: config.clone(),
            input: BytesMut::new(),
            pending: None,
            header: None,
            content_key: None,
            verifier: None,
            next_sequence_number: 1,
            plaintext_len: 0,
        })
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The header, once its tag has verified.
    pub fn header(&self) -> Option<&MessageHeader> {
        self.header.as_ref()
    }

    /// Verified encryption context without reserved keys.
    pub fn encryption_context(&self) -> Option<EncryptionContext> {
        self.header.as_ref().map(|h| strip_reserved(&h.encryption_context))
    }

    /// Plaintext bytes released so far.
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    /// Feed ciphertext.
    ///
    /// Returns a key request once the header has been parsed, and one output
    /// per authenticated frame afterwards.
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` / `UnknownSuite` for structurally invalid headers
    /// - `CommitmentRequired` if the policy rejects the message's suite
    /// - `LimitExceeded` if the header outgrows `max_header_size`
    /// - `UnexpectedSequenceNumber`, `IvMismatch`, `BodyAuthenticationFailed`
    ///   or `MalformedBody` for a bad frame
    /// - `SignatureInvalid` if the trailer does not verify
    /// - `TrailingData` if bytes follow the end of the message
    pub fn update(&mut self, bytes: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        match self.state {
            SessionState::Aborted => return Err(self.invalid_state("update")),
            SessionState::Complete if bytes.is_empty() => return Ok(Vec::new()),
            SessionState::Complete => {
                return Err(self.location.error(SessionFault::TrailingData { len: bytes.len() }));
            },
            _ => {},
        }

        self.input.extend_from_slice(bytes);
        let result = self.advance();
        self.guard(result)
    }

    fn advance(&mut self) -> Result<Vec<SessionAction>, SessionFault> {
        match self.state {
            SessionState::Initialized => self.read_header(),
            SessionState::HeaderPending => {
                if self.input.len() > self.config.max_header_size {
                    return Err(SessionFault::LimitExceeded {
                        what: "input buffered before key",
                        limit: self.config.max_header_size as u64,
                    });
                }
                Ok(Vec::new())
            },
            SessionState::FramesInProgress | SessionState::Finalizing => {
                let mut actions = Vec::new();
                self.read_body(&mut actions)?;
                Ok(actions)
            },
            SessionState::Complete | SessionState::Aborted => Ok(Vec::new()),
        }
    }

    fn read_header(&mut self) -> Result<Vec<SessionAction>, SessionFault> {
        let limit = self.config.max_header_size;
        let exceeded = || SessionFault::LimitExceeded { what: "header", limit: limit as u64 };

        let decoded = match MessageHeader::decode(&self.input, &self.config.decode_limits()) {
            Ok(decoded) => decoded,
            Err(err) if err.is_incomplete() => {
                if self.input.len() > limit {
                    return Err(exceeded());
                }
                return Ok(Vec::new());
            },
            Err(ProtocolError::UnknownSuite(suite_id)) => {
                return Err(SessionFault::UnknownSuite { suite_id });
            },
            Err(err) => return Err(SessionFault::MalformedHeader(err)),
        };

        let DecodedHeader { header, authenticated_len, encoded_len } = decoded;
        if encoded_len > limit {
            return Err(exceeded());
        }

        let suite = header.suite;
        self.location.suite = Some(suite);
        self.location.message_id = Some(header.message_id.clone());

        if !self.config.commitment_policy.allows_decrypt(suite) {
            return Err(SessionFault::CommitmentRequired { suite_id: suite.id });
        }

        let raw = self.input.split_to(encoded_len).freeze();
        let request = KeyRequest::Decrypt {
            suite,
            encrypted_data_keys: header.encrypted_data_keys.clone(),
            context: header.encryption_context.clone(),
        };

        tracing::debug!(
            suite_id = suite.id,
            message_id = %self.location.message_id_hex(),
            edks = header.encrypted_data_keys.len(),
            "header parsed"
        );

        self.pending = Some(PendingHeader { header, raw, authenticated_len });
        self.transition(SessionState::HeaderPending);

        Ok(vec![SessionAction::RequestDataKey(request)])
    }

    /// Accept the unwrapped data key.
    ///
    /// Verifies the key commitment and the header tag, then processes any
    /// body bytes already buffered. Transitions
    /// `HeaderPending -> FramesInProgress` (and further if the buffered input
    /// already holds the rest of the message).
    ///
    /// # Errors
    ///
    /// - `InvalidDataKey` if the key length does not match the suite
    /// - `CommitmentMismatch` if the key does not match the header commitment
    /// - `HeaderAuthenticationFailed` if the header tag does not verify
    /// - `InvalidVerificationKey` if a signed message lacks a usable key
    /// - Everything [`Self::update`] reports for buffered frames
    pub fn provide_data_key(
        &mut self,
        data_key: DataKey,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::HeaderPending {
            return Err(self.invalid_state("provide_data_key"));
        }

        let result = self.accept_key(data_key);
        self.guard(result)
    }

    fn accept_key(&mut self, data_key: DataKey) -> Result<Vec<SessionAction>, SessionFault> {
        let Some(PendingHeader { header, raw, authenticated_len }) = self.pending.take() else {
            return Err(SessionFault::InvalidState {
                state: self.state,
                operation: "provide_data_key",
            });
        };
        let suite = header.suite;

        let derived =
            derive_content_key(suite, &data_key, &header.message_id).map_err(crypto_fault)?;
        drop(data_key);

        match (&derived.commitment, header.commitment) {
            (Some(derived), Some(stored)) => {
                verify_commitment(derived, &Commitment::from_bytes(stored))
                    .map_err(crypto_fault)?;
            },
            (None, None) => {},
            _ => return Err(SessionFault::CommitmentMismatch),
        }

        open_detached(
            suite,
            &derived.content_key,
            &header.tag_iv(),
            &raw[..authenticated_len],
            &mut [],
            &header.auth_tag,
        )
        .map_err(|err| match err {
            CryptoError::AuthenticationFailed => SessionFault::HeaderAuthenticationFailed,
            other => crypto_fault(other),
        })?;

        // INVARIANT: the context is authenticated from here on
        if suite.is_signed() {
            let mut verifier = trailer_verifier(&header.encryption_context)?;
            verifier.update(&raw);
            self.verifier = Some(verifier);
        }

        self.content_key = Some(derived.content_key);
        self.header = Some(header);
        self.transition(SessionState::FramesInProgress);

        let mut actions = Vec::new();
        self.read_body(&mut actions)?;
        Ok(actions)
    }

    /// Consume as many complete body items as the buffer holds.
    fn read_body(&mut self, actions: &mut Vec<SessionAction>) -> Result<(), SessionFault> {
        let Some((suite, content_type, frame_length)) =
            self.header.as_ref().map(|h| (h.suite, h.content_type, h.frame_length))
        else {
            return Err(SessionFault::InvalidState { state: self.state, operation: "read body" });
        };

        loop {
            let progressed = match (self.state, content_type) {
                (SessionState::FramesInProgress, ContentType::Framed) => {
                    self.read_frame(suite, frame_length, actions)?
                },
                (SessionState::FramesInProgress, ContentType::NonFramed) => {
                    self.read_single_block(suite, actions)?
                },
                (SessionState::Finalizing, _) => self.read_trailer(actions)?,
                _ => false,
            };

            if !progressed {
                return Ok(());
            }
        }
    }

    fn read_frame(
        &mut self,
        suite: &'static AlgorithmSuite,
        frame_length: u32,
        actions: &mut Vec<SessionAction>,
    ) -> Result<bool, SessionFault> {
        let expected = self.next_sequence_number;
        self.location.sequence_number = Some(expected);

        let Some((frame, used)) = body_item(Frame::decode(&self.input, suite, frame_length))?
        else {
            return Ok(false);
        };

        if frame.sequence_number != expected {
            return Err(SessionFault::UnexpectedSequenceNumber {
                expected,
                actual: frame.sequence_number,
            });
        }
        if frame.iv[..] != frame_iv(suite, expected)[..] {
            return Err(SessionFault::IvMismatch);
        }

        let content_len = frame.ciphertext.len() as u64;
        let aad = body_aad(self.message_id(), frame.kind(), expected, content_len);
        let mut plaintext = frame.ciphertext.to_vec();
        self.open(suite, &frame.iv, &aad, &mut plaintext, &frame.tag)?;

        self.consume(used);
        self.next_sequence_number += 1;
        self.release(plaintext, actions);

        if frame.is_final {
            self.end_of_body(actions)?;
        }
        Ok(true)
    }

    fn read_single_block(
        &mut self,
        suite: &'static AlgorithmSuite,
        actions: &mut Vec<SessionAction>,
    ) -> Result<bool, SessionFault> {
        let sequence_number = SINGLE_BLOCK_SEQUENCE_NUMBER;
        self.location.sequence_number = Some(sequence_number);

        let decoded = NonFramedBody::decode(&self.input, suite, self.config.max_body_size);
        let Some((body, used)) = body_item(decoded)? else {
            return Ok(false);
        };

        if body.iv[..] != frame_iv(suite, sequence_number)[..] {
            return Err(SessionFault::IvMismatch);
        }

        let aad = body_aad(
            self.message_id(),
            BodyKind::SingleBlock,
            sequence_number,
            body.ciphertext.len() as u64,
        );
        let mut plaintext = body.ciphertext.to_vec();
        self.open(suite, &body.iv, &aad, &mut plaintext, &body.tag)?;

        self.consume(used);
        self.release(plaintext, actions);
        self.end_of_body(actions)?;
        Ok(true)
    }

    fn read_trailer(&mut self, actions: &mut Vec<SessionAction>) -> Result<bool, SessionFault> {
        self.location.sequence_number = None;

        let Some((trailer, used)) = body_item(Trailer::decode(&self.input))? else {
            return Ok(false);
        };
        self.input.advance(used);

        let Some(verifier) = self.verifier.take() else {
            return Err(SessionFault::InvalidState {
                state: self.state,
                operation: "verify trailer",
            });
        };
        verifier.verify(&trailer.signature).map_err(crypto_fault)?;

        self.complete(actions)?;
        Ok(true)
    }

    fn end_of_body(&mut self, actions: &mut Vec<SessionAction>) -> Result<(), SessionFault> {
        if self.verifier.is_some() {
            self.transition(SessionState::Finalizing);
            Ok(())
        } else {
            self.complete(actions)
        }
    }

    fn complete(&mut self, actions: &mut Vec<SessionAction>) -> Result<(), SessionFault> {
        if !self.input.is_empty() {
            return Err(SessionFault::TrailingData { len: self.input.len() });
        }

        self.content_key = None;
        self.transition(SessionState::Complete);
        actions.push(SessionAction::Complete);

        tracing::debug!(
            message_id = %self.location.message_id_hex(),
            plaintext_len = self.plaintext_len,
            "message verified"
        );
        Ok(())
    }

    fn open(
        &self,
        suite: &AlgorithmSuite,
        iv: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<(), SessionFault> {
        let Some(key) = &self.content_key else {
            return Err(SessionFault::InvalidState { state: self.state, operation: "open frame" });
        };

        open_detached(suite, key, iv, aad, buffer, tag).map_err(crypto_fault)
    }

    /// Drop authenticated bytes from the buffer, feeding them to the
    /// signature digest.
    fn consume(&mut self, used: usize) {
        if let Some(verifier) = &mut self.verifier {
            verifier.update(&self.input[..used]);
        }
        self.input.advance(used);
    }

    fn release(&mut self, plaintext: Vec<u8>, actions: &mut Vec<SessionAction>) {
        self.plaintext_len += plaintext.len() as u64;
        actions.push(SessionAction::Output(Bytes::from(plaintext)));
    }

    fn message_id(&self) -> &[u8] {
        self.header.as_ref().map(|h| h.message_id.as_slice()).unwrap_or_default()
    }

    /// Signal end of input.
    ///
    /// # Errors
    ///
    /// - `Truncated` if the message is not complete; the session aborts
    pub fn finish(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        match self.state {
            SessionState::Complete => Ok(Vec::new()),
            SessionState::Aborted => Err(self.invalid_state("finish")),
            _ => Err(self.fail(SessionFault::Truncated)),
        }
    }

    /// Cancel the session and drop all key material.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        tracing::warn!(
            message_id = %self.location.message_id_hex(),
            state = ?self.state,
            sequence_number = ?self.location.sequence_number,
            "decryption session aborted"
        );

        self.content_key = None;
        self.verifier = None;
        self.pending = None;
        self.input.clear();
        self.state = SessionState::Aborted;
    }

    fn invalid_state(&self, operation: &'static str) -> SessionError {
        self.location.error(SessionFault::InvalidState { state: self.state, operation })
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            message_id = %self.location.message_id_hex(),
            from = ?self.state,
            to = ?next,
            "decryption session transition"
        );
        self.state = next;
    }

    fn guard<T>(&mut self, result: Result<T, SessionFault>) -> Result<T, SessionError> {
        result.map_err(|fault| self.fail(fault))
    }

    /// Abort with `fault`, returning it with the session's location.
    pub(crate) fn fail(&mut self, fault: SessionFault) -> SessionError {
        let err = self.location.error(fault);
        self.abort();
        err
    }
}

/// Treat truncation as "need more input".
fn body_item<T>(result: Result<T, ProtocolError>) -> Result<Option<T>, SessionFault> {
    match result {
        Ok(item) => Ok(Some(item)),
        Err(err) if err.is_incomplete() => Ok(None),
        Err(err) => Err(SessionFault::MalformedBody(err)),
    }
}

fn trailer_verifier(context: &EncryptionContext) -> Result<TrailerVerifier, SessionFault> {
    let encoded = context.get(RESERVED_PUBLIC_KEY).ok_or(SessionFault::InvalidVerificationKey)?;
    let key = hex::decode(encoded).map_err(|_| SessionFault::InvalidVerificationKey)?;
    TrailerVerifier::new(&key).map_err(crypto_fault)
}
