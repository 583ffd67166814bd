//! Encryption session.

use bytes::Bytes;
use sealframe_crypto::{
    AlgorithmSuite, ContentKey, SuiteId, TrailerSigner, derive_content_key, lookup, seal_detached,
};
use sealframe_proto::{
    BodyKind, ContentType, EncryptionContext, Frame, MAX_NON_FRAMED_LEN, MAX_SEQUENCE_NUMBER,
    MessageHeader, NonFramedBody, SINGLE_BLOCK_SEQUENCE_NUMBER, Trailer, body_aad, frame_iv,
};
use zeroize::Zeroizing;

use super::{
    Location, RESERVED_PUBLIC_KEY, SessionAction, SessionState, crypto_fault, is_reserved_key,
    strip_reserved,
};
use crate::{
    config::SessionConfig,
    env::Environment,
    error::{SessionError, SessionFault},
    materials::{EncryptionMaterials, KeyRequest},
};

/// Parameters of one encryption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptRequest {
    /// Suite to encrypt with; `None` selects the policy default
    pub suite_id: Option<SuiteId>,
    /// Caller context to bind to the message
    pub encryption_context: EncryptionContext,
}

impl EncryptRequest {
    /// Request with the default suite.
    pub fn new(encryption_context: EncryptionContext) -> Self {
        Self { suite_id: None, encryption_context }
    }

    /// Use a specific suite.
    #[must_use]
    pub fn with_suite(mut self, suite_id: SuiteId) -> Self {
        self.suite_id = Some(suite_id);
        self
    }
}

/// Streaming encryption of one message.
///
/// ```text
/// new ─> start ─> provide_materials ─> update* ─> finish
/// ```
///
/// Regular frames are emitted only once more than `frame_length` plaintext
/// bytes are buffered, so the bytes held back always fit in the final frame
/// and a final frame is always written, even for empty input.
#[derive(Debug)]
pub struct Encryptor {
    state: SessionState,
    location: Location,
    suite: &'static AlgorithmSuite,
    message_id: Vec<u8>,
    /// Context written to the header, including reserved keys
    context: EncryptionContext,
    content_type: ContentType,
    frame_length: u32,
    max_body_size: u64,
    content_key: Option<ContentKey>,
    signer: Option<TrailerSigner>,
    header: Option<MessageHeader>,
    buffer: Zeroizing<Vec<u8>>,
    next_sequence_number: u32,
    plaintext_len: u64,
}

impl Encryptor {
    /// Create a session in [`SessionState::Initialized`].
    ///
    /// Draws the message id and, for signed suites, the signing key seed from
    /// `env`.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config` is inconsistent
    /// - `UnknownSuite` if the requested suite is not registered
    /// - `SuiteNotAllowed` if the commitment policy forbids the suite
    /// - `ReservedContextKey` if the caller context uses a reserved key
    pub fn new<E: Environment>(
        request: EncryptRequest,
        config: &SessionConfig,
        env: &E,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let suite_id = request.suite_id.unwrap_or_else(|| config.commitment_policy.default_suite());
        let suite = lookup(suite_id).map_err(|_| SessionFault::UnknownSuite { suite_id })?;

        if !config.commitment_policy.allows_encrypt(suite) {
            return Err(SessionFault::SuiteNotAllowed { suite_id }.into());
        }

        if let Some(key) = request.encryption_context.keys().find(|k| is_reserved_key(k)) {
            return Err(SessionFault::ReservedContextKey { key: key.clone() }.into());
        }

        let mut message_id = vec![0u8; suite.message_id_len()];
        env.random_bytes(&mut message_id);

        let mut context = request.encryption_context;
        let signer = if suite.is_signed() {
            let signer =
                TrailerSigner::new(suite, env.random_array()).map_err(crypto_fault)?;
            context.insert(RESERVED_PUBLIC_KEY.to_owned(), hex::encode(signer.verifying_key()));
            Some(signer)
        } else {
            None
        };

        let content_type =
            if config.frame_length == 0 { ContentType::NonFramed } else { ContentType::Framed };

        let location = Location {
            suite: Some(suite),
            message_id: Some(message_id.clone()),
            sequence_number: None,
        };

        tracing::debug!(
            suite_id = suite.id,
            message_id = %location.message_id_hex(),
            frame_length = config.frame_length,
            "encryption session created"
        );

        Ok(Self {
            state: SessionState::Initialized,
            location,
            suite,
            message_id,
            context,
            content_type,
            frame_length: config.frame_length,
            max_body_size: config.max_body_size.min(MAX_NON_FRAMED_LEN),
            content_key: None,
            signer,
            header: None,
            buffer: Zeroizing::new(Vec::new()),
            next_sequence_number: 1,
            plaintext_len: 0,
        })
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Suite the message is encrypted with.
    pub fn suite(&self) -> &'static AlgorithmSuite {
        self.suite
    }

    /// Message id written to the header.
    pub fn message_id(&self) -> &[u8] {
        &self.message_id
    }

    /// Caller context bound to the message, without reserved keys.
    pub fn encryption_context(&self) -> EncryptionContext {
        strip_reserved(&self.context)
    }

    /// The header, once written.
    pub fn header(&self) -> Option<&MessageHeader> {
        self.header.as_ref()
    }

    /// Plaintext bytes accepted so far.
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    /// Request a data key.
    ///
    /// Transitions `Initialized -> HeaderPending`.
    pub fn start(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_state(SessionState::Initialized, "start")?;
        self.transition(SessionState::HeaderPending);

        Ok(vec![SessionAction::RequestDataKey(KeyRequest::Generate {
            suite: self.suite,
            context: self.context.clone(),
        })])
    }

    /// Accept the materials manager's answer and write the header.
    ///
    /// Derives the content key (and commitment), authenticates the header and
    /// outputs it. Transitions `HeaderPending -> FramesInProgress`.
    ///
    /// # Errors
    ///
    /// - `NoEncryptedDataKeys` / `InvalidDataKey` for unusable materials
    /// - `MalformedHeader` if the header cannot be encoded (oversized
    ///   context or EDKs)
    pub fn provide_materials(
        &mut self,
        materials: EncryptionMaterials,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_state(SessionState::HeaderPending, "provide_materials")?;
        let result = self.write_header(materials);
        self.guard(result)
    }

    fn write_header(
        &mut self,
        materials: EncryptionMaterials,
    ) -> Result<Vec<SessionAction>, SessionFault> {
        let EncryptionMaterials { data_key, encrypted_data_keys } = materials;

        if encrypted_data_keys.is_empty() {
            return Err(SessionFault::NoEncryptedDataKeys);
        }

        let derived =
            derive_content_key(self.suite, &data_key, &self.message_id).map_err(crypto_fault)?;
        drop(data_key);

        let mut header = MessageHeader::new(
            self.suite,
            self.message_id.clone(),
            self.context.clone(),
            encrypted_data_keys,
            self.content_type,
            self.frame_length,
        )
        .map_err(SessionFault::MalformedHeader)?;
        header.commitment = derived.commitment.as_ref().map(|c| *c.as_bytes());

        let aad = header.authenticated_bytes().map_err(SessionFault::MalformedHeader)?;
        header.auth_tag =
            seal_detached(self.suite, &derived.content_key, &header.tag_iv(), &aad, &mut [])
                .map_err(crypto_fault)?;

        let bytes = header.to_bytes().map_err(SessionFault::MalformedHeader)?;
        debug_assert!(bytes.starts_with(&aad));

        if let Some(signer) = &mut self.signer {
            signer.update(&bytes);
        }

        self.content_key = Some(derived.content_key);
        self.header = Some(header);
        self.transition(SessionState::FramesInProgress);

        Ok(vec![SessionAction::Output(Bytes::from(bytes))])
    }

    /// Feed plaintext.
    ///
    /// Emits one output per completed regular frame. Non-framed messages
    /// buffer everything until [`Self::finish`].
    ///
    /// # Errors
    ///
    /// - `LimitExceeded` if a non-framed body grows past `max_body_size`
    /// - `SequenceExhausted` if the message needs more frames than sequence
    ///   numbers exist
    pub fn update(&mut self, plaintext: &[u8]) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_state(SessionState::FramesInProgress, "update")?;
        let result = self.absorb(plaintext);
        self.guard(result)
    }

    fn absorb(&mut self, plaintext: &[u8]) -> Result<Vec<SessionAction>, SessionFault> {
        self.plaintext_len += plaintext.len() as u64;

        if self.content_type == ContentType::NonFramed {
            if self.plaintext_len > self.max_body_size {
                return Err(SessionFault::LimitExceeded {
                    what: "non-framed body",
                    limit: self.max_body_size,
                });
            }
            self.buffer.extend_from_slice(plaintext);
            return Ok(Vec::new());
        }

        self.buffer.extend_from_slice(plaintext);

        let frame_length = self.frame_length as usize;
        let mut actions = Vec::new();
        let mut consumed = 0;

        // Strictly greater: the last frame_length bytes may be the final frame
        while self.buffer.len() - consumed > frame_length {
            // The final frame needs a sequence number of its own
            if self.next_sequence_number >= MAX_SEQUENCE_NUMBER {
                return Err(SessionFault::SequenceExhausted);
            }

            let chunk = self.buffer[consumed..consumed + frame_length].to_vec();
            let frame = self.seal_frame(false, Zeroizing::new(chunk))?;
            actions.push(SessionAction::Output(frame));
            consumed += frame_length;
        }

        self.buffer.drain(..consumed);
        Ok(actions)
    }

    /// Finish the message.
    ///
    /// Writes the final frame (or the single block) and, for signed suites,
    /// the signature trailer. Transitions through `Finalizing` to `Complete`.
    pub fn finish(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.expect_state(SessionState::FramesInProgress, "finish")?;
        let result = self.finalize();
        self.guard(result)
    }

    fn finalize(&mut self) -> Result<Vec<SessionAction>, SessionFault> {
        let remaining = Zeroizing::new(std::mem::take(&mut *self.buffer));

        let body = match self.content_type {
            ContentType::Framed => self.seal_frame(true, remaining)?,
            ContentType::NonFramed => self.seal_single_block(remaining)?,
        };

        self.transition(SessionState::Finalizing);
        let mut actions = vec![SessionAction::Output(body)];

        if let Some(signer) = self.signer.take() {
            let trailer = Trailer { signature: Bytes::copy_from_slice(&signer.finalize()) };
            let mut bytes = Vec::with_capacity(trailer.encoded_len());
            trailer.encode(&mut bytes).map_err(SessionFault::MalformedBody)?;
            actions.push(SessionAction::Output(Bytes::from(bytes)));
        }

        self.content_key = None;
        self.transition(SessionState::Complete);
        actions.push(SessionAction::Complete);

        tracing::debug!(
            suite_id = self.suite.id,
            message_id = %self.location.message_id_hex(),
            plaintext_len = self.plaintext_len,
            frames = self.next_sequence_number - 1,
            "message sealed"
        );

        Ok(actions)
    }

    /// Encrypt one frame and return its encoding.
    fn seal_frame(
        &mut self,
        is_final: bool,
        mut content: Zeroizing<Vec<u8>>,
    ) -> Result<Bytes, SessionFault> {
        let sequence_number = self.next_sequence_number;
        self.location.sequence_number = Some(sequence_number);

        let kind = if is_final { BodyKind::FinalFrame } else { BodyKind::Frame };
        let iv = frame_iv(self.suite, sequence_number);
        let aad = body_aad(&self.message_id, kind, sequence_number, content.len() as u64);
        let tag = self.seal(&iv, &aad, &mut content)?;

        let frame = Frame {
            sequence_number,
            is_final,
            iv: Bytes::from(iv),
            ciphertext: Bytes::copy_from_slice(&content),
            tag: Bytes::from(tag),
        };

        let mut bytes = Vec::with_capacity(frame.encoded_len());
        frame.encode(self.frame_length, &mut bytes).map_err(SessionFault::MalformedBody)?;
        self.emit(&bytes);

        self.next_sequence_number += 1;
        Ok(Bytes::from(bytes))
    }

    fn seal_single_block(
        &mut self,
        mut content: Zeroizing<Vec<u8>>,
    ) -> Result<Bytes, SessionFault> {
        let sequence_number = SINGLE_BLOCK_SEQUENCE_NUMBER;
        self.location.sequence_number = Some(sequence_number);

        let iv = frame_iv(self.suite, sequence_number);
        let content_len = content.len() as u64;
        let aad = body_aad(&self.message_id, BodyKind::SingleBlock, sequence_number, content_len);
        let tag = self.seal(&iv, &aad, &mut content)?;

        let body = NonFramedBody {
            iv: Bytes::from(iv),
            ciphertext: Bytes::copy_from_slice(&content),
            tag: Bytes::from(tag),
        };

        let mut bytes = Vec::with_capacity(body.encoded_len());
        body.encode(&mut bytes).map_err(SessionFault::MalformedBody)?;
        self.emit(&bytes);

        self.next_sequence_number += 1;
        Ok(Bytes::from(bytes))
    }

    fn seal(&self, iv: &[u8], aad: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>, SessionFault> {
        let Some(key) = &self.content_key else {
            return Err(SessionFault::InvalidState {
                state: self.state,
                operation: "seal frame",
            });
        };

        seal_detached(self.suite, key, iv, aad, buffer).map_err(crypto_fault)
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Some(signer) = &mut self.signer {
            signer.update(bytes);
        }
    }

    /// Cancel the session and drop all key material.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        tracing::warn!(
            suite_id = self.suite.id,
            message_id = %self.location.message_id_hex(),
            state = ?self.state,
            "encryption session aborted"
        );

        self.content_key = None;
        self.signer = None;
        self.buffer.clear();
        self.state = SessionState::Aborted;
    }

    fn expect_state(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.location.error(SessionFault::InvalidState { state: self.state, operation }))
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            suite_id = self.suite.id,
            message_id = %self.location.message_id_hex(),
            from = ?self.state,
            to = ?next,
            "encryption session transition"
        );
        self.state = next;
    }

    /// Abort on failure, attaching the session's location to the fault.
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

#[cfg(test)]
mod tests {
    use sealframe_crypto::DataKey;
    use sealframe_proto::{DecodeLimits, EncryptedDataKey};

    use super::*;
    use crate::config::CommitmentPolicy;

    #[derive(Clone)]
    struct CountingEnv;

    impl Environment for CountingEnv {
        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn materials(suite: &AlgorithmSuite) -> EncryptionMaterials {
        EncryptionMaterials {
            data_key: DataKey::new(vec![0x11; suite.data_key_len]),
            encrypted_data_keys: vec![EncryptedDataKey::new("test", &b"k"[..], vec![0x22; 8])],
        }
    }

    fn context() -> EncryptionContext {
        let mut context = EncryptionContext::new();
        context.insert("purpose".to_owned(), "test".to_owned());
        context
    }

    fn encryptor(config: &SessionConfig) -> Encryptor {
        Encryptor::new(EncryptRequest::new(context()), config, &CountingEnv).unwrap()
    }

    fn started(suite_id: SuiteId, config: &SessionConfig) -> Encryptor {
        let request = EncryptRequest::new(context()).with_suite(suite_id);
        let mut enc = Encryptor::new(request, config, &CountingEnv).unwrap();
        enc.start().unwrap();
        let suite = enc.suite();
        enc.provide_materials(materials(suite)).unwrap();
        enc
    }

    fn output_lens(actions: &[SessionAction]) -> Vec<usize> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Output(bytes) => Some(bytes.len()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn lifecycle_transitions() {
        let config = SessionConfig::default();
        let mut enc = encryptor(&config);
        assert_eq!(enc.state(), SessionState::Initialized);

        let actions = enc.start().unwrap();
        assert_eq!(enc.state(), SessionState::HeaderPending);
        assert!(matches!(
            &actions[..],
            [SessionAction::RequestDataKey(KeyRequest::Generate { .. })]
        ));

        let actions = enc.provide_materials(materials(enc.suite())).unwrap();
        assert_eq!(enc.state(), SessionState::FramesInProgress);
        assert_eq!(output_lens(&actions).len(), 1);

        let actions = enc.finish().unwrap();
        assert_eq!(enc.state(), SessionState::Complete);
        assert_eq!(actions.last(), Some(&SessionAction::Complete));
    }

    #[test]
    fn default_suite_is_signed_and_committing() {
        let config = SessionConfig::default();
        let enc = encryptor(&config);

        assert_eq!(enc.suite().id, AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519);
        assert_eq!(enc.message_id().len(), 32);
        assert_eq!(enc.encryption_context(), context());
    }

    #[test]
    fn signed_suite_publishes_verification_key() {
        let config = SessionConfig::default();
        let mut enc = encryptor(&config);

        let actions = enc.start().unwrap();
        let [SessionAction::RequestDataKey(KeyRequest::Generate { context, .. })] = &actions[..]
        else {
            panic!("expected a generate request");
        };
        assert_eq!(context.get(RESERVED_PUBLIC_KEY).map(String::len), Some(64));
    }

    #[test]
    fn frames_emitted_only_past_frame_length() {
        let config = SessionConfig { frame_length: 16, ..Default::default() };
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);

        // Exactly one frame of data is held back for the final frame
        assert!(enc.update(&[0u8; 16]).unwrap().is_empty());

        // One more byte releases the first frame
        let actions = enc.update(&[0u8; 1]).unwrap();
        assert_eq!(output_lens(&actions), vec![4 + 12 + 16 + 16]);

        let actions = enc.finish().unwrap();
        // Final frame with one byte of content, no trailer for this suite
        assert_eq!(output_lens(&actions), vec![4 + 4 + 12 + 4 + 1 + 16]);
    }

    #[test]
    fn ten_thousand_bytes_make_three_frames() {
        let config = SessionConfig::default();
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);

        let mut lens = output_lens(&enc.update(&vec![0xAA; 10_000]).unwrap());
        lens.extend(output_lens(&enc.finish().unwrap()));

        assert_eq!(lens, vec![4 + 12 + 4096 + 16, 4 + 12 + 4096 + 16, 12 + 12 + 1808 + 16]);
    }

    #[test]
    fn empty_message_has_empty_final_frame() {
        let config = SessionConfig::default();
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);

        let actions = enc.finish().unwrap();
        assert_eq!(output_lens(&actions), vec![12 + 12 + 16]);
    }

    #[test]
    fn signed_message_ends_with_trailer() {
        let config = SessionConfig::default();
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY_ED25519, &config);

        let actions = enc.finish().unwrap();
        assert_eq!(output_lens(&actions), vec![12 + 12 + 16, 2 + 64]);
    }

    #[test]
    fn header_is_decodable() {
        let config = SessionConfig::default();
        let request = EncryptRequest::new(context())
            .with_suite(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY);
        let mut enc = Encryptor::new(request, &config, &CountingEnv).unwrap();
        enc.start().unwrap();

        let actions = enc.provide_materials(materials(enc.suite())).unwrap();
        let [SessionAction::Output(bytes)] = &actions[..] else {
            panic!("expected header output");
        };

        let decoded = MessageHeader::decode(bytes, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded.encoded_len, bytes.len());
        assert_eq!(Some(&decoded.header), enc.header());
        assert!(decoded.header.commitment.is_some());
    }

    #[test]
    fn non_framed_buffers_until_finish() {
        let config = SessionConfig { frame_length: 0, ..Default::default() };
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);

        assert!(enc.update(&[1u8; 10_000]).unwrap().is_empty());
        let actions = enc.finish().unwrap();
        assert_eq!(output_lens(&actions), vec![12 + 8 + 10_000 + 16]);
    }

    #[test]
    fn non_framed_limit_aborts() {
        let config = SessionConfig { frame_length: 0, max_body_size: 8, ..Default::default() };
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);

        let err = enc.update(&[0u8; 9]).unwrap_err();
        assert!(matches!(err.fault, SessionFault::LimitExceeded { .. }));
        assert_eq!(enc.state(), SessionState::Aborted);
    }

    #[test]
    fn policy_rejects_non_committing_suite() {
        let config = SessionConfig::default();
        let request = EncryptRequest::new(context())
            .with_suite(AlgorithmSuite::AES_256_GCM_IV12_TAG16_HKDF_SHA256);

        let err = Encryptor::new(request, &config, &CountingEnv).unwrap_err();
        assert_eq!(err.fault, SessionFault::SuiteNotAllowed { suite_id: 0x0178 });
        assert_eq!(err.kind(), crate::ErrorKind::Usage);
    }

    #[test]
    fn forbid_policy_accepts_v1_suites() {
        let config = SessionConfig {
            commitment_policy: CommitmentPolicy::ForbidEncryptAllowDecrypt,
            ..Default::default()
        };
        let enc = encryptor(&config);
        assert_eq!(enc.suite().id, AlgorithmSuite::AES_256_GCM_IV12_TAG16_HKDF_SHA384_ED25519);
        assert_eq!(enc.message_id().len(), 16);
    }

    #[test]
    fn unknown_suite_rejected() {
        let request = EncryptRequest::new(context()).with_suite(0x9999);
        let err = Encryptor::new(request, &SessionConfig::default(), &CountingEnv).unwrap_err();
        assert_eq!(err.fault, SessionFault::UnknownSuite { suite_id: 0x9999 });
    }

    #[test]
    fn reserved_context_key_rejected() {
        let mut context = context();
        context.insert(RESERVED_PUBLIC_KEY.to_owned(), "00".to_owned());

        let err =
            Encryptor::new(EncryptRequest::new(context), &SessionConfig::default(), &CountingEnv)
                .unwrap_err();
        assert!(matches!(err.fault, SessionFault::ReservedContextKey { .. }));
    }

    #[test]
    fn wrong_data_key_length_aborts() {
        let config = SessionConfig::default();
        let mut enc = encryptor(&config);
        enc.start().unwrap();

        let bad = EncryptionMaterials {
            data_key: DataKey::new(vec![0; 16]),
            encrypted_data_keys: materials(enc.suite()).encrypted_data_keys,
        };
        let err = enc.provide_materials(bad).unwrap_err();

        assert_eq!(err.fault, SessionFault::InvalidDataKey { expected: 32, actual: 16 });
        assert_eq!(enc.state(), SessionState::Aborted);
    }

    #[test]
    fn missing_edks_abort() {
        let config = SessionConfig::default();
        let mut enc = encryptor(&config);
        enc.start().unwrap();

        let bad = EncryptionMaterials {
            data_key: DataKey::new(vec![0; 32]),
            encrypted_data_keys: Vec::new(),
        };
        let err = enc.provide_materials(bad).unwrap_err();
        assert_eq!(err.fault, SessionFault::NoEncryptedDataKeys);
    }

    #[test]
    fn calls_out_of_order_are_usage_errors() {
        let config = SessionConfig::default();
        let mut enc = encryptor(&config);

        let err = enc.update(b"early").unwrap_err();
        assert!(matches!(err.fault, SessionFault::InvalidState { operation: "update", .. }));
        // Misuse does not destroy the session
        assert_eq!(enc.state(), SessionState::Initialized);
    }

    #[test]
    fn terminal_sessions_reject_everything() {
        let config = SessionConfig::default();
        let mut enc = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);
        enc.finish().unwrap();

        assert!(enc.update(b"late").is_err());
        assert!(enc.finish().is_err());
        assert!(enc.start().is_err());

        let mut aborted = started(AlgorithmSuite::AES_256_GCM_HKDF_SHA512_COMMIT_KEY, &config);
        aborted.abort();
        assert_eq!(aborted.state(), SessionState::Aborted);
        assert!(matches!(
            aborted.update(b"x").unwrap_err().fault,
            SessionFault::InvalidState { state: SessionState::Aborted, .. }
        ));
    }
}
