//! Async drivers.
//!
//! Sessions never block; these functions execute their actions. Key requests
//! go to the materials manager under the configured timeout, and outputs are
//! collected or written to the caller's stream. The materials manager call is
//! the only suspension point besides the caller's own I/O.

use std::{collections::VecDeque, time::Duration};

use bytes::Bytes;
use sealframe_proto::{EncryptionContext, MessageHeader};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::{
    config::SessionConfig,
    env::Environment,
    error::{SessionError, SessionFault},
    materials::{KeyRequest, KeyResponse, MaterialsManager},
    session::{Decryptor, EncryptRequest, Encryptor, SessionAction, SessionState},
};

/// Result of [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptOutput {
    /// Complete encrypted message
    pub ciphertext: Vec<u8>,
    /// Header written at the start of `ciphertext`
    pub header: MessageHeader,
}

/// Result of [`decrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptOutput {
    /// Verified plaintext
    pub plaintext: Vec<u8>,
    /// Verified caller context, without reserved keys
    pub encryption_context: EncryptionContext,
    /// Verified header
    pub header: MessageHeader,
}

/// Result of [`encrypt_stream`] and [`decrypt_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Header of the message
    pub header: MessageHeader,
    /// Caller context bound to the message, without reserved keys
    pub encryption_context: EncryptionContext,
    /// Plaintext bytes read or written
    pub plaintext_len: u64,
}

/// Ask the materials manager, bounded by `timeout`.
///
/// Dropping the returned future cancels the call.
///
/// # Errors
///
/// - `Collaborator` with the manager's error, unchanged
/// - `KeyAcquisitionTimedOut` if the manager does not answer in time
pub async fn acquire<M>(
    manager: &M,
    request: &KeyRequest,
    timeout: Duration,
) -> Result<KeyResponse, SessionFault>
where
    M: MaterialsManager + ?Sized,
{
    match tokio::time::timeout(timeout, manager.fulfill(request)).await {
        Ok(response) => response.map_err(SessionFault::Collaborator),
        Err(_) => {
            tracing::warn!(
                suite_id = request.suite().id,
                timeout_ms = timeout.as_millis() as u64,
                "materials manager timed out"
            );
            Err(SessionFault::KeyAcquisitionTimedOut { timeout })
        },
    }
}

/// Encrypt `plaintext` in one call.
///
/// # Errors
///
/// Any [`SessionError`] raised by the session or the materials manager.
pub async fn encrypt<M, E>(
    manager: &M,
    env: &E,
    config: &SessionConfig,
    request: EncryptRequest,
    plaintext: &[u8],
) -> Result<EncryptOutput, SessionError>
where
    M: MaterialsManager + ?Sized,
    E: Environment,
{
    let mut session = Encryptor::new(request, config, env)?;
    let timeout = config.key_timeout;
    let mut ciphertext = Vec::new();

    let actions = session.start()?;
    extend(&mut ciphertext, execute(&mut session, manager, timeout, actions).await?);

    let actions = session.update(plaintext)?;
    extend(&mut ciphertext, execute(&mut session, manager, timeout, actions).await?);

    let actions = session.finish()?;
    extend(&mut ciphertext, execute(&mut session, manager, timeout, actions).await?);

    let header = completed_header(&mut session, "encrypt")?;
    Ok(EncryptOutput { ciphertext, header })
}

/// Decrypt a complete message in one call.
///
/// Plaintext is returned only if the whole message verified.
///
/// # Errors
///
/// Any [`SessionError`] raised by the session or the materials manager.
pub async fn decrypt<M>(
    manager: &M,
    config: &SessionConfig,
    ciphertext: &[u8],
) -> Result<DecryptOutput, SessionError>
where
    M: MaterialsManager + ?Sized,
{
    let mut session = Decryptor::new(config)?;
    let mut plaintext = Zeroizing::new(Vec::new());

    let actions = session.update(ciphertext)?;
    extend(&mut plaintext, execute(&mut session, manager, config.key_timeout, actions).await?);
    session.finish()?;

    let header = completed_header(&mut session, "decrypt")?;
    Ok(DecryptOutput {
        plaintext: std::mem::take(&mut *plaintext),
        encryption_context: session.encryption_context().unwrap_or_default(),
        header,
    })
}

/// Encrypt everything `reader` yields into `writer`.
///
/// Reads in chunks of `config.read_chunk_size`, so memory use is bounded by
/// the chunk and frame sizes (non-framed messages buffer the whole body).
///
/// # Errors
///
/// - `Io` if reading or writing fails
/// - Any [`SessionError`] raised by the session or the materials manager
pub async fn encrypt_stream<M, E, R, W>(
    manager: &M,
    env: &E,
    config: &SessionConfig,
    request: EncryptRequest,
    reader: &mut R,
    writer: &mut W,
) -> Result<StreamSummary, SessionError>
where
    M: MaterialsManager + ?Sized,
    E: Environment,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut session = Encryptor::new(request, config, env)?;
    let timeout = config.key_timeout;

    let actions = session.start()?;
    let outputs = execute(&mut session, manager, timeout, actions).await?;
    write_outputs(&mut session, writer, outputs).await?;

    let mut chunk = Zeroizing::new(vec![0u8; config.read_chunk_size]);
    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => return Err(session.fail(err.into())),
        };

        let actions = session.update(&chunk[..read])?;
        let outputs = execute(&mut session, manager, timeout, actions).await?;
        write_outputs(&mut session, writer, outputs).await?;
    }

    let actions = session.finish()?;
    let outputs = execute(&mut session, manager, timeout, actions).await?;
    write_outputs(&mut session, writer, outputs).await?;
    flush(&mut session, writer).await?;

    Ok(StreamSummary {
        header: completed_header(&mut session, "encrypt_stream")?,
        encryption_context: session.encryption_context(),
        plaintext_len: session.plaintext_len(),
    })
}

/// Decrypt the message `reader` yields into `writer`.
///
/// # Security
///
/// Each frame's plaintext is written as soon as the frame authenticates. For
/// signed suites the signature covering the whole message is checked only at
/// the end, so a caller that must not act on unsigned data has to discard
/// what was written if this returns an error.
///
/// # Errors
///
/// - `Io` if reading or writing fails
/// - `Truncated` if the stream ends before the message does
/// - Any [`SessionError`] raised by the session or the materials manager
pub async fn decrypt_stream<M, R, W>(
    manager: &M,
    config: &SessionConfig,
    reader: &mut R,
    writer: &mut W,
) -> Result<StreamSummary, SessionError>
where
    M: MaterialsManager + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut session = Decryptor::new(config)?;
    let mut chunk = vec![0u8; config.read_chunk_size];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => return Err(session.fail(err.into())),
        };

        let actions = session.update(&chunk[..read])?;
        let outputs = execute(&mut session, manager, config.key_timeout, actions).await?;
        write_outputs(&mut session, writer, outputs).await?;
    }

    session.finish()?;
    flush(&mut session, writer).await?;

    Ok(StreamSummary {
        header: completed_header(&mut session, "decrypt_stream")?,
        encryption_context: session.encryption_context().unwrap_or_default(),
        plaintext_len: session.plaintext_len(),
    })
}

/// What the drivers need from either session kind.
trait DrivenSession {
    fn accept(&mut self, response: KeyResponse) -> Result<Vec<SessionAction>, SessionError>;
    fn fail(&mut self, fault: SessionFault) -> SessionError;
    fn state(&self) -> SessionState;
    fn header(&self) -> Option<&MessageHeader>;
}

impl DrivenSession for Encryptor {
    fn accept(&mut self, response: KeyResponse) -> Result<Vec<SessionAction>, SessionError> {
        match response {
            KeyResponse::Materials(materials) => self.provide_materials(materials),
            KeyResponse::DataKey(_) => Err(self.fail(SessionFault::UnexpectedKeyResponse)),
        }
    }

    fn fail(&mut self, fault: SessionFault) -> SessionError {
        Encryptor::fail(self, fault)
    }

    fn state(&self) -> SessionState {
        Encryptor::state(self)
    }

    fn header(&self) -> Option<&MessageHeader> {
        Encryptor::header(self)
    }
}

impl DrivenSession for Decryptor {
    fn accept(&mut self, response: KeyResponse) -> Result<Vec<SessionAction>, SessionError> {
        match response {
            KeyResponse::DataKey(data_key) => self.provide_data_key(data_key),
            KeyResponse::Materials(_) => Err(self.fail(SessionFault::UnexpectedKeyResponse)),
        }
    }

    fn fail(&mut self, fault: SessionFault) -> SessionError {
        Decryptor::fail(self, fault)
    }

    fn state(&self) -> SessionState {
        Decryptor::state(self)
    }

    fn header(&self) -> Option<&MessageHeader> {
        Decryptor::header(self)
    }
}

/// Run actions until none are left, returning the outputs in order.
async fn execute<S, M>(
    session: &mut S,
    manager: &M,
    timeout: Duration,
    actions: Vec<SessionAction>,
) -> Result<Vec<Bytes>, SessionError>
where
    S: DrivenSession,
    M: MaterialsManager + ?Sized,
{
    let mut pending = VecDeque::from(actions);
    let mut outputs = Vec::new();

    while let Some(action) = pending.pop_front() {
        match action {
            SessionAction::RequestDataKey(request) => {
                let response = match acquire(manager, &request, timeout).await {
                    Ok(response) => response,
                    Err(fault) => return Err(session.fail(fault)),
                };
                pending.extend(session.accept(response)?);
            },
            SessionAction::Output(bytes) => outputs.push(bytes),
            SessionAction::Complete => {},
        }
    }

    Ok(outputs)
}

fn extend(dst: &mut Vec<u8>, outputs: Vec<Bytes>) {
    for bytes in outputs {
        dst.extend_from_slice(&bytes);
    }
}

async fn write_outputs<S, W>(
    session: &mut S,
    writer: &mut W,
    outputs: Vec<Bytes>,
) -> Result<(), SessionError>
where
    S: DrivenSession,
    W: AsyncWrite + Unpin + ?Sized,
{
    for bytes in outputs {
        if let Err(err) = writer.write_all(&bytes).await {
            return Err(session.fail(err.into()));
        }
    }
    Ok(())
}

async fn flush<S, W>(session: &mut S, writer: &mut W) -> Result<(), SessionError>
where
    S: DrivenSession,
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.flush().await.map_err(|err| session.fail(err.into()))
}

/// Header of a session the driver has run to completion.
fn completed_header<S: DrivenSession>(
    session: &mut S,
    operation: &'static str,
) -> Result<MessageHeader, SessionError> {
    let state = session.state();
    if state == SessionState::Complete
        && let Some(header) = session.header()
    {
        return Ok(header.clone());
    }
    Err(session.fail(SessionFault::InvalidState { state, operation }))
}
