//! The mailbox directory shared with the worker.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::messages::Message;
use super::wait::{wait_until, WaitError, WaitPolicy};
use crate::error::ChannelError;
use crate::file_ops::{move_file, partial_path, remove_if_exists, write_atomic};

/// A directory used as a set of named one-bit semaphores with optional
/// payloads. Cloning is cheap; clones address the same directory.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    dir: PathBuf,
}

impl ControlChannel {
    /// Use `dir` as the channel, creating it when missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ChannelError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ChannelError::Write {
            name: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, message: Message) -> PathBuf {
        self.dir.join(message.file_name())
    }

    pub fn contains(&self, message: Message) -> bool {
        self.path(message).exists()
    }

    /// First message of `messages` (in slice order) that is present.
    pub fn first_present(&self, messages: &[Message]) -> Option<Message> {
        messages.iter().copied().find(|m| self.contains(*m))
    }

    /// Post a message. `None` creates an empty flag file.
    ///
    /// The content is written under a partial name and renamed, so the
    /// worker only ever observes complete payloads.
    pub fn post(&self, message: Message, payload: Option<&[u8]>) -> Result<(), ChannelError> {
        write_atomic(&self.path(message), payload.unwrap_or_default()).map_err(|source| {
            ChannelError::Write {
                name: message.file_name().to_string(),
                source,
            }
        })?;
        log::debug!("Posted {message}");
        Ok(())
    }

    pub fn post_text(&self, message: Message, text: &str) -> Result<(), ChannelError> {
        self.post(message, Some(text.as_bytes()))
    }

    /// Payload of a message, or `None` when it is not present.
    pub fn read(&self, message: Message) -> Result<Option<Vec<u8>>, ChannelError> {
        match std::fs::read(self.path(message)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ChannelError::Read {
                name: message.file_name().to_string(),
                source,
            }),
        }
    }

    /// Move an existing file into the channel under `message`'s name.
    pub fn adopt(&self, message: Message, source: &Path) -> Result<(), ChannelError> {
        let target = self.path(message);
        move_file(source, &target).map_err(|e| ChannelError::Move {
            from: source.to_path_buf(),
            to: target,
            source: e,
        })?;
        log::debug!("Moved {} into channel as {message}", source.display());
        Ok(())
    }

    /// Move `message`'s file out of the channel to `destination`.
    pub fn take_into(&self, message: Message, destination: &Path) -> Result<(), ChannelError> {
        let source = self.path(message);
        move_file(&source, destination).map_err(|e| ChannelError::Move {
            from: source,
            to: destination.to_path_buf(),
            source: e,
        })
    }

    /// Block until the peer has removed `message`.
    pub fn await_consumed(
        &self,
        message: Message,
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<(), WaitError> {
        let what = format!("{message} to be consumed");
        wait_until(&what, policy, cancel, || (!self.contains(message)).then_some(()))
    }

    /// Block until one of `messages` appears and return it. Earlier entries
    /// win when several are present.
    pub fn await_any(
        &self,
        messages: &[Message],
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> Result<Message, WaitError> {
        let what = describe_any(messages);
        wait_until(&what, policy, cancel, || self.first_present(messages))
    }

    /// Delete every listed message, plus any partial write of it.
    ///
    /// Every name is attempted; the first failure is returned afterwards.
    pub fn clear(&self, messages: &[Message]) -> Result<(), ChannelError> {
        let mut first_error = None;

        for &message in messages {
            let path = self.path(message);
            for candidate in [partial_path(&path), path] {
                if let Err(source) = remove_if_exists(&candidate) {
                    log::warn!("Failed to remove {}: {source}", candidate.display());
                    if first_error.is_none() {
                        first_error = Some(ChannelError::Remove {
                            name: message.file_name().to_string(),
                            source,
                        });
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Clear every known message name.
    pub fn purge(&self) -> Result<(), ChannelError> {
        self.clear(&Message::ALL)
    }
}

pub(crate) fn describe_any(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.file_name())
        .collect::<Vec<_>>()
        .join(" or ")
}
