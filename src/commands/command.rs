//! Command Objects
//!
//! Each variant carries everything parsed from the header line. The data
//! block of a storage command arrives separately and is handed to
//! [`Command::execute`].

use crate::protocol::Response;
use crate::storage::Storage;
use bytes::{Bytes, BytesMut};
use tracing::trace;

/// How a storage command writes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Insert or overwrite
    Set,
    /// Insert only if absent
    Add,
    /// Overwrite only if present
    Replace,
    /// Add data after an existing value
    Append,
    /// Add data before an existing value
    Prepend,
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A storage command followed by a `len`-byte data block
    Store {
        mode: StoreMode,
        key: Bytes,
        len: usize,
    },
    /// Retrieve one or more keys
    Get { keys: Vec<Bytes> },
    /// Remove a key
    Delete { key: Bytes },
}

impl Command {
    /// The command name as written on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Store { mode, .. } => match mode {
                StoreMode::Set => "set",
                StoreMode::Add => "add",
                StoreMode::Replace => "replace",
                StoreMode::Append => "append",
                StoreMode::Prepend => "prepend",
            },
            Command::Get { .. } => "get",
            Command::Delete { .. } => "delete",
        }
    }

    /// Length of the data block this command expects, if any.
    pub fn value_len(&self) -> Option<usize> {
        match self {
            Command::Store { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Runs the command against `storage`.
    ///
    /// `value` is the data block with its terminator already stripped; it is
    /// empty for commands that take none.
    pub fn execute(&self, storage: &dyn Storage, value: Bytes) -> Response {
        trace!(command = self.name(), "Executing command");

        match self {
            Command::Store { mode, key, .. } => {
                let stored = match mode {
                    StoreMode::Set => storage.put(key.clone(), value),
                    StoreMode::Add => storage.put_if_absent(key.clone(), value),
                    StoreMode::Replace => storage.set(key, value),
                    StoreMode::Append => concat(storage, key, &value, false),
                    StoreMode::Prepend => concat(storage, key, &value, true),
                };
                if stored {
                    Response::Stored
                } else {
                    Response::NotStored
                }
            }
            Command::Get { keys } => Response::Values(
                keys.iter()
                    .filter_map(|key| storage.get(key).map(|value| (key.clone(), value)))
                    .collect(),
            ),
            Command::Delete { key } => {
                if storage.delete(key) {
                    Response::Deleted
                } else {
                    Response::NotFound
                }
            }
        }
    }
}

/// Rewrites an existing value from its old contents.
///
/// The read and the write take the shard lock separately. A `set` to the same
/// key landing between them is overwritten with the concatenation of the
/// older value, so that write is lost (last writer wins).
fn concat(storage: &dyn Storage, key: &[u8], value: &[u8], prepend: bool) -> bool {
    let Some(old) = storage.get(key) else {
        return false;
    };

    let (first, second) = if prepend {
        (value, &old[..])
    } else {
        (&old[..], value)
    };
    let mut buf = BytesMut::with_capacity(first.len() + second.len());
    buf.extend_from_slice(first);
    buf.extend_from_slice(second);
    storage.set(key, buf.freeze())
}
