//! Vigil Storage Layer
//!
//! Keeps the list of live sessions in a single versioned JSON file:
//! - Every save rewrites the whole file
//! - Writes go to a temporary file that is renamed into place, so readers
//!   never observe a half-written state
//! - A file that cannot be parsed is reported as corrupt, never guessed at

mod error;
mod state;
mod store;

pub use error::StorageError;
pub use state::{PersistedState, STATE_VERSION};
pub use store::{StateStore, STATE_FILE_NAME};

pub type Result<T> = std::result::Result<T, StorageError>;
