pub mod config;
pub mod error;
pub mod types;

pub use error::{CryptoError, FormatError, PackdError, PackdResult};
pub use types::{EntryInfo, FileEntry};
