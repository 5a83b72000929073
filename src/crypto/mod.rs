//! Everything that touches the encrypted store.
//!
//! mdp never implements cryptography itself. The external tool (gpg or a
//! compatible program) decrypts the store to a pipe and encrypts edited
//! plaintext to a file next to it; this module supervises those invocations
//! and handles the files around them.
//!
//! # Module Structure
//!
//! - `tool`: the tool's path, recipient, timeout and argument conventions
//! - `decrypt`: the decryption channel feeding a [`ResultSet`](crate::results::ResultSet)
//! - `encrypt`: the re-encryption writer with backup rotation
//! - `temp`: private plaintext files and secure deletion

pub mod decrypt;
pub mod encrypt;
pub mod temp;
pub mod tool;

pub use self::decrypt::{load_store, DecryptChannel};
pub use self::encrypt::{CommitOutcome, StoreWriter};
pub use self::temp::{create_plaintext_file, secure_delete};
pub use self::tool::CryptoTool;
