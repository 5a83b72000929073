//! High-level operations behind each command-line mode.
//!
//! Each operation takes the resolved [`Config`](crate::config::Config) and
//! orchestrates the lower layers: the decryption channel, the result set,
//! the viewer, the session guard and the re-encryption writer.

pub mod edit;
pub mod generate;
pub mod query;

pub use edit::edit_store;
pub use generate::{generate_password, generate_passwords, GeneratorOptions};
pub use query::{load_passwords, print_matches, view_matches};
