//! The decryption channel: the store decrypted by the external tool and
//! streamed back line by line.

use crate::crypto::tool::CryptoTool;
use crate::errors::AppResult;
use crate::process::{self, ManagedChild};
use crate::results::ResultSet;
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use std::process::ChildStdout;
use tracing::{debug, info};

/// A running decryption of the store.
///
/// Every channel returned by [`DecryptChannel::open`] must be passed to
/// [`DecryptChannel::close`]. A channel dropped without closing (an early
/// return on error) kills and reaps the child.
#[derive(Debug)]
pub struct DecryptChannel {
    reader: BufReader<ChildStdout>,
    child: ManagedChild,
}

impl DecryptChannel {
    /// Starts decrypting `store` under a watchdog.
    ///
    /// Returns `Ok(None)` when the store does not exist yet; an empty store is
    /// a valid initial state.
    pub fn open(tool: &CryptoTool, store: &Path) -> AppResult<Option<Self>> {
        match fs::metadata(store) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(store = %store.display(), "store absent");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let args = tool.decrypt_args(store);
        let (stdout, mut child) = process::run(tool.program(), &args)?;
        child.supervise(tool.timeout())?;

        Ok(Some(Self {
            reader: BufReader::new(stdout),
            child,
        }))
    }

    /// The decrypted byte stream.
    pub fn reader(&mut self) -> &mut BufReader<ChildStdout> {
        &mut self.reader
    }

    /// Closes the stream, reaps the child and reports failures.
    ///
    /// A non-zero exit and a termination by signal (including a watchdog
    /// timeout) are both errors, reported distinctly.
    pub fn close(self) -> AppResult<()> {
        let Self { reader, child } = self;
        drop(reader);
        let command = child.command().to_string();
        let classification = child.finish()?;
        classification.into_result(&command)?;
        Ok(())
    }
}

/// Decrypts `store` into a [`ResultSet`].
///
/// An absent store yields an empty set. The channel is closed on success; on
/// a load failure it is dropped, which terminates the child.
pub fn load_store(tool: &CryptoTool, store: &Path) -> AppResult<ResultSet> {
    let Some(mut channel) = DecryptChannel::open(tool, store)? else {
        return Ok(ResultSet::default());
    };
    let results = ResultSet::load(channel.reader())?;
    channel.close()?;

    info!(count = results.len(), "store decrypted");
    Ok(results)
}
