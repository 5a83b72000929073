//! Random password generation.

use crate::config::Config;
use crate::constants::{CHARSET_ALPHANUMERIC, MAX_PASSWORD_LENGTH};
use crate::errors::{AppError, AppResult};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng};
use std::io::Write;
use zeroize::Zeroizing;

/// How many passwords to generate and how long each is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    pub length: u32,
    pub count: u32,
}

impl GeneratorOptions {
    /// Config defaults, overridden by `-l` and `-n`.
    pub fn resolve(config: &Config, length: Option<u32>, count: Option<u32>) -> AppResult<Self> {
        let options = Self {
            length: length.unwrap_or(config.character_count),
            count: count.unwrap_or(config.password_count),
        };
        options.validate()?;
        Ok(options)
    }

    /// Length must be in `1..=255` and count at least 1.
    pub fn validate(&self) -> AppResult<()> {
        if self.length == 0 || self.length > MAX_PASSWORD_LENGTH {
            return Err(AppError::Generate(format!(
                "password length must be between 1 and {}",
                MAX_PASSWORD_LENGTH
            )));
        }
        if self.count == 0 {
            return Err(AppError::Generate(
                "password count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One password of `length` characters drawn uniformly from the
/// alphanumeric set.
pub fn generate_password<R: Rng + CryptoRng>(rng: &mut R, length: u32) -> Zeroizing<String> {
    let charset = CHARSET_ALPHANUMERIC.as_bytes();
    let mut password = Zeroizing::new(String::with_capacity(length as usize));
    for _ in 0..length {
        if let Some(&byte) = charset.choose(rng) {
            password.push(char::from(byte));
        }
    }
    password
}

/// Writes `options.count` passwords to `out`, one per line.
pub fn generate_passwords<W: Write>(options: GeneratorOptions, mut out: W) -> AppResult<()> {
    options.validate()?;
    let mut rng = OsRng;
    for _ in 0..options.count {
        let password = generate_password(&mut rng, options.length);
        writeln!(out, "{}", password.as_str())?;
    }
    out.flush()?;
    Ok(())
}
