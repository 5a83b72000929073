use crate::config::Overrides;
use crate::constants::{APP_DESCRIPTION, APP_NAME};
use crate::errors::{AppError, AppResult};
use crate::results::keywords::KeywordSet;
use crate::results::FilterMode;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for mdp
#[derive(Parser, Debug)]
#[clap(name = APP_NAME, about = APP_DESCRIPTION)]
#[clap(version, long_about = None)]
pub struct CliArgs {
    /// Edit the password list in an external editor
    #[clap(short = 'e', long, conflicts_with_all = &["generate", "query", "raw", "regex"])]
    pub edit: bool,

    /// Generate random passwords
    #[clap(short = 'g', long, conflicts_with_all = &["query", "raw", "regex", "config", "key_id"])]
    pub generate: bool,

    /// Start at the keyword prompt
    #[clap(short = 'q', long, conflicts_with = "raw")]
    pub query: bool,

    /// Print matching lines to stdout instead of opening the viewer
    #[clap(short = 'r', long)]
    pub raw: bool,

    /// Treat keywords as case-insensitive regular expressions
    #[clap(short = 'E', long)]
    pub regex: bool,

    /// Enable debug logging
    #[clap(short = 'd', long)]
    pub debug: bool,

    /// Alternative config file
    #[clap(short = 'c', long, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Key id used when re-encrypting
    #[clap(short = 'k', long, value_name = "KEY_ID")]
    pub key_id: Option<String>,

    /// Length of generated passwords
    #[clap(short = 'l', long, value_name = "LENGTH", requires = "generate")]
    pub length: Option<u32>,

    /// Number of generated passwords
    #[clap(short = 'n', long, value_name = "COUNT", requires = "generate")]
    pub count: Option<u32>,

    /// Keywords every listed line must contain
    #[clap(value_name = "KEYWORD")]
    pub keywords: Vec<String>,
}

/// What an invocation asks for, after usage rules are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Viewer on the lines matching the keywords.
    Pager(KeywordSet),
    /// Matching lines printed to stdout.
    Raw(KeywordSet),
    /// Viewer opened at the keyword prompt.
    Query(KeywordSet),
    /// Edit session.
    Edit,
    /// Password generator.
    Generate {
        length: Option<u32>,
        count: Option<u32>,
    },
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse() -> Self {
        CliArgs::parse_from(std::env::args())
    }

    /// Resolves the flags and keywords into a [`Command`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Usage` when keywords are given to `-e` or `-g`, or
    /// when neither `-q` nor any keyword is given.
    pub fn command(&self) -> AppResult<Command> {
        let keywords = KeywordSet::from_args(&self.keywords);

        if self.edit || self.generate {
            if !keywords.is_empty() {
                return Err(usage(if self.edit { "-e" } else { "-g" }));
            }
            return Ok(if self.edit {
                Command::Edit
            } else {
                Command::Generate {
                    length: self.length,
                    count: self.count,
                }
            });
        }

        if self.query {
            return Ok(Command::Query(keywords));
        }
        if keywords.is_empty() {
            return Err(AppError::Usage(format!(
                "usage: {0} [-d] [-c config] [-k key_id] -e\n       \
                 {0} [-d] -g [-l length] [-n count]\n       \
                 {0} [-d] [-Erq] [-c config] [-k key_id] keyword ...",
                APP_NAME
            )));
        }
        Ok(if self.raw {
            Command::Raw(keywords)
        } else {
            Command::Pager(keywords)
        })
    }

    /// Plain substring or regular expression matching.
    pub fn filter_mode(&self) -> FilterMode {
        if self.regex {
            FilterMode::Regex
        } else {
            FilterMode::Plain
        }
    }

    /// Values that take precedence over the config file.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config_path: self.config.clone(),
            key_id: self.key_id.clone(),
        }
    }
}

fn usage(flag: &str) -> AppError {
    AppError::Usage(format!("{} does not take keywords", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("mdp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_is_pager() {
        let args = parse(&["site1", "alice"]);
        assert_eq!(
            args.command().unwrap(),
            Command::Pager(KeywordSet::from_args(["site1", "alice"]))
        );
        assert_eq!(args.filter_mode(), FilterMode::Plain);
        assert!(!args.debug);
    }

    #[test]
    fn test_pager_and_raw_require_keywords() {
        assert!(matches!(parse(&[]).command(), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["-r"]).command(), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["-r", ""]).command(), Err(AppError::Usage(_))));
    }

    #[test]
    fn test_raw_and_regex() {
        let args = parse(&["-rE", "^site[0-9]"]);
        assert_eq!(
            args.command().unwrap(),
            Command::Raw(KeywordSet::from_args(["^site[0-9]"]))
        );
        assert_eq!(args.filter_mode(), FilterMode::Regex);
    }

    #[test]
    fn test_query_accepts_no_keywords() {
        assert_eq!(
            parse(&["-q"]).command().unwrap(),
            Command::Query(KeywordSet::default())
        );
        assert_eq!(
            parse(&["-q", "bank"]).command().unwrap(),
            Command::Query(KeywordSet::from_args(["bank"]))
        );
    }

    #[test]
    fn test_edit_and_generate_reject_keywords() {
        assert_eq!(parse(&["-e"]).command().unwrap(), Command::Edit);
        assert!(matches!(parse(&["-e", "x"]).command(), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["-g", "x"]).command(), Err(AppError::Usage(_))));
    }

    #[test]
    fn test_generate_options() {
        let args = parse(&["-g", "-l", "32", "-n", "2"]);
        assert_eq!(
            args.command().unwrap(),
            Command::Generate {
                length: Some(32),
                count: Some(2)
            }
        );
        assert!(CliArgs::try_parse_from(["mdp", "-l", "8", "x"]).is_err());
    }

    #[test]
    fn test_conflicting_modes_rejected_by_parser() {
        assert!(CliArgs::try_parse_from(["mdp", "-e", "-g"]).is_err());
        assert!(CliArgs::try_parse_from(["mdp", "-q", "-r", "x"]).is_err());
        assert!(CliArgs::try_parse_from(["mdp", "-g", "-k", "KEY"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&["-c", "/tmp/alt.conf", "-k", "0xABC", "-e"]);
        let overrides = args.overrides();
        assert_eq!(overrides.config_path, Some(PathBuf::from("/tmp/alt.conf")));
        assert_eq!(overrides.key_id.as_deref(), Some("0xABC"));
    }
}
