use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use crate::apod::parse_date;

pub const DEFAULT_KEY_FILE: &str = "api.txt";
pub const DEFAULT_PRELOAD_DAYS: usize = 6;

pub const USAGE: &str = "\
Usage: spaceotd [OPTIONS]

Options:
  --key-file <PATH>   File holding the api.nasa.gov key (default: api.txt)
  --preload <DAYS>    Older days to fetch at startup (default: 6)
  --hd                Request HD images
  --date <YYYY-MM-DD> Start from this date instead of today
  -h, --help          Print this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub key_file: PathBuf,
    pub preload: usize,
    pub hd: bool,
    pub start_date: Option<NaiveDate>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            preload: DEFAULT_PRELOAD_DAYS,
            hd: false,
            start_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchRequest {
    Run(LaunchOptions),
    Help,
}

pub fn parse_launch_request_from_args(args: &[String]) -> Result<LaunchRequest, String> {
    let mut options = LaunchOptions::default();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        let (flag, inline_value) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };

        let mut value_for = |name: &str| {
            inline_value
                .clone()
                .or_else(|| args.next().cloned())
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| format!("Missing value after {name}."))
        };

        match flag {
            "-h" | "--help" => return Ok(LaunchRequest::Help),
            "--hd" => options.hd = true,
            "--key-file" => options.key_file = PathBuf::from(value_for(flag)?),
            "--preload" => {
                let value = value_for(flag)?;
                options.preload = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| "--preload must be a non-negative integer.".to_string())?;
            }
            "--date" => {
                let value = value_for(flag)?;
                let date = parse_date(&value)
                    .ok_or_else(|| format!("--date must look like YYYY-MM-DD, got {value}."))?;
                options.start_date = Some(date);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    Ok(LaunchRequest::Run(options))
}

/// Reads the API key. The whole file is the key, minus surrounding whitespace.
pub fn read_api_key(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read API key file {}", path.display()))?;
    let key = text.trim();
    if key.is_empty() {
        bail!("API key file {} is empty", path.display());
    }
    Ok(key.to_string())
}
