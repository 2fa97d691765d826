//! Command-line argument parsing and validation: one or more image
//! references, an architecture selector, optional credentials, and a
//! repeated `-v` verbosity flag.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::error::{PusherError, Result};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "docker-image-puller",
    version,
    about = "Pulls a container image from an OCI/Docker-v2 registry into a docker-load-compatible tar archive"
)]
pub struct Cli {
    /// Image references to pull, e.g. `alpine:3.19` or `ghcr.io/acme/app@sha256:...`.
    #[arg(required = true)]
    pub images: Vec<String>,

    /// Target platform architecture.
    #[arg(long, default_value = "amd64")]
    pub arch: String,

    /// Registry username.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Registry password.
    #[arg(short, long)]
    pub password: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long, action = ArgAction::SetTrue)]
    pub skip_tls: bool,

    /// Directory to write `<image>.tar` (and transient `<image>.tmp/` staging) into.
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Increase log verbosity: `-v` for info, `-vv` for debug.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    pub fn try_parse_args() -> Result<Self> {
        <Self as Parser>::try_parse()
            .map_err(|e| PusherError::InvalidReference(format!("failed to parse arguments: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.images.is_empty() {
            return Err(PusherError::InvalidReference(
                "at least one image reference is required".to_string(),
            ));
        }
        if (self.username.is_some() && self.password.is_none())
            || (self.username.is_none() && self.password.is_some())
        {
            return Err(PusherError::InvalidReference(
                "username and password must be provided together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        }
    }
}
