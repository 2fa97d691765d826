//! Application runner that orchestrates the image pull process: parse
//! args, configure logging, pull every positional image reference in
//! turn. A failed image is logged and does not stop the remaining
//! arguments, but the process exits non-zero if any pull failed.

use crate::assembler::{self, PullOptions};
use crate::cli::Cli;
use crate::error::{PusherError, Result};
use crate::logging::Logger;

pub struct Runner {
    cli: Cli,
    logger: Logger,
}

impl Runner {
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate()?;
        let logger = Logger::new(cli.verbose);
        Ok(Self { cli, logger })
    }

    pub async fn run(self) -> Result<()> {
        self.logger.section("docker-image-puller");
        self.logger.detail(&format!("architecture: {}", self.cli.arch));
        self.logger
            .detail(&format!("output directory: {}", self.cli.output_dir.display()));

        let options = PullOptions {
            arch: self.cli.arch.clone(),
            output_dir: self.cli.output_dir.clone(),
            credentials: self.cli.credentials(),
            skip_tls: self.cli.skip_tls,
        };

        let mut first_error: Option<PusherError> = None;

        for image in &self.cli.images {
            self.logger.step(&format!("pulling {image}"));
            match assembler::pull_image(image, &options, &self.logger).await {
                Ok(path) => {
                    self.logger.success(&format!("wrote {}", path.display()));
                }
                Err(e) => {
                    self.logger.error(&format!("{image}: {e}"));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
