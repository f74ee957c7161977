//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Stream a firmware image into a simulated OTA slot",
    long_about = None
)]
pub struct Cli {
    /// Firmware image to transfer
    pub image: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Slot file, overriding the configuration
    #[arg(long)]
    pub slot: Option<PathBuf>,

    /// Bytes per data write, overriding the configuration
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Applies command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(slot) = &self.slot {
            config.slot_path = slot.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_and_overrides() {
        let cli = Cli::parse_from([
            "otaflash-sim",
            "fw.gbl",
            "--slot",
            "/tmp/s.bin",
            "--chunk-size",
            "64",
            "-v",
        ]);
        assert_eq!(cli.image, PathBuf::from("fw.gbl"));
        assert!(cli.verbose);

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.slot_path, PathBuf::from("/tmp/s.bin"));
        assert_eq!(config.chunk_size, 64);
    }

    #[test]
    fn no_overrides_keeps_config() {
        let cli = Cli::parse_from(["otaflash-sim", "fw.gbl"]);
        let mut config = Config::default();
        let before = config.chunk_size;
        cli.apply(&mut config);
        assert_eq!(config.chunk_size, before);
        assert!(cli.config.is_none());
    }
}
