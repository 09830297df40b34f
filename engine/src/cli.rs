//! CLI interface for Warden
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Warden plugin host
///
/// Loads approved plugins after verifying their manifest, policy approval,
/// source checksum and source code.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load plugins and keep them running until Ctrl-C
    Load {
        /// Plugins to load (default: the enabled list from config)
        names: Vec<String>,

        /// Unload and exit right after loading
        #[arg(long)]
        once: bool,
    },

    /// Print the checksum of a plugin's source tree
    Checksum {
        /// Plugin name (directory under plugins_dir)
        name: String,
    },

    /// Run the static code validator over a source file
    Validate {
        /// Rust source file to check
        file: PathBuf,
    },

    /// Show the compiled-in policy table
    Policy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["warden", "policy"]);
        assert!(matches!(cli.command, Command::Policy));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["warden", "checksum", "gdpr_plugin", "--json", "--log", "debug"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
    }

    #[test]
    fn test_load_command() {
        let cli = Cli::parse_from(["warden", "load", "gdpr_plugin", "security_plugin", "--once"]);
        if let Command::Load { names, once } = cli.command {
            assert_eq!(names, vec!["gdpr_plugin", "security_plugin"]);
            assert!(once);
        } else {
            panic!("Expected Load command");
        }
    }

    #[test]
    fn test_load_defaults_to_config() {
        let cli = Cli::parse_from(["warden", "load"]);
        if let Command::Load { names, once } = cli.command {
            assert!(names.is_empty());
            assert!(!once);
        } else {
            panic!("Expected Load command");
        }
    }

    #[test]
    fn test_validate_requires_file() {
        assert!(Cli::try_parse_from(["warden", "validate"]).is_err());
    }
}
