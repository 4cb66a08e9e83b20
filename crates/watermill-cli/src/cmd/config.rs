use anyhow::Result;
use clap::Subcommand;
use watermill_core::config::Config;

use crate::output::{print_json, print_yaml};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration with secrets masked
    Show,

    /// Check that every setting the worker needs is present
    Validate,
}

pub fn run(config: Config, subcommand: ConfigSubcommand, json: bool) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            let shown = config.redacted();
            if json {
                print_json(&shown)
            } else {
                print_yaml(&shown)
            }
        }
        ConfigSubcommand::Validate => {
            config.validate()?;
            println!("config ok");
            Ok(())
        }
    }
}
