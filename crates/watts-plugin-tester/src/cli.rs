//! CLI argument definitions for the WaTTS plugin tester.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use watts_plugins::{ConfigSource, InlineJson, InputOverrides};

/// Command-line interface for testing WaTTS plugins.
#[derive(Parser, Debug)]
#[command(
    name = "watts-plugin-tester",
    version,
    about = "Checks WaTTS plugins against the plugin protocol",
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) plugin: PluginArgs,
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct PluginArgs {
    /// Path of the plugin executable.
    #[arg(short = 'p', long = "plugin-name", value_name = "PATH", global = true)]
    pub(crate) plugin_name: Option<PathBuf>,
    /// Action the plugin is asked to perform.
    #[arg(short = 'a', long = "plugin-action", value_name = "ACTION", global = true)]
    pub(crate) plugin_action: Option<String>,
    /// JSON file merged over the plugin input.
    #[arg(short = 'j', long = "json-file", value_name = "PATH", global = true)]
    pub(crate) json_file: Option<PathBuf>,
    /// Inline JSON merged over the plugin input after the JSON file.
    #[arg(long = "json", value_name = "JSON", global = true)]
    pub(crate) json: Option<String>,
    /// WaTTS configuration file to read the plugin's conf_params from.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub(crate) config: Option<PathBuf>,
    /// Service identifier selecting the conf_params in the WaTTS configuration.
    #[arg(short = 'i', long = "config-identifier", value_name = "ID", global = true)]
    pub(crate) config_identifier: Option<String>,
    /// Emit reports as JSON.
    #[arg(short = 'm', long = "machine", global = true)]
    pub(crate) machine: bool,
    /// Pass the plugin input through an environment variable.
    #[arg(short = 'e', long = "env", global = true)]
    pub(crate) env: bool,
}

impl PluginArgs {
    /// The user's contributions to the plugin input.
    pub(crate) fn overrides(&self) -> InputOverrides {
        InputOverrides {
            config: self.config.clone().map(|path| ConfigSource {
                path,
                identifier: self.config_identifier.clone(),
            }),
            json_file: self.json_file.clone(),
            inline: self.json.clone().map(InlineJson::Text),
            action: self.plugin_action.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Runs the plugin and validates its output.
    Check,
    /// Runs the plugin and compares its output with expected values.
    Test(ExpectedOutputArgs),
    /// Prints the default plugin input.
    Default,
    /// Prints the plugin input after applying the overrides.
    Specific,
    /// Builds an input whose conf_params are the plugin's declared defaults.
    Generate,
    /// Runs every case in a batch test configuration.
    Suite {
        /// Path of the JSON test configuration.
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
#[group(required = false, multiple = false)]
pub(crate) struct ExpectedOutputArgs {
    /// File holding the expected output fragment.
    #[arg(long, value_name = "PATH")]
    pub(crate) expected_output_file: Option<PathBuf>,
    /// Expected output fragment as inline JSON.
    #[arg(long, value_name = "JSON")]
    pub(crate) expected_output_string: Option<String>,
}
