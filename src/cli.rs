// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use logi_vhid::MouseButton;

#[derive(Parser)]
#[command(name = "vhid")]
#[command(author, version, about = "Virtual keyboard and mouse via the LGHUB virtual bus")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: <config dir>/logi-vhid/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Send to an in-memory bus instead of the driver and print the traffic
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move the pointer by a relative offset (each axis -127..=127)
    #[command(visible_alias = "m")]
    Move {
        #[arg(allow_hyphen_values = true)]
        dx: i32,
        #[arg(allow_hyphen_values = true)]
        dy: i32,
    },

    /// Move the pointer to an approximate screen position
    #[command(name = "move-to")]
    MoveTo { x: u32, y: u32 },

    /// Click a mouse button
    #[command(visible_alias = "c")]
    Click {
        #[arg(value_enum, default_value_t = ButtonArg::Left)]
        button: ButtonArg,
        /// Number of clicks
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },

    /// Scroll the wheel (positive is up)
    #[command(visible_alias = "w")]
    Wheel {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },

    /// Tap a key, optionally with modifiers held (e.g. `tap t --mods ctrl,shift`)
    #[command(visible_alias = "t")]
    Tap {
        /// Key name (`enter`, `f5`, `a`) or usage code (`0x28`)
        key: String,
        /// Comma-separated modifiers to hold
        #[arg(long, value_delimiter = ',')]
        mods: Vec<String>,
    },

    /// Type text (US layout)
    #[command(name = "type")]
    Type { text: String },

    /// Release every key and button
    Reset,

    /// Short move/click/type sequence to verify the devices work
    Demo,

    /// Check whether the bus and input endpoints can be opened
    Probe,

    /// Destroy virtual keyboards and mice left on the bus by earlier runs
    Destroy {
        /// Also destroy bus children that are neither keyboard nor mouse
        #[arg(long)]
        all: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Also write it to the config path
        #[arg(long)]
        write: bool,
    },
}

/// Mouse button argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ButtonArg {
    Left,
    Right,
    Middle,
}

impl From<ButtonArg> for MouseButton {
    fn from(arg: ButtonArg) -> Self {
        match arg {
            ButtonArg::Left => MouseButton::Left,
            ButtonArg::Right => MouseButton::Right,
            ButtonArg::Middle => MouseButton::Middle,
        }
    }
}
