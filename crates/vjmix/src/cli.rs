use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::Antialiasing;

#[derive(Parser, Debug)]
#[command(
    name = "vjmix",
    author,
    version,
    about = "Live GLSL shader editor with real-time previews"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Preview a fragment shader, reloading it whenever the file changes.
    Edit(EditArgs),
    /// List saved shaders, most recently updated first.
    List,
    /// Print a saved shader's metadata and code.
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Delete a saved shader.
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Save a new shader and print its id.
    New(NewArgs),
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// GLSL file to watch; created with the starting text when missing.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Saved shader to open; Ctrl+S updates it instead of creating a new one.
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Inline preview size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE")]
    pub antialias: Option<Antialiasing>,

    /// Configuration file; defaults to `vjmix.toml` in the config directory.
    #[arg(long, value_name = "PATH", env = "VJMIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Open the pop-out preview window on start.
    #[arg(long)]
    pub open_window: bool,
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Title shown in listings (1-100 characters).
    #[arg(long)]
    pub title: String,

    /// Optional description (up to 500 characters).
    #[arg(long, default_value = "")]
    pub description: String,

    /// Read the code from this file instead of using the default shader.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Mark the shader as public.
    #[arg(long)]
    pub public: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{value}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{value}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{value}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{value}' must be non-zero in both dimensions"));
    }
    Ok((width, height))
}
