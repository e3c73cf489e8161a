/* src/cli/core/src/main.rs */

mod config;
mod render;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{WeftConfig, find_weft_config, load_weft_config};
use render::Output;
use ui::{DIM, RESET};

#[derive(Parser)]
#[command(name = "weft", about = "Weft page renderer", version)]
struct Cli {
  /// Path to weft.toml (auto-detected if omitted)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,
  /// Log filter, e.g. `debug` or `weft_engine=trace` (overrides RUST_LOG and weft.toml)
  #[arg(long, global = true)]
  log_level: Option<String>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Render a page to a full HTML document
  Render(PageArgs),
  /// Render a page in static mode and emit its stylesheet
  ExportCss(PageArgs),
}

#[derive(Args)]
struct PageArgs {
  /// Page name, label or localized URL name
  page: String,
  /// Language code (defaults to the site's main language)
  #[arg(short, long)]
  lang: Option<String>,
  /// Output file (stdout if omitted)
  #[arg(short, long)]
  out: Option<PathBuf>,
}

/// Resolve config path (explicit or auto-detected) and parse it. Without a
/// weft.toml the defaults apply relative to the working directory.
fn resolve_config(explicit: Option<PathBuf>) -> Result<(PathBuf, WeftConfig)> {
  let cwd = std::env::current_dir().context("failed to get cwd")?;
  let path = match explicit {
    Some(p) => p,
    None => match find_weft_config(&cwd) {
      Ok(p) => p,
      Err(_) => return Ok((cwd, WeftConfig::default())),
    },
  };
  let config = load_weft_config(&path)?;
  let base_dir = path.parent().map_or_else(|| cwd.clone(), Path::to_path_buf);
  Ok((base_dir, config))
}

/// `--log-level` wins over RUST_LOG, which wins over `[log] level`.
fn init_tracing(cli_level: Option<&str>, config_level: &str) -> Result<()> {
  let filter = match cli_level {
    Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level \"{level}\""))?,
    None => EnvFilter::try_from_default_env()
      .or_else(|_| EnvFilter::try_new(config_level))
      .with_context(|| format!("invalid log level \"{config_level}\""))?,
  };
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
  Ok(())
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  let (base_dir, config) = resolve_config(cli.config)?;
  init_tracing(cli.log_level.as_deref(), &config.log.level)?;

  let (args, output) = match cli.command {
    Command::Render(args) => (args, Output::Html),
    Command::ExportCss(args) => (args, Output::Css),
  };

  let renderer = render::open_site(&config, &base_dir, output)?;
  let text = render::render(&renderer, &args.page, args.lang.as_deref(), output)?;

  match args.out {
    Some(out) => {
      ui::arrow(&format!("{} {DIM}({:?}){RESET}", args.page, output));
      render::write_output(&out, &text)?;
      ui::ok(&format!("{}  {}", out.display(), ui::format_size(text.len() as u64)));
    }
    None => print!("{text}"),
  }

  Ok(())
}
