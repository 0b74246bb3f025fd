//! linecord setup wizard.
//!
//! Prompts for the Discord and LINE credentials in the terminal and writes
//! `config.toml` to the project root. When a config already exists its
//! non-secret values are offered as defaults.
//!
//! With `--print`: writes the generated config to stdout instead of disk.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

// ── Raw TOML parse structs (loose: every field optional so partial configs load) ──

#[derive(Deserialize, Default)]
struct RawConfig {
    discord: Option<RawDiscord>,
    line: Option<RawLine>,
    server: Option<RawServer>,
}

#[derive(Deserialize, Default)]
struct RawDiscord {
    channel_id: Option<u64>,
    command_prefix: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawLine {
    target_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawServer {
    port: Option<u16>,
}

/// Defaults offered at each prompt
struct Existing {
    channel_id: String,
    command_prefix: String,
    target_id: String,
    port: String,
}

fn load_existing(path: &Path) -> Existing {
    let raw: RawConfig = std::fs::read_to_string(path)
        .ok()
        .and_then(|s| toml::from_str(&s).ok())
        .unwrap_or_default();

    let discord = raw.discord.unwrap_or_default();
    let line = raw.line.unwrap_or_default();
    let server = raw.server.unwrap_or_default();

    Existing {
        channel_id: discord.channel_id.map(|id| id.to_string()).unwrap_or_default(),
        command_prefix: discord.command_prefix.unwrap_or_else(|| "!".to_owned()),
        target_id: line.target_id.unwrap_or_default(),
        port: server.port.unwrap_or(5000).to_string(),
    }
}

// ── Config formatting ──────────────────────────────────────────────────────────

struct ConfigParams<'a> {
    discord_token: &'a str,
    channel_id: &'a str,
    command_prefix: &'a str,
    line_secret: &'a str,
    line_token: &'a str,
    target_id: &'a str,
    port: &'a str,
}

/// Quote `value` as a TOML string, escaping as needed
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_owned()).to_string()
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let target_line = if p.target_id.is_empty() {
        "# target_id = \"Uxxxxxxxx\"  # uncomment to push to one recipient only".to_owned()
    } else {
        format!("target_id = {}", toml_string(p.target_id))
    };

    let discord_token = toml_string(p.discord_token);
    let channel_id = p.channel_id;
    let command_prefix = toml_string(p.command_prefix);
    let line_secret = toml_string(p.line_secret);
    let line_token = toml_string(p.line_token);
    let port = p.port;

    format!(
        r#"[discord]
bot_token = {discord_token}
channel_id = {channel_id}
command_prefix = {command_prefix}

[line]
channel_secret = {line_secret}
channel_access_token = {line_token}
{target_line}

[server]
host = "0.0.0.0"
port = {port}
"#
    )
}

// ── Terminal prompts ───────────────────────────────────────────────────────────

fn run(project_root: &Path, print_only: bool) -> Result<()> {
    println!("=== linecord setup ===\n");

    let config_path = project_root.join("config.toml");
    let existing = load_existing(&config_path);

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let discord_token = read_line("Discord bot token: ")?;
    let channel_id = loop {
        let value = or_default(
            read_line(&format!("Discord channel ID [{}]: ", existing.channel_id))?,
            &existing.channel_id,
        );
        if value.parse::<u64>().is_ok() {
            break value;
        }
        println!("  Channel ID must be a number (enable Developer Mode, then Copy ID).");
    };
    let command_prefix = or_default(
        read_line(&format!("Command prefix [{}]: ", existing.command_prefix))?,
        &existing.command_prefix,
    );
    let line_secret = read_line("LINE channel secret: ")?;
    let line_token = read_line("LINE channel access token: ")?;
    let target_id = or_default(
        read_line(&format!(
            "LINE target ID (optional, blank = everyone who messages the bot) [{}]: ",
            existing.target_id
        ))?,
        &existing.target_id,
    );
    let port = loop {
        let value = or_default(
            read_line(&format!("Webhook port [{}]: ", existing.port))?,
            &existing.port,
        );
        if value.parse::<u16>().is_ok() {
            break value;
        }
        println!("  Port must be a number between 0 and 65535.");
    };

    let config = format_config(&ConfigParams {
        discord_token: &discord_token,
        channel_id: &channel_id,
        command_prefix: &command_prefix,
        line_secret: &line_secret,
        line_token: &line_token,
        target_id: &target_id,
        port: &port,
    });

    if print_only {
        print!("{config}");
        return Ok(());
    }

    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Point the LINE webhook URL at https://<your-host>/callback");
    println!("   Run the bridge with:  cargo run");
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Resolve project root: prefer LINECORD_ROOT env, fall back to cwd.
    let project_root =
        PathBuf::from(std::env::var("LINECORD_ROOT").unwrap_or_else(|_| ".".to_string()));

    run(&project_root, args.iter().any(|a| a == "--print"))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
