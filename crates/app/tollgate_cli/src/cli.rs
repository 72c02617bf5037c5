use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about = "Tollgate operator CLI")]
pub struct Cli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// PostgreSQL connection URL.
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Print a fresh base64 32-byte key for ENC_KEY_BASE64.
    GenKey,

    /// Approve a device and set its access envelope.
    Activate(ActivateCmd),

    /// Suspend a device.
    Suspend(SuspendCmd),

    /// Store encrypted upstream credentials for a device.
    SetUpstream(SetUpstreamCmd),
}

#[derive(Args, Debug)]
pub struct ActivateCmd {
    /// Device code shown on the device.
    pub code: String,

    /// Concurrent stream entitlement.
    #[arg(long)]
    pub max_streams: Option<i32>,

    /// Access expiry (RFC 3339).
    #[arg(long, conflicts_with = "days")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Access expiry as a number of days from now.
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct SuspendCmd {
    /// Device code shown on the device.
    pub code: String,
}

#[derive(Args, Debug)]
pub struct SetUpstreamCmd {
    /// Device code shown on the device.
    pub code: String,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub password: String,

    /// Upstream base URL; the device follows XUI_BASE_URL when omitted.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Vault key (base64, 32 bytes).
    #[arg(long, env = "ENC_KEY_BASE64", hide_env_values = true)]
    pub enc_key: Option<String>,

    /// Default upstream base URL.
    #[arg(long, env = "XUI_BASE_URL")]
    pub default_base_url: Option<String>,
}
