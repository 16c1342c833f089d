//! Clap derive structures for the `simplisafe` CLI.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// simplisafe -- arm, disarm and inspect SimpliSafe alarm systems
#[derive(Debug, Parser)]
#[command(
    name = "simplisafe",
    version,
    about = "Control SimpliSafe alarm systems from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "SIMPLISAFE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account email (used when no profile is configured)
    #[arg(long, env = "SIMPLISAFE_EMAIL", global = true)]
    pub email: Option<String>,

    /// System id to act on (required when the account has several)
    #[arg(long, short = 's', env = "SIMPLISAFE_SYSTEM", global = true)]
    pub system: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SIMPLISAFE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List systems and inspect settings and sensors
    #[command(alias = "sys")]
    Systems(SystemsArgs),

    /// Arm or disarm a system and wait for the panel to confirm
    Arm(ArmArgs),

    /// Manage keypad PINs
    Pins(PinsArgs),

    /// List and operate door locks (V3 systems)
    Locks(LocksArgs),

    /// Show recent events
    Events(EventsArgs),

    /// Stream realtime events until interrupted
    Watch,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SystemsArgs {
    #[command(subcommand)]
    pub command: Option<SystemsCommand>,
}

#[derive(Debug, Subcommand)]
pub enum SystemsCommand {
    /// List every system on the account (default)
    #[command(alias = "ls")]
    List,
    /// Show state, notifications and settings of one system
    Show,
    /// List the sensors of one system
    Sensors,
}

#[derive(Debug, Args)]
pub struct ArmArgs {
    /// Target mode
    #[arg(value_enum)]
    pub mode: ArmMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ArmMode {
    Off,
    Home,
    Away,
}

#[derive(Debug, Args)]
pub struct PinsArgs {
    #[command(subcommand)]
    pub command: PinsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PinsCommand {
    /// List PINs (masked unless --reveal)
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        reveal: bool,
    },
    /// Add or change a PIN
    Set {
        /// PIN label ("master", "duress" or a user name)
        label: String,
        /// Four digits
        pin: String,
    },
    /// Remove a user PIN by label or value
    #[command(alias = "rm")]
    Remove { label_or_pin: String },
}

#[derive(Debug, Args)]
pub struct LocksArgs {
    #[command(subcommand)]
    pub command: LocksCommand,
}

#[derive(Debug, Subcommand)]
pub enum LocksCommand {
    /// List door locks
    #[command(alias = "ls")]
    List,
    /// Lock a door lock
    Lock { serial: String },
    /// Unlock a door lock
    Unlock { serial: String },
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Number of events to fetch
    #[arg(long, short = 'l')]
    pub limit: Option<u32>,

    /// Start the history at this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Show only the most recent event
    #[arg(long, conflicts_with_all = ["limit", "since"])]
    pub latest: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile (uses --email and --profile)
    Init {
        /// Environment variable holding the password
        #[arg(long)]
        password_env: Option<String>,
        /// REST base URL override
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Print the configuration with secrets redacted
    Show,
    /// Print the config file and token cache locations
    Path,
    /// Forget the cached refresh token for the profile
    Logout,
}
