use clap::{Args, Parser, Subcommand};

/// Roster API server and admin commands.
#[derive(Parser, Debug)]
#[command(name = "roster_server", version, about = "Roster API server")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where state lives.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/roster"
    )]
    pub database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, global = true, default_value_t = 5)]
    pub max_connections: u32,

    /// Keep all state in process memory. Nothing survives a restart.
    #[arg(long, global = true, default_value_t = false)]
    pub in_memory: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API (default).
    Serve {
        /// Port to listen on; overrides the port of `BIND_ADDR`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the first super-admin, or promote an existing account.
    CreateSuperadmin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "SUPERADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Rewrite legacy platform role spellings to canonical tags.
    NormalizeRoles,
    /// Delete expired verification codes.
    PurgeCodes,
}
