use std::net::{IpAddr, SocketAddr};

use clap::Args;
use manafiles_db::DbConfig;
use manafiles_store::StoreConfig;

/// Log filter used when `RUST_LOG` is unset. Request spans from
/// `TraceLayer` are emitted at debug.
pub const DEFAULT_LOG_FILTER: &str =
    "manafiles_server=info,manafiles_service=info,manafiles_db=info,tower_http=debug";

/// Upper bound for `--session-ttl-hours` (ten years).
pub const MAX_SESSION_TTL_HOURS: i64 = 87_600;

/// Server settings. Every flag can also come from its `MANAFILES_*` variable.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "MANAFILES_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "MANAFILES_PORT", default_value_t = 3710)]
    pub port: u16,

    /// SQLite database file [default: <data dir>/manafiles.db]
    #[arg(long, env = "MANAFILES_DB_PATH")]
    pub db_path: Option<String>,

    /// Object store root [default: <data dir>/objects]
    #[arg(long, env = "MANAFILES_STORE_DIR")]
    pub store_dir: Option<String>,

    /// Lifetime of a login session, in hours
    #[arg(
        long,
        env = "MANAFILES_SESSION_TTL_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_HOURS)
    )]
    pub session_ttl_hours: i64,

    /// Largest accepted upload, in MiB
    #[arg(long, env = "MANAFILES_MAX_UPLOAD_MB", default_value_t = 25)]
    pub max_upload_mb: usize,

    /// Seconds between sweeps of expired sessions and reset codes
    #[arg(long, env = "MANAFILES_PURGE_INTERVAL_SECS", default_value_t = 3600)]
    pub purge_interval_secs: u64,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self.db_path.clone(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            local_data_dir: self.store_dir.clone(),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
