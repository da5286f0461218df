use std::{env, io::Write, net::IpAddr, time::Duration};

use daraja_tools::{DEFAULT_DARAJA_BASE_URL, DEFAULT_DARAJA_TIMEOUT};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tamu_common::{parse_boolean_flag, parse_ip_list, Secret};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_TPOS_HOST: &str = "127.0.0.1";
const DEFAULT_TPOS_PORT: u16 = 8460;
const DEFAULT_TPOS_DATABASE_URL: &str = "sqlite://data/tamu_pos.db";
const MIN_JWT_SECRET_LENGTH: usize = 16;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub mpesa: MpesaConfig,
    /// If supplied, payment callbacks are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub callback_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Apply any outstanding database migrations on startup.
    pub run_migrations: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TPOS_HOST.to_string(),
            port: DEFAULT_TPOS_PORT,
            database_url: DEFAULT_TPOS_DATABASE_URL.to_string(),
            auth: AuthConfig::default(),
            mpesa: MpesaConfig::default(),
            callback_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
            run_migrations: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TPOS_HOST").ok().unwrap_or_else(|| DEFAULT_TPOS_HOST.into());
        let port = env::var("TPOS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TPOS_PORT. {e} Using the default, {DEFAULT_TPOS_PORT}, \
                         instead."
                    );
                    DEFAULT_TPOS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TPOS_PORT);
        let database_url = env::var("TPOS_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ TPOS_DATABASE_URL is not set. Using {DEFAULT_TPOS_DATABASE_URL}");
            DEFAULT_TPOS_DATABASE_URL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let mpesa = MpesaConfig::from_env_or_default();
        let callback_whitelist = configure_callback_whitelist(env::var("TPOS_MPESA_CALLBACK_WHITELIST").ok());
        let use_x_forwarded_for = parse_boolean_flag(env::var("TPOS_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("TPOS_USE_FORWARDED").ok(), false);
        let run_migrations = parse_boolean_flag(env::var("TPOS_RUN_MIGRATIONS").ok(), true);
        Self {
            host,
            port,
            database_url,
            auth,
            mpesa,
            callback_whitelist,
            use_x_forwarded_for,
            use_forwarded,
            run_migrations,
        }
    }
}

fn configure_callback_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let Some(value) = value else {
        info!("🪛️ No M-Pesa callback whitelist is set. Callbacks are accepted from any address.");
        return None;
    };
    let (whitelist, invalid) = parse_ip_list(&value);
    for addr in invalid {
        warn!("🪛️ Ignoring invalid IP address ({addr}) in TPOS_MPESA_CALLBACK_WHITELIST");
    }
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The M-Pesa callback whitelist was configured, but is empty. The server will run, but won't accept \
                 any payment callbacks."
            );
        },
        None => {
            info!(
                "🪛️ The M-Pesa callback whitelist is disabled. If this is not what you want, set \
                 TPOS_MPESA_CALLBACK_WHITELIST to a comma-separated list of IP addresses to enable it."
            );
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ M-Pesa callback whitelist: {addrs}");
        },
    }
    whitelist
}

//-------------------------------------------------  MpesaConfig  ------------------------------------------------------
/// Deployment-wide M-Pesa settings. The merchant credentials themselves are per-restaurant and live in the database.
#[derive(Clone, Debug)]
pub struct MpesaConfig {
    pub base_url: String,
    /// The publicly reachable URL of `/api/payments/callback`. STK pushes cannot be sent without it.
    pub callback_url: String,
    pub timeout: Duration,
}

impl Default for MpesaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DARAJA_BASE_URL.to_string(),
            callback_url: String::default(),
            timeout: DEFAULT_DARAJA_TIMEOUT,
        }
    }
}

impl MpesaConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("TPOS_MPESA_BASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ TPOS_MPESA_BASE_URL is not set. Using {DEFAULT_DARAJA_BASE_URL}");
            DEFAULT_DARAJA_BASE_URL.to_string()
        });
        let callback_url = env::var("TPOS_MPESA_CALLBACK_URL").ok().unwrap_or_else(|| {
            error!(
                "🪛️ TPOS_MPESA_CALLBACK_URL is not set. STK push requests will fail until it points at this server's \
                 /api/payments/callback endpoint."
            );
            String::default()
        });
        let timeout = env::var("TPOS_MPESA_TIMEOUT")
            .map_err(|_| {
                debug!(
                    "🪛️ TPOS_MPESA_TIMEOUT is not set. Using the default value of {}s.",
                    DEFAULT_DARAJA_TIMEOUT.as_secs()
                )
            })
            .and_then(|s| {
                s.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for TPOS_MPESA_TIMEOUT. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_DARAJA_TIMEOUT);
        Self { base_url, callback_url, timeout }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HMAC secret used to sign and verify access tokens (HS256).
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this since every issued token will stop working when the server restarts. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        match &mut tmpfile {
            Some((f, p)) => match writeln!(f, "{secret}") {
                Ok(()) => warn!(
                    "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                     you are doing it wrong! Set the TPOS_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                    p.to_str().unwrap_or("???")
                ),
                Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self { jwt_secret: Secret::from(secret) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("TPOS_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [TPOS_JWT_SECRET]")))?;
        if secret.trim().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ServerError::ConfigurationError(format!(
                "TPOS_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} characters long"
            )));
        }
        Ok(Self::new(secret.trim()))
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub callback_whitelist: Option<Vec<IpAddr>>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            callback_whitelist: config.callback_whitelist.clone(),
        }
    }

    /// True if a callback from `peer` should be processed. With no whitelist, everyone is allowed. With a whitelist,
    /// a peer whose address cannot be determined is refused.
    pub fn accepts_callback_from(&self, peer: Option<IpAddr>) -> bool {
        match (peer, &self.callback_whitelist) {
            (_, None) => true,
            (Some(ip), Some(whitelist)) => whitelist.contains(&ip),
            (None, Some(_)) => false,
        }
    }
}
