use std::env;
use std::fmt;

const MIN_SECRET_LEN: usize = 16;

/// Credentials for the administrator created at startup when no admin exists yet.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} must be set", var),
            ConfigError::Invalid { var, reason } => write!(f, "{} is invalid: {}", var, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process configuration, read once at startup and handed to the components that need it.
pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub bootstrap_admin: Option<AdminCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        let jwt_expiration_hours: i64 = parsed("JWT_EXPIRATION_HOURS", 24)?;
        if jwt_expiration_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "JWT_EXPIRATION_HOURS",
                reason: "must be positive".into(),
            });
        }

        let bcrypt_cost: u32 = parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                reason: "must be between 4 and 31".into(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_port: parsed("SERVER_PORT", 8080)?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            jwt_secret,
            jwt_expiration_hours,
            bcrypt_cost,
            bootstrap_admin: admin_from_env()?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parsed<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

// All three variables or none.
fn admin_from_env() -> Result<Option<AdminCredentials>, ConfigError> {
    let username = env::var("ADMIN_USERNAME").ok();
    let email = env::var("ADMIN_EMAIL").ok();
    let password = env::var("ADMIN_PASSWORD").ok();

    match (username, email, password) {
        (Some(username), Some(email), Some(password)) => Ok(Some(AdminCredentials {
            username,
            email,
            password,
        })),
        (None, None, None) => Ok(None),
        _ => Err(ConfigError::Invalid {
            var: "ADMIN_USERNAME",
            reason: "ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together".into(),
        }),
    }
}
