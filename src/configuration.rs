use config::ConfigError;

use crate::error::ConfigError as SettingsError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Directory with the built SPA; nothing is served when unset.
    #[serde(default)]
    pub static_dir: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT signing settings.
///
/// Access and refresh tokens are signed with different secrets so a leaked
/// access secret cannot be used to mint refresh tokens.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,  // seconds
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64, // seconds
    pub issuer: String,
}

fn default_access_token_expiry() -> i64 {
    900
}

fn default_refresh_token_expiry() -> i64 {
    60 * 60 * 24 * 14
}

impl JwtSettings {
    /// Reject settings the token service cannot run safely with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.access_secret.is_empty() {
            return Err(SettingsError::MissingRequired("jwt.access_secret".to_string()));
        }
        if self.refresh_secret.is_empty() {
            return Err(SettingsError::MissingRequired("jwt.refresh_secret".to_string()));
        }
        if self.access_secret == self.refresh_secret {
            return Err(SettingsError::InvalidValue(
                "jwt.access_secret and jwt.refresh_secret must differ".to_string(),
            ));
        }
        if self.access_token_expiry <= 0 || self.refresh_token_expiry <= 0 {
            return Err(SettingsError::InvalidValue(
                "token lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    pub bcrypt_cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Load settings from `configuration.*` (optional) overlaid with `APP_*`
/// environment variables, e.g. `APP_JWT__REFRESH_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
