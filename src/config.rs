//! Runtime configuration read from the environment
//!
//! Every setting has a default so a bare `nack` starts a working local
//! instance. Secrets can also be mounted as files under `/run/secrets/`.

use std::{
    env,
    fmt::Display,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{info, warn};

use crate::loyalty::LoyaltyRules;

const SECRETS_DIR: &str = "/run/secrets";

/// Payment gateway credentials and routing
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub wallet: String,
    pub disbursement_id: String,
    /// Shared secret the gateway echoes in the `x-callback-secret` header
    pub callback_secret: String,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub upload_url: String,
    pub delete_url: String,
    pub upload_preset: String,
}

#[derive(Debug, Clone)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub endpoint: String,
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl SmtpConfig {
    /// Mail is only sent when a relay host has been configured
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    /// Base URL the browser reaches the service on, used for payment redirects
    pub public_url: String,
    pub session_hours: u64,
    /// Monthly subscription price in FCFA
    pub subscription_price: i64,
    pub http_timeout_secs: u64,
    pub loyalty: LoyaltyRules,
    pub gateway: GatewayConfig,
    pub images: ImageConfig,
    pub geocoding: GeocodingConfig,
    pub push: PushConfig,
    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            data_dir: PathBuf::from("database"),
            public_url: "http://localhost:3000".to_string(),
            session_hours: 24,
            subscription_price: 15_000,
            http_timeout_secs: 15,
            loyalty: LoyaltyRules::default(),
            gateway: GatewayConfig {
                base_url: "https://gateway.singpay.ga/v1".to_string(),
                client_id: String::new(),
                client_secret: String::new(),
                wallet: String::new(),
                disbursement_id: String::new(),
                callback_secret: String::new(),
            },
            images: ImageConfig {
                upload_url: "https://api.cloudinary.com/v1_1/nack/image/upload".to_string(),
                delete_url: "https://api.cloudinary.com/v1_1/nack/delete_by_token".to_string(),
                upload_preset: "nack".to_string(),
            },
            geocoding: GeocodingConfig {
                base_url: "https://api.geoapify.com/v1/geocode".to_string(),
                api_key: String::new(),
            },
            push: PushConfig {
                endpoint: "https://fcm.googleapis.com/v1/projects/nack/messages:send".to_string(),
                access_token: String::new(),
            },
            smtp: SmtpConfig {
                host: String::new(),
                port: 465,
                username: String::new(),
                password: String::new(),
                from: "Nack! <no-reply@nack.ga>".to_string(),
            },
        }
    }
}

impl Config {
    /// Build the configuration from `NACK_*` environment variables
    pub fn load() -> Self {
        let defaults = Config::default();

        Self {
            bind_addr: try_load("NACK_BIND", defaults.bind_addr),
            data_dir: PathBuf::from(try_load(
                "NACK_DATA_DIR",
                defaults.data_dir.to_string_lossy().into_owned(),
            )),
            public_url: try_load("NACK_PUBLIC_URL", defaults.public_url),
            session_hours: try_load("NACK_SESSION_HOURS", defaults.session_hours),
            subscription_price: try_load("NACK_SUBSCRIPTION_PRICE", defaults.subscription_price),
            http_timeout_secs: try_load("NACK_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),
            loyalty: LoyaltyRules {
                spend_per_point: try_load("NACK_SPEND_PER_POINT", defaults.loyalty.spend_per_point),
            },
            gateway: GatewayConfig {
                base_url: try_load("NACK_PAYMENT_URL", defaults.gateway.base_url),
                client_id: read_secret("NACK_PAYMENT_CLIENT_ID"),
                client_secret: read_secret("NACK_PAYMENT_CLIENT_SECRET"),
                wallet: try_load("NACK_PAYMENT_WALLET", defaults.gateway.wallet),
                disbursement_id: try_load("NACK_DISBURSEMENT_ID", defaults.gateway.disbursement_id),
                callback_secret: read_secret("NACK_CALLBACK_SECRET"),
            },
            images: ImageConfig {
                upload_url: try_load("NACK_IMAGE_UPLOAD_URL", defaults.images.upload_url),
                delete_url: try_load("NACK_IMAGE_DELETE_URL", defaults.images.delete_url),
                upload_preset: try_load("NACK_IMAGE_PRESET", defaults.images.upload_preset),
            },
            geocoding: GeocodingConfig {
                base_url: try_load("NACK_GEOCODING_URL", defaults.geocoding.base_url),
                api_key: read_secret("NACK_GEOCODING_KEY"),
            },
            push: PushConfig {
                endpoint: try_load("NACK_PUSH_URL", defaults.push.endpoint),
                access_token: read_secret("NACK_PUSH_TOKEN"),
            },
            smtp: SmtpConfig {
                host: try_load("NACK_SMTP_HOST", defaults.smtp.host),
                port: try_load("NACK_SMTP_PORT", defaults.smtp.port),
                username: try_load("NACK_SMTP_USER", defaults.smtp.username),
                password: read_secret("NACK_SMTP_PASSWORD"),
                from: try_load("NACK_SMTP_FROM", defaults.smtp.from),
            },
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value ({e}), using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

/// Mounted secret files win over the environment
fn read_secret(key: &str) -> String {
    read_secret_in(Path::new(SECRETS_DIR), key)
}

fn read_secret_in(dir: &Path, key: &str) -> String {
    let path = dir.join(key.to_lowercase());
    if let Ok(value) = read_to_string(&path) {
        return value.trim().to_string();
    }

    env::var(key).unwrap_or_else(|_| {
        warn!("{key} is not configured");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn secret_files_win_over_the_environment() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("nack_test_file_secret"), "from-file\n").unwrap();
        unsafe {
            env::set_var("NACK_TEST_FILE_SECRET", "from-env");
            env::set_var("NACK_TEST_ENV_SECRET", "from-env");
        }

        assert_eq!(read_secret_in(dir.path(), "NACK_TEST_FILE_SECRET"), "from-file");
        assert_eq!(read_secret_in(dir.path(), "NACK_TEST_ENV_SECRET"), "from-env");
        assert_eq!(read_secret_in(dir.path(), "NACK_TEST_MISSING_SECRET"), "");
    }
}
