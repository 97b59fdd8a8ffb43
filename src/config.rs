//! Application constants and environment-driven configuration.

use std::net::SocketAddr;
use std::str::FromStr;

pub const APP_NAME: &str = "Vaidya";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info"
}

/// One-time-code issuance and verification limits.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Code lifetime in seconds (5 minutes by default).
    pub ttl_secs: i64,
    /// Verification attempts allowed per session before lockout.
    pub max_attempts: u32,
    /// Digits in the generated code.
    pub code_length: usize,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_attempts: 5,
            code_length: 6,
        }
    }
}

/// Service configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub otp: OtpConfig,
    /// Echo the generated code in the send-otp response. Development
    /// only; must stay off in any production posture.
    pub dev_echo_code: bool,
    /// Insert the demo roster at startup.
    pub seed_demo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            otp: OtpConfig::default(),
            dev_echo_code: false,
            seed_demo: false,
        }
    }
}

impl AppConfig {
    /// Build configuration from `VAIDYA_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("VAIDYA_BIND", defaults.bind_addr),
            otp: OtpConfig {
                ttl_secs: env_or("VAIDYA_OTP_TTL_SECS", defaults.otp.ttl_secs),
                max_attempts: env_or("VAIDYA_OTP_MAX_ATTEMPTS", defaults.otp.max_attempts),
                code_length: env_or("VAIDYA_OTP_CODE_LENGTH", defaults.otp.code_length),
            },
            dev_echo_code: env_or("VAIDYA_DEV_ECHO_CODE", defaults.dev_echo_code),
            seed_demo: env_or("VAIDYA_SEED_DEMO", defaults.seed_demo),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}
