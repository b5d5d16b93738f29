use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "supabase" | "rest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    pub server_port: u16,
    pub booking_redirect_delay_ms: u64,
    pub subscription_poll_interval_ms: u64,
    pub seed_demo_data: bool,
    pub seed_doctor_count: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            store_backend: StoreBackend::Memory,
            server_port: 3000,
            booking_redirect_delay_ms: 2000,
            subscription_poll_interval_ms: 2000,
            seed_demo_data: false,
            seed_doctor_count: 50,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory store", e);
                StoreBackend::Memory
            }),
            Err(_) if supabase_url.is_empty() => StoreBackend::Memory,
            Err(_) => StoreBackend::Supabase,
        };

        let config = Self {
            supabase_url,
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_backend,
            server_port: parse_or("SERVER_PORT", defaults.server_port),
            booking_redirect_delay_ms: parse_or(
                "BOOKING_REDIRECT_DELAY_MS",
                defaults.booking_redirect_delay_ms,
            ),
            subscription_poll_interval_ms: parse_or(
                "SUBSCRIPTION_POLL_INTERVAL_MS",
                defaults.subscription_poll_interval_ms,
            ),
            seed_demo_data: parse_or("SEED_DEMO_DATA", defaults.seed_demo_data),
            seed_doctor_count: parse_or("SEED_DOCTOR_COUNT", defaults.seed_doctor_count),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        match self.store_backend {
            StoreBackend::Memory => !self.supabase_jwt_secret.is_empty(),
            StoreBackend::Supabase => {
                !self.supabase_url.is_empty()
                    && !self.supabase_anon_key.is_empty()
                    && !self.supabase_jwt_secret.is_empty()
            }
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
