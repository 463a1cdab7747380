use std::env;
use tracing::warn;

pub const DEFAULT_CLINIC_UTC_OFFSET_MINUTES: i32 = -360;
pub const DEFAULT_CLINIC_LAST_SLOT: &str = "15:30";
pub const DEFAULT_CLINIC_CLOSED_WEEKDAY: &str = "sunday";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    /// Offset of the clinic's civil time from UTC, in minutes (Guadalajara is -360).
    pub clinic_utc_offset_minutes: i32,
    /// Last bookable slot of the day, `HH:MM`.
    pub clinic_last_slot: String,
    /// Weekday the clinic is closed, or `none`.
    pub clinic_closed_weekday: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
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
            clinic_utc_offset_minutes: env::var("CLINIC_UTC_OFFSET_MINUTES")
                .ok()
                .and_then(|raw| match raw.trim().parse::<i32>() {
                    Ok(minutes) => Some(minutes),
                    Err(_) => {
                        warn!("CLINIC_UTC_OFFSET_MINUTES is not an integer: {}", raw);
                        None
                    }
                })
                .unwrap_or(DEFAULT_CLINIC_UTC_OFFSET_MINUTES),
            clinic_last_slot: env::var("CLINIC_LAST_SLOT")
                .unwrap_or_else(|_| DEFAULT_CLINIC_LAST_SLOT.to_string()),
            clinic_closed_weekday: env::var("CLINIC_CLOSED_WEEKDAY")
                .unwrap_or_else(|_| DEFAULT_CLINIC_CLOSED_WEEKDAY.to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.trim().parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            clinic_utc_offset_minutes: DEFAULT_CLINIC_UTC_OFFSET_MINUTES,
            clinic_last_slot: DEFAULT_CLINIC_LAST_SLOT.to_string(),
            clinic_closed_weekday: DEFAULT_CLINIC_CLOSED_WEEKDAY.to_string(),
            port: DEFAULT_PORT,
        }
    }
}
