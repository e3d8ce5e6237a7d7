use anyhow::Context;
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Business settings handed to the core services at construction time.
#[derive(Debug, Clone)]
pub struct TagSettings {
    /// Base of the public scan links encoded into each tag.
    pub frontend_base_url: String,
    pub default_monthly_fee: BigDecimal,
    pub replacement_fee: BigDecimal,
    pub send_payment_reminders: bool,
    pub session_ttl_hours: i64,
}

impl TagSettings {
    /// Payload of a tag's scannable code: `{frontendBase}/scan/{identifier}`.
    pub fn scan_url(&self, identifier: &str) -> String {
        format!(
            "{}/scan/{}",
            self.frontend_base_url.trim_end_matches('/'),
            identifier
        )
    }
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            frontend_base_url: "http://localhost:3000".to_string(),
            default_monthly_fee: BigDecimal::new(200.into(), 2),
            replacement_fee: BigDecimal::new(5000.into(), 2),
            send_payment_reminders: true,
            session_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Postgres connection string; without it the in-memory store is used.
    pub database_url: Option<String>,
    pub admin_token: String,
    pub session_secret: String,
    pub storage_root: String,
    /// `None` allows any origin.
    pub cors_allowed_origins: Option<Vec<String>>,
    pub json_logs: bool,
    pub settings: TagSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let defaults = TagSettings::default();

        let frontend_base_url =
            env::var("FRONTEND_BASE_URL").unwrap_or(defaults.frontend_base_url);
        url::Url::parse(&frontend_base_url).context("FRONTEND_BASE_URL is not a valid URL")?;

        let settings = TagSettings {
            frontend_base_url,
            default_monthly_fee: parse_decimal("MONTHLY_FEE", defaults.default_monthly_fee)?,
            replacement_fee: parse_decimal("REPLACEMENT_FEE", defaults.replacement_fee)?,
            send_payment_reminders: env::var("SEND_PAYMENT_REMINDERS")
                .map(|raw| parse_bool(&raw))
                .unwrap_or(defaults.send_payment_reminders),
            session_ttl_hours: match env::var("SESSION_TTL_HOURS") {
                Ok(raw) => parse_ttl_hours(&raw)?,
                Err(_) => defaults.session_ttl_hours,
            },
        };

        let admin_token = env::var("ADMIN_TOKEN").context("ADMIN_TOKEN must be set")?;
        if admin_token.trim().is_empty() {
            anyhow::bail!("ADMIN_TOKEN must not be empty");
        }

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8001".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            admin_token,
            session_secret: env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?,
            storage_root: env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .and_then(|raw| parse_origins(&raw)),
            json_logs: env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            settings,
        })
    }
}

fn parse_decimal(name: &str, default: BigDecimal) -> anyhow::Result<BigDecimal> {
    match env::var(name) {
        Ok(raw) => BigDecimal::from_str(raw.trim())
            .with_context(|| format!("{} must be a decimal amount", name)),
        Err(_) => Ok(default),
    }
}

/// Longest accepted customer session, one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

fn parse_ttl_hours(raw: &str) -> anyhow::Result<i64> {
    let hours: i64 = raw
        .trim()
        .parse()
        .context("SESSION_TTL_HOURS must be an integer")?;
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        anyhow::bail!(
            "SESSION_TTL_HOURS must be between 1 and {}, got {}",
            MAX_SESSION_TTL_HOURS,
            hours
        );
    }
    Ok(hours)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let value = raw.trim();
    if value.is_empty() || value == "*" {
        return None;
    }

    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        None
    } else {
        Some(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_scan_urls_without_double_slash() {
        let settings = TagSettings {
            frontend_base_url: "https://tags.example.com/".to_string(),
            ..TagSettings::default()
        };
        assert_eq!(
            settings.scan_url("PET000007"),
            "https://tags.example.com/scan/PET000007"
        );
    }

    #[test]
    fn default_fees_have_two_decimals() {
        let settings = TagSettings::default();
        assert_eq!(settings.default_monthly_fee.to_string(), "2.00");
        assert_eq!(settings.replacement_fee.to_string(), "50.00");
    }

    #[test]
    fn session_ttl_must_be_in_range() {
        assert_eq!(parse_ttl_hours(" 12 ").unwrap(), 12);
        assert!(parse_ttl_hours("0").is_err());
        assert!(parse_ttl_hours("-3").is_err());
        assert!(parse_ttl_hours("9223372036854775807").is_err());
        assert!(parse_ttl_hours("soon").is_err());
    }

    #[test]
    fn parses_bool_flags() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn parses_cors_origins() {
        assert_eq!(parse_origins("*"), None);
        assert_eq!(parse_origins(" "), None);
        assert_eq!(
            parse_origins("https://a.example, https://b.example"),
            Some(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }
}
