use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("JOBBOARD_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("JOBBOARD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("JOBBOARD_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("JOBBOARD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// How the "recent documents" exemption reduces a checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecentDocumentsPolicy {
    /// Skip requirements the applicant already covers with an approved, still-valid document.
    #[default]
    FreshnessCheck,
    /// Treat the exemption as removing nothing.
    NoReduction,
}

impl RecentDocumentsPolicy {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "freshness_check" | "freshness" => Ok(Self::FreshnessCheck),
            "no_reduction" | "none" => Ok(Self::NoReduction),
            other => Err(ConfigError::InvalidSetting {
                name: "JOBBOARD_RECENT_DOCUMENTS_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

/// Which exemption wins when several are active for the same user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExemptionTieBreak {
    #[default]
    LatestCreated,
    LatestValidFrom,
}

impl ExemptionTieBreak {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest_created" => Ok(Self::LatestCreated),
            "latest_valid_from" => Ok(Self::LatestValidFrom),
            other => Err(ConfigError::InvalidSetting {
                name: "JOBBOARD_EXEMPTION_TIE_BREAK",
                value: other.to_string(),
            }),
        }
    }
}

/// Business-rule dials for the recruitment engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub recent_documents: RecentDocumentsPolicy,
    pub exemption_tie_break: ExemptionTieBreak,
    pub default_interview_minutes: u32,
    pub workday_start_hour: u32,
    pub workday_end_hour: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recent_documents: RecentDocumentsPolicy::default(),
            exemption_tie_break: ExemptionTieBreak::default(),
            default_interview_minutes: 30,
            workday_start_hour: 8,
            workday_end_hour: 17,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let recent_documents = match env::var("JOBBOARD_RECENT_DOCUMENTS_POLICY") {
            Ok(value) => RecentDocumentsPolicy::parse(&value)?,
            Err(_) => defaults.recent_documents,
        };
        let exemption_tie_break = match env::var("JOBBOARD_EXEMPTION_TIE_BREAK") {
            Ok(value) => ExemptionTieBreak::parse(&value)?,
            Err(_) => defaults.exemption_tie_break,
        };
        let default_interview_minutes = parse_number(
            "JOBBOARD_DEFAULT_INTERVIEW_MINUTES",
            defaults.default_interview_minutes,
        )?;
        let workday_start_hour =
            parse_number("JOBBOARD_WORKDAY_START", defaults.workday_start_hour)?;
        let workday_end_hour = parse_number("JOBBOARD_WORKDAY_END", defaults.workday_end_hour)?;

        if workday_start_hour >= workday_end_hour || workday_end_hour > 24 {
            return Err(ConfigError::InvalidWorkday {
                start: workday_start_hour,
                end: workday_end_hour,
            });
        }

        Ok(Self {
            recent_documents,
            exemption_tie_break,
            default_interview_minutes,
            workday_start_hour,
            workday_end_hour,
        })
    }
}

fn parse_number(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidSetting { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSetting { name: &'static str, value: String },
    InvalidWorkday { start: u32, end: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "JOBBOARD_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "JOBBOARD_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSetting { name, value } => {
                write!(f, "{name} has an unsupported value '{value}'")
            }
            ConfigError::InvalidWorkday { start, end } => write!(
                f,
                "workday hours must satisfy start < end <= 24 (got {start}..{end})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
