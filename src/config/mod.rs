use serde::{Deserialize, Deserializer};
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, deserialize_with = "host_list")]
    pub allowed_hosts: Vec<String>,
    pub static_dir: String,
    pub media_dir: String,
}

impl ServerConfig {
    /// Cookies are only marked `Secure` outside debug mode.
    pub fn secure_cookies(&self) -> bool {
        !self.debug
    }

    /// Whether a request's `Host` header (port stripped) may be served.
    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = strip_port(host).to_ascii_lowercase();
        self.allowed_hosts.iter().any(|allowed| {
            let allowed = allowed.trim().to_ascii_lowercase();
            if allowed == "*" {
                true
            } else if let Some(suffix) = allowed.strip_prefix('.') {
                host == suffix || host.ends_with(&format!(".{}", suffix))
            } else {
                host == allowed
            }
        })
    }
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets; only a trailing :port is dropped.
    if host.starts_with('[') {
        return host.split(']').next().map(|h| &host[..h.len() + 1]).unwrap_or(host);
    }
    host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub session_duration_hours: i64,
    pub password_reset_timeout_hours: i64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmailBackend {
    #[default]
    Console,
    Smtp,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    #[serde(default)]
    pub backend: EmailBackend,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            backend: EmailBackend::Console,
            host: "smtp.gmail.com".to_string(),
            port: 587,
            use_tls: true,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@acjogos-rj.org.br".to_string(),
        }
    }
}

/// Accepts either a list or a comma-separated string, so
/// `INTRANET__SERVER__ALLOWED_HOSTS=a.org,b.org` works from the environment.
fn host_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hosts {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Hosts::deserialize(deserializer)? {
        Hosts::List(list) => list,
        Hosts::Csv(csv) => csv
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.base_url", "http://localhost:8000")?
            .set_default("server.debug", true)?
            .set_default("server.allowed_hosts", "localhost,127.0.0.1")?
            .set_default("server.static_dir", "static")?
            .set_default("server.media_dir", "media")?
            .set_default("database.url", "sqlite://intranet.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.secret_key", "insecure-change-me-in-production")?
            .set_default("auth.session_duration_hours", 336)?
            .set_default("auth.password_reset_timeout_hours", 72)?
            .set_default("email.backend", "console")?
            .set_default("email.host", "smtp.gmail.com")?
            .set_default("email.port", 587)?
            .set_default("email.use_tls", true)?
            .set_default("email.from_address", "noreply@acjogos-rj.org.br")?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with INTRANET__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("INTRANET").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                base_url: "http://localhost:8000".to_string(),
                debug: true,
                allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
                static_dir: "static".to_string(),
                media_dir: "media".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://intranet.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                secret_key: "insecure-change-me-in-production".to_string(),
                session_duration_hours: 336,
                password_reset_timeout_hours: 72,
            },
            email: EmailConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(hosts: &[&str]) -> ServerConfig {
        ServerConfig {
            allowed_hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..Settings::default().server
        }
    }

    #[test]
    fn test_allowed_hosts_ignore_port_and_case() {
        let server = server(&["localhost", "intranet.acjogos-rj.org.br"]);
        assert!(server.is_allowed_host("localhost:8000"));
        assert!(server.is_allowed_host("Intranet.ACJogos-RJ.org.br"));
        assert!(!server.is_allowed_host("evil.example.com"));
    }

    #[test]
    fn test_allowed_hosts_wildcards() {
        assert!(server(&["*"]).is_allowed_host("anything.test"));

        let subdomains = server(&[".acjogos-rj.org.br"]);
        assert!(subdomains.is_allowed_host("acjogos-rj.org.br"));
        assert!(subdomains.is_allowed_host("www.acjogos-rj.org.br"));
        assert!(!subdomains.is_allowed_host("notacjogos-rj.org.br"));
    }

    #[test]
    fn test_ipv6_host_keeps_brackets() {
        assert!(server(&["[::1]"]).is_allowed_host("[::1]:8000"));
    }
}
