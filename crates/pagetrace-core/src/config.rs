#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub geoip_path: String,
    pub auth_mode: AuthMode,
    /// Externally reachable base URL, used to render the embed snippet.
    pub public_url: String,
    /// When set, a website for this domain is seeded at startup so the
    /// server is usable out of the box.
    pub seed_domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthMode {
    None,
    /// Holds the shared bearer token read from `PAGETRACE_API_TOKEN`.
    Token(String),
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("PAGETRACE_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            geoip_path: std::env::var("PAGETRACE_GEOIP_PATH")
                .unwrap_or_else(|_| "./GeoLite2-City.mmdb".to_string()),
            auth_mode: {
                let raw =
                    std::env::var("PAGETRACE_AUTH").unwrap_or_else(|_| "none".to_string());
                match raw.as_str() {
                    "token" => {
                        let token = std::env::var("PAGETRACE_API_TOKEN").map_err(|_| {
                            "PAGETRACE_API_TOKEN required when PAGETRACE_AUTH=token".to_string()
                        })?;
                        AuthMode::Token(token)
                    }
                    _ => AuthMode::None,
                }
            },
            public_url: std::env::var("PAGETRACE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            seed_domain: std::env::var("PAGETRACE_SEED_DOMAIN").ok(),
        })
    }
}
