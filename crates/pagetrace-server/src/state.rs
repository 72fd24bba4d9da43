use std::sync::Arc;

use pagetrace_core::config::Config;
use pagetrace_store::{MemoryStore, SessionStore, WebsiteStore};

/// Geography fields resolved from a client IP. All fields stay `None` when
/// the lookup fails for any reason — enrichment never fails a request.
#[derive(Debug, Clone, Default)]
pub struct GeoFields {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub websites: Arc<dyn WebsiteStore>,
    pub config: Arc<Config>,
    /// GeoIP City database, opened once at startup. `None` when the file is
    /// absent or unreadable (warned about in main, never fatal).
    geoip: Option<maxminddb::Reader<Vec<u8>>>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, config: Config) -> Self {
        Self::with_stores(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            store as Arc<dyn WebsiteStore>,
            config,
        )
    }

    /// Wire up independent session and website backends.
    pub fn with_stores(
        sessions: Arc<dyn SessionStore>,
        websites: Arc<dyn WebsiteStore>,
        config: Config,
    ) -> Self {
        let geoip = maxminddb::Reader::open_readfile(&config.geoip_path).ok();
        Self {
            sessions,
            websites,
            config: Arc::new(config),
            geoip,
        }
    }

    /// Best-effort GeoIP lookup. Unparseable IPs, a missing database, and
    /// records without the requested names all degrade to empty fields.
    pub fn lookup_geo(&self, ip: &str) -> GeoFields {
        use std::net::IpAddr;
        use std::str::FromStr;

        let Some(reader) = self.geoip.as_ref() else {
            return GeoFields::default();
        };
        let Ok(ip_addr) = IpAddr::from_str(ip) else {
            return GeoFields::default();
        };
        let Ok(result) = reader.lookup(ip_addr) else {
            return GeoFields::default();
        };
        let Ok(Some(record)) = result.decode::<maxminddb::geoip2::City>() else {
            return GeoFields::default();
        };

        GeoFields {
            country: record.country.names.english.map(|s| s.to_string()),
            country_code: record.country.iso_code.map(|s| s.to_string()),
            region: record
                .subdivisions
                .first()
                .and_then(|sub| sub.names.english)
                .map(|s| s.to_string()),
            city: record.city.names.english.map(|s| s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagetrace_core::config::AuthMode;

    fn config() -> Config {
        Config {
            port: 0,
            geoip_path: "/nonexistent/GeoLite2-City.mmdb".to_string(),
            auth_mode: AuthMode::None,
            public_url: "http://localhost:3000".to_string(),
            seed_domain: None,
        }
    }

    #[test]
    fn geo_lookup_degrades_without_database() {
        let state = AppState::new(Arc::new(MemoryStore::new()), config());
        let geo = state.lookup_geo("8.8.8.8");
        assert!(geo.country.is_none());
        assert!(geo.country_code.is_none());
        assert!(geo.region.is_none());
        assert!(geo.city.is_none());
    }

    #[test]
    fn geo_lookup_degrades_on_unparseable_ip() {
        let state = AppState::new(Arc::new(MemoryStore::new()), config());
        let geo = state.lookup_geo("not-an-ip");
        assert!(geo.country.is_none());
    }
}
