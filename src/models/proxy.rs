use serde::{Deserialize, Serialize};

/// Proxy status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl ProxyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyStatus::Online => "online",
            ProxyStatus::Offline => "offline",
            ProxyStatus::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "online" => ProxyStatus::Online,
            "offline" => ProxyStatus::Offline,
            _ => ProxyStatus::Unknown,
        }
    }
}

impl std::fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upstream HTTP proxy as returned by the provider.
///
/// The port is kept as text because the provider encodes it that way; it is
/// only validated when a transport is built for the proxy.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Proxy {
    #[serde(rename = "ip", default)]
    pub address: String,
    #[serde(rename = "portNum", default)]
    pub port: String,
    #[serde(default)]
    pub status: String, // Informational only
    #[serde(rename = "cityName", default)]
    pub city: String,
    #[serde(rename = "regionName", default)]
    pub region: String,
    #[serde(rename = "countryCode", default)]
    pub country_code: String,
    #[serde(rename = "countryName", default)]
    pub country_name: String,
    #[serde(rename = "panel_user", default)]
    pub username: String,
    #[serde(rename = "panel_pass", default, skip_serializing)]
    pub password: String,
}

impl Proxy {
    /// Create a proxy record from an address and port
    pub fn new(address: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
            ..Default::default()
        }
    }

    /// Get the status enum
    pub fn status_enum(&self) -> ProxyStatus {
        ProxyStatus::from_str(&self.status)
    }

    pub fn is_online(&self) -> bool {
        self.status_enum() == ProxyStatus::Online
    }

    /// Get the proxy endpoint URL (credentials are applied separately)
    pub fn url(&self) -> String {
        format!("http://{}", self.endpoint())
    }

    /// `host:port` form used in logs and errors
    pub fn endpoint(&self) -> String {
        let host = self.address.trim();
        if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
            format!("[{}]:{}", host, self.port.trim())
        } else {
            format!("{}:{}", host, self.port.trim())
        }
    }

    /// Basic auth credentials, if the provider supplied a username
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.username.is_empty() {
            None
        } else {
            Some((self.username.as_str(), self.password.as_str()))
        }
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("status", &self.status)
            .field("city", &self.city)
            .field("region", &self.region)
            .field("country_code", &self.country_code)
            .field("country_name", &self.country_name)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Wrapper object the provider puts around each proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEntry {
    #[serde(rename = "Proxy")]
    pub proxy: Proxy,
}

/// Body of the provider's proxy listing
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<ProxyEntry>,
}

impl ProviderResponse {
    pub fn into_proxies(self) -> Vec<Proxy> {
        self.data.into_iter().map(|entry| entry.proxy).collect()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<ProxyEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ProxyEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_status_parsing() {
        assert_eq!(ProxyStatus::from_str("online"), ProxyStatus::Online);
        assert_eq!(ProxyStatus::from_str("OFFLINE"), ProxyStatus::Offline);
        assert_eq!(ProxyStatus::from_str(" Online "), ProxyStatus::Online);
        assert_eq!(ProxyStatus::from_str("busy"), ProxyStatus::Unknown);
        assert_eq!(ProxyStatus::from_str(""), ProxyStatus::Unknown);

        assert_eq!(ProxyStatus::Offline.to_string(), "offline");
    }

    #[test]
    fn test_provider_response_decodes_known_fields() {
        let body = r#"{
            "data": [
                {"Proxy": {
                    "ip": "127.0.0.2",
                    "status": "offline",
                    "portNum": "81",
                    "cityName": "New York",
                    "regionName": "New York",
                    "countryCode": "US",
                    "countryName": "United States",
                    "panel_user": "alice",
                    "panel_pass": "secret",
                    "lastSeen": "2019-01-01"
                }, "Extra": {"ignored": true}}
            ],
            "meta": {"count": 1}
        }"#;

        let response: ProviderResponse = serde_json::from_str(body).unwrap();
        let proxies = response.into_proxies();

        assert_eq!(proxies.len(), 1);
        let proxy = &proxies[0];
        assert_eq!(proxy.address, "127.0.0.2");
        assert_eq!(proxy.port, "81");
        assert_eq!(proxy.status_enum(), ProxyStatus::Offline);
        assert_eq!(proxy.city, "New York");
        assert_eq!(proxy.country_code, "US");
        assert_eq!(proxy.country_name, "United States");
        assert_eq!(proxy.credentials(), Some(("alice", "secret")));
    }

    #[test]
    fn test_provider_response_tolerates_missing_data() {
        let response: ProviderResponse = serde_json::from_str("{}").unwrap();
        assert!(response.data.is_empty());

        let response: ProviderResponse = serde_json::from_str(r#"{"data": null}"#).unwrap();
        assert!(response.data.is_empty());

        let response: ProviderResponse =
            serde_json::from_str(r#"{"data": [{"Proxy": {"ip": "1.2.3.4"}}]}"#).unwrap();
        let proxies = response.into_proxies();
        assert_eq!(proxies[0].address, "1.2.3.4");
        assert_eq!(proxies[0].port, "");
        assert_eq!(proxies[0].credentials(), None);
    }

    #[test]
    fn test_port_must_be_text() {
        let result: std::result::Result<ProviderResponse, _> =
            serde_json::from_str(r#"{"data": [{"Proxy": {"ip": "1.2.3.4", "portNum": 80}}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_proxy_url_formats() {
        let mut proxy = Proxy::new("1.2.3.4", "1234");
        assert_eq!(proxy.url(), "http://1.2.3.4:1234");
        assert_eq!(proxy.endpoint(), "1.2.3.4:1234");

        proxy.username = "user".to_string();
        proxy.password = "pass".to_string();
        assert_eq!(proxy.url(), "http://1.2.3.4:1234");
        assert_eq!(proxy.credentials(), Some(("user", "pass")));
    }

    #[test]
    fn test_proxy_url_brackets_ipv6() {
        let proxy = Proxy::new("::1", "8080");
        assert_eq!(proxy.url(), "http://[::1]:8080");

        let proxy = Proxy::new("[::1]", "8080");
        assert_eq!(proxy.endpoint(), "[::1]:8080");
    }

    #[test]
    fn test_proxy_credentials_allow_empty_password() {
        let mut proxy = Proxy::new("1.2.3.4", "1234");
        proxy.username = "user".to_string();
        assert_eq!(proxy.credentials(), Some(("user", "")));
    }

    #[test]
    fn test_proxy_debug_and_serialize_hide_password() {
        let mut proxy = Proxy::new("1.2.3.4", "1234");
        proxy.username = "user".to_string();
        proxy.password = "hunter2".to_string();

        let debug = format!("{:?}", proxy);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));

        let json = serde_json::to_string(&proxy).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"panel_user\":\"user\""));
    }
}
