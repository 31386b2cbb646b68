use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
///
/// Image URLs come from crawled pages, so they are treated as untrusted
/// before anything is fetched from them.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Which hosts a crawled URL may point at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UrlPolicy {
    /// Public hosts only.
    #[default]
    PublicOnly,
    /// Also allow localhost and private ranges (local mirrors, tests).
    AllowPrivate,
}

/// Validates `url_str` under `policy`.
///
/// Under [`UrlPolicy::AllowPrivate`] only the parse and scheme checks apply.
pub fn check_url(url_str: &str, policy: UrlPolicy) -> Result<Url, UrlValidationError> {
    match policy {
        UrlPolicy::PublicOnly => validate_url(url_str),
        UrlPolicy::AllowPrivate => {
            let url = Url::parse(url_str)?;
            match url.scheme() {
                "http" | "https" => Ok(url),
                scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
            }
        }
    }
}

/// Validates a URL string before it is fetched.
///
/// Performs security-focused validation to prevent SSRF attacks by rejecting:
/// - Non-HTTP(S) schemes (e.g., `file://`, `ftp://`)
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// # Examples
///
/// ```
/// use newsfeed::util::validate_url;
///
/// // Valid public image URL
/// let url = validate_url("https://img.example.com/photo.jpg").unwrap();
/// assert_eq!(url.host_str(), Some("img.example.com"));
///
/// // Rejects localhost
/// assert!(validate_url("http://localhost/a.jpg").is_err());
///
/// // Rejects private IPs
/// assert!(validate_url("http://192.168.1.1/a.jpg").is_err());
///
/// // Rejects non-HTTP schemes
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(UrlValidationError::Localhost);
        }

        // Strip brackets from IPv6 addresses for parsing
        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
