use thiserror::Error;
use tokio::net::lookup_host;
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("not an absolute url")]
    Malformed,
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("missing host")]
    MissingHost,
    #[error("host '{0}' does not resolve")]
    Unresolvable(String),
}

/// A URL that passed validation. `original_url` is the caller's input, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    pub original_url: String,
    pub hostname: String,
}

/// Accepts absolute `http`/`https` URLs with a host.
///
/// With `require_resolvable_host` the hostname must also resolve to at least
/// one address. With `scheme_case_sensitive` the scheme has to be written in
/// lowercase, `HTTP://example.com` is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlValidator {
    require_resolvable_host: bool,
    scheme_case_sensitive: bool,
}

impl UrlValidator {
    pub fn new(require_resolvable_host: bool, scheme_case_sensitive: bool) -> Self {
        Self {
            require_resolvable_host,
            scheme_case_sensitive,
        }
    }

    pub async fn validate(&self, raw: &str) -> Result<ValidatedUrl, Rejection> {
        let url = Url::parse(raw).map_err(|_| Rejection::Malformed)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Rejection::UnsupportedScheme(url.scheme().into()));
        }
        if self.scheme_case_sensitive {
            // the parser lowercases schemes, so compare against the raw text
            let written = raw.trim_start().split(':').next().unwrap_or_default();
            if written != url.scheme() {
                return Err(Rejection::UnsupportedScheme(written.into()));
            }
        }

        let hostname = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or(Rejection::MissingHost)?
            .to_string();

        if self.require_resolvable_host && !resolves(&url).await {
            return Err(Rejection::Unresolvable(hostname));
        }

        Ok(ValidatedUrl {
            original_url: raw.into(),
            hostname,
        })
    }
}

async fn resolves(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            match lookup_host((domain, port)).await {
                Ok(mut addresses) => addresses.next().is_some(),
                Err(_) => false,
            }
        }
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        None => false,
    }
}
