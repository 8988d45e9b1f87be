use url::Url;

/// Extracts the site domain from a URL
///
/// The host is lowercased and a leading `www.` is dropped, so that
/// `www.example.com` and `example.com` name the same site.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain without `www.`
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use tribeca_insights::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(rest) => rest.to_string(),
            None => host,
        }
    })
}

/// Returns the scheme + host + port origin string for a URL
///
/// Politeness state (robots rules, request pacing) is keyed by this value.
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// The set of URLs that belong to the site being crawled
///
/// A URL is in scope when its domain (ignoring `www.`) matches the base
/// URL's domain and it is served on the same port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    domain: String,
    port: Option<u16>,
}

impl SiteScope {
    /// Builds a scope from the base URL of the crawl
    pub fn from_base(base: &Url) -> Option<Self> {
        Some(Self {
            domain: extract_domain(base)?,
            port: base.port_or_known_default(),
        })
    }

    /// The domain this scope covers
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns true if the URL belongs to this site
    pub fn contains(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        extract_domain(url).as_deref() == Some(self.domain.as_str())
            && url.port_or_known_default() == self.port
    }
}
