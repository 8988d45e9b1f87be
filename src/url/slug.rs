use sha2::{Digest, Sha256};
use url::Url;

/// Converts arbitrary text to a lowercase, hyphen-separated slug
///
/// ASCII letters and digits are kept; every other run of characters is
/// collapsed into a single `-`. Leading and trailing hyphens are removed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Derives the project slug for a domain
///
/// # Examples
///
/// ```
/// use tribeca_insights::url::domain_slug;
///
/// assert_eq!(domain_slug("example.com"), "example-com");
/// ```
pub fn domain_slug(domain: &str) -> String {
    slugify(domain)
}

/// Number of hex digits of the URL digest appended to ambiguous slugs
const DIGEST_LEN: usize = 10;

/// Derives the readable part of a page's artifact name
///
/// The slug is built from the path and query. The root page is `home`.
/// Different URLs can share a readable slug (`/a-b`, `/a/b`, `/a_b`), so
/// artifact names come from [`page_slug`] instead.
pub fn readable_slug(url: &Url) -> String {
    let mut source = url.path().to_string();
    if let Some(query) = url.query() {
        source.push('-');
        source.push_str(query);
    }

    let slug = slugify(&source);
    if slug.is_empty() {
        "home".to_string()
    } else {
        slug
    }
}

/// Derives the artifact slug for a page URL
///
/// A URL whose path is exactly `/<readable slug>` (or `/` for `home`) keeps
/// the readable slug. Any other URL gets a short SHA-256 digest of the full
/// URL appended, so no two URLs share an artifact.
///
/// # Examples
///
/// ```
/// use tribeca_insights::url::page_slug;
/// use url::Url;
///
/// let plain = Url::parse("https://example.com/a-b").unwrap();
/// let nested = Url::parse("https://example.com/a/b").unwrap();
/// assert_eq!(page_slug(&plain), "a-b");
/// assert_ne!(page_slug(&nested), "a-b");
/// ```
pub fn page_slug(url: &Url) -> String {
    let readable = readable_slug(url);
    let natural_path = if readable == "home" {
        "/".to_string()
    } else {
        format!("/{}", readable)
    };

    if url.query().is_none() && url.path() == natural_path {
        return readable;
    }

    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    format!("{}-{}", readable, &digest[..DIGEST_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("/blog/2024/post_one/"), "blog-2024-post-one");
        assert_eq!(slugify("--a--b--"), "a-b");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_domain_slug() {
        assert_eq!(domain_slug("example.com"), "example-com");
        assert_eq!(domain_slug("127.0.0.1"), "127-0-0-1");
    }

    #[test]
    fn test_page_slug_root_is_home() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(page_slug(&url), "home");
    }

    #[test]
    fn test_page_slug_path() {
        let url = Url::parse("https://example.com/about/team").unwrap();
        assert_eq!(page_slug(&url), "about-team");
    }

    #[test]
    fn test_page_slug_separator_variants_do_not_collide() {
        let slugs: Vec<String> = ["/a-b", "/a/b", "/a_b", "/A-B", "/a-b/"]
            .iter()
            .map(|path| page_slug(&Url::parse(&format!("https://example.com{}", path)).unwrap()))
            .collect();

        assert_eq!(slugs[0], "a-b");
        for (i, a) in slugs.iter().enumerate() {
            for b in &slugs[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(slugs[1].starts_with("a-b-"));
        assert_eq!(slugs[1].len(), "a-b-".len() + DIGEST_LEN);
    }

    #[test]
    fn test_page_slug_home_path_does_not_claim_root() {
        let root = Url::parse("https://example.com/").unwrap();
        let home = Url::parse("https://example.com/home").unwrap();
        assert_eq!(page_slug(&root), "home");
        assert_ne!(page_slug(&home), "home");
        assert_eq!(readable_slug(&home), "home");
    }

    #[test]
    fn test_page_slug_is_deterministic() {
        let url = Url::parse("https://example.com/a/b?x=1").unwrap();
        assert_eq!(page_slug(&url), page_slug(&url));
    }

    #[test]
    fn test_page_slug_distinguishes_query() {
        let a = Url::parse("https://example.com/list?page=1").unwrap();
        let b = Url::parse("https://example.com/list?page=2").unwrap();
        assert_ne!(page_slug(&a), page_slug(&b));
    }
}
