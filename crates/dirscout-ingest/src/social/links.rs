//! Profile link selection

use url::Url;

/// Path fragment of organisation pages
pub const COMPANY_PATH: &str = "/company/";
/// Path fragment of sub-brand pages, accepted from search results only
pub const SHOWCASE_PATH: &str = "/showcase/";

/// Resolve search-engine redirect wrappers to their target.
///
/// Handles DuckDuckGo `/l/?uddg=<target>` and Google-style `/url?q=<target>`;
/// anything else is returned as is. Protocol-relative and root-relative
/// wrappers are accepted.
pub fn unwrap_redirect(href: &str) -> String {
    let href = href.trim();
    let parsed = if href.starts_with("//") {
        Url::parse(&format!("https:{}", href))
    } else if href.starts_with('/') {
        Url::parse(&format!("https://redirect.invalid{}", href))
    } else {
        Url::parse(href)
    };

    let Ok(url) = parsed else {
        return href.to_string();
    };

    let wrapped_key = if url.query_pairs().any(|(k, _)| k == "uddg") {
        Some("uddg")
    } else if url.path() == "/url" {
        ["q", "url"]
            .into_iter()
            .find(|key| url.query_pairs().any(|(k, _)| k == *key))
    } else {
        None
    };

    wrapped_key
        .and_then(|key| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

/// Whether `link` points at `domain` or one of its subdomains
pub fn is_platform_link(link: &str, domain: &str) -> bool {
    let Ok(url) = Url::parse(link) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let domain = domain.trim().to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Profile link among a page's links: a `/company/` link, else any platform link
pub fn select_page_link(links: &[String], domain: &str) -> Option<String> {
    let platform: Vec<&String> = links
        .iter()
        .filter(|link| is_platform_link(link, domain))
        .collect();

    platform
        .iter()
        .find(|link| link.contains(COMPANY_PATH))
        .or_else(|| platform.first())
        .map(|link| link.to_string())
}

/// Profile link among search results: `/company/` first, then `/showcase/`
pub fn select_search_link(results: &[String], domain: &str) -> Option<String> {
    let unwrapped: Vec<String> = results
        .iter()
        .map(|href| unwrap_redirect(href))
        .filter(|link| is_platform_link(link, domain))
        .collect();

    [COMPANY_PATH, SHOWCASE_PATH].into_iter().find_map(|fragment| {
        unwrapped
            .iter()
            .find(|link| link.contains(fragment))
            .cloned()
    })
}
