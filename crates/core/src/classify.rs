//! Resource classification.
//!
//! Pure, total function mapping a request to the class that picks its
//! caching strategy. No network or store access; trivially unit-testable.

use serde::{Deserialize, Serialize};

use crate::resource::{Destination, ResourceRequest};

/// Derived request category; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    Document,
    Image,
    ExternalLibrary,
    Other,
}

/// Path extensions treated as images when no destination is declared.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif", "bmp"];

/// Classify a request. First match wins; anything ambiguous lands on
/// `Other`, never an error.
///
/// `external_hosts` is the configured allowlist of third-party library
/// hosts (plus the hosts of the manifest's external URLs).
pub fn classify(request: &ResourceRequest, external_hosts: &[String]) -> ResourceClass {
    if request.destination == Some(Destination::Document)
        || request.navigation
        || accepts_markup(request.accept.as_deref())
    {
        return ResourceClass::Document;
    }

    if request.destination == Some(Destination::Image) || has_image_extension(&request.url) {
        return ResourceClass::Image;
    }

    if let Ok(url) = url::Url::parse(&request.url)
        && let Some(host) = url.host_str()
        && external_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    {
        return ResourceClass::ExternalLibrary;
    }

    ResourceClass::Other
}

fn accepts_markup(accept: Option<&str>) -> bool {
    accept.is_some_and(|a| a.contains("text/html"))
}

fn has_image_extension(url: &str) -> bool {
    // Extension check runs on the path only, never the query string.
    let path = url::Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Method;

    fn hosts() -> Vec<String> {
        vec!["cdn.jsdelivr.net".to_string(), "cdnjs.cloudflare.com".to_string()]
    }

    #[test]
    fn test_document_by_destination() {
        let mut req = ResourceRequest::get("https://app.example/page");
        req.destination = Some(Destination::Document);
        assert_eq!(classify(&req, &hosts()), ResourceClass::Document);
    }

    #[test]
    fn test_document_by_accept_header() {
        let mut req = ResourceRequest::get("https://app.example/page");
        req.accept = Some("text/html,application/xhtml+xml".to_string());
        assert_eq!(classify(&req, &hosts()), ResourceClass::Document);
    }

    #[test]
    fn test_document_by_navigation_flag() {
        let mut req = ResourceRequest::get("https://app.example/");
        req.navigation = true;
        assert_eq!(classify(&req, &hosts()), ResourceClass::Document);
    }

    #[test]
    fn test_image_by_extension() {
        let req = ResourceRequest::get("https://app.example/logo.PNG");
        assert_eq!(classify(&req, &hosts()), ResourceClass::Image);
    }

    #[test]
    fn test_image_extension_ignores_query() {
        let req = ResourceRequest::get("https://app.example/data?file=a.png");
        assert_eq!(classify(&req, &hosts()), ResourceClass::Other);
    }

    #[test]
    fn test_external_library_host() {
        let req = ResourceRequest::get("https://cdn.jsdelivr.net/npm/chart.js/dist/chart.umd.min.js");
        assert_eq!(classify(&req, &hosts()), ResourceClass::ExternalLibrary);
    }

    #[test]
    fn test_document_wins_over_image_extension() {
        let mut req = ResourceRequest::get("https://app.example/preview.png");
        req.navigation = true;
        assert_eq!(classify(&req, &hosts()), ResourceClass::Document);
    }

    #[test]
    fn test_fallthrough_to_other() {
        let mut req = ResourceRequest::get("https://app.example/api/data");
        req.method = Method::Get;
        assert_eq!(classify(&req, &hosts()), ResourceClass::Other);
    }

    #[test]
    fn test_deterministic() {
        let req = ResourceRequest::get("https://app.example/styles.css");
        assert_eq!(classify(&req, &hosts()), classify(&req, &hosts()));
    }
}
