use salvo::http::HeaderValue;
use salvo::http::header::{HOST, LOCATION, REFERER};
use salvo::prelude::*;
use url::Url;

/// Whether `target` stays on `host` over http(s). Relative targets resolve against
/// `host` and are therefore safe.
#[must_use]
pub fn is_safe_url(host: &str, target: &str) -> bool {
    let Ok(base) = Url::parse(&format!("http://{host}/")) else {
        return false;
    };
    let Ok(resolved) = base.join(target) else {
        return false;
    };
    matches!(resolved.scheme(), "http" | "https")
        && resolved.host_str() == base.host_str()
        && resolved.port_or_known_default() == base.port_or_known_default()
}

fn request_host(req: &Request) -> String {
    req.headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_owned()))
        .unwrap_or_default()
}

/// Where "go back" should lead: `?next=`, then the referer, then the index.
#[must_use]
pub fn redirect_back_target(req: &Request) -> String {
    let host = request_host(req);
    let next = req.query::<String>("next");
    let referer = req
        .headers()
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);
    [next, referer]
        .into_iter()
        .flatten()
        .find(|target| !target.is_empty() && is_safe_url(&host, target))
        .unwrap_or_else(|| "/".to_owned())
}

/// Answers `303 See Other`. The target goes to `Location` verbatim so a
/// `#fragment` survives.
pub fn redirect(res: &mut Response, target: impl AsRef<str>) {
    let value = HeaderValue::from_str(target.as_ref()).unwrap_or_else(|_| HeaderValue::from_static("/"));
    res.status_code(StatusCode::SEE_OTHER);
    res.headers_mut().insert(LOCATION, value);
}

pub fn redirect_back(req: &Request, res: &mut Response) {
    redirect(res, redirect_back_target(req));
}

/// Keeps the last path component and replaces anything outside `[A-Za-z0-9._-]`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_owned()
}

#[cfg(test)]
mod tests {
    use salvo::test::TestClient;

    use super::*;

    #[test]
    fn test_is_safe_url() {
        let host = "127.0.0.1:5800";
        assert!(is_safe_url(host, "/admin/post/manage"));
        assert!(is_safe_url(host, "http://127.0.0.1:5800/post/1"));
        assert!(!is_safe_url(host, "http://evil.example.com/"));
        assert!(!is_safe_url(host, "//evil.example.com/path"));
        assert!(!is_safe_url(host, "javascript:alert(1)"));
        assert!(!is_safe_url(host, "http://127.0.0.1:9999/"));
    }

    #[test]
    fn test_redirect_back_prefers_next() {
        let req = TestClient::get("http://127.0.0.1:5800/auth/logout?next=/about")
            .add_header(REFERER, "http://127.0.0.1:5800/post/2", true)
            .build();
        assert_eq!(redirect_back_target(&req), "/about");
    }

    #[test]
    fn test_redirect_back_falls_back() {
        let req = TestClient::get("http://127.0.0.1:5800/change-theme/black_swan")
            .add_header(REFERER, "http://127.0.0.1:5800/post/2", true)
            .build();
        assert_eq!(redirect_back_target(&req), "http://127.0.0.1:5800/post/2");

        let req = TestClient::get("http://127.0.0.1:5800/auth/logout?next=http://evil.example.com/")
            .add_header(REFERER, "https://evil.example.com/", true)
            .build();
        assert_eq!(redirect_back_target(&req), "/");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\my cat.PNG"), "my_cat.PNG");
        assert_eq!(sanitize_filename(".hidden.gif"), "hidden.gif");
    }
}
