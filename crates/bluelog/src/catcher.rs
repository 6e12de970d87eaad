//! HTML error pages.

use salvo::http::ResBody;
use salvo::prelude::*;
use salvo::writing::Text;
use tera::Context;

use crate::routes::CsrfCheck;
use crate::state::app_state;

const CSRF_DESCRIPTION: &str = "The CSRF token is missing or invalid.";

/// Maps a failed response to the error template that should render it. A 403 from
/// the CSRF guard is reported as a bad request.
fn page_for(code: StatusCode, csrf_rejected: bool) -> Option<(StatusCode, &'static str, Option<&'static str>)> {
    match code {
        StatusCode::FORBIDDEN if csrf_rejected => {
            Some((StatusCode::BAD_REQUEST, "errors/400.html", Some(CSRF_DESCRIPTION)))
        }
        StatusCode::FORBIDDEN => Some((code, "errors/403.html", None)),
        StatusCode::BAD_REQUEST => Some((code, "errors/400.html", None)),
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => Some((code, "errors/404.html", None)),
        code if code.is_server_error() => Some((code, "errors/500.html", None)),
        _ => None,
    }
}

/// Catcher hoop rendering `templates/errors/*`. Anything it can not render falls
/// through to salvo's default page.
#[handler]
pub async fn error_page(depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
    let csrf_rejected = depot.obtain::<CsrfCheck>().is_ok_and(|check| *check == CsrfCheck::Pending);
    let Some((status, template, description)) = res.status_code.and_then(|code| page_for(code, csrf_rejected))
    else {
        return;
    };
    let Ok(state) = app_state(depot) else {
        return;
    };
    let mut ctx = Context::new();
    ctx.insert("code", &status.as_u16());
    ctx.insert("description", &description);
    match state.templates.render(template, &ctx) {
        Ok(html) => {
            res.replace_body(ResBody::None);
            res.status_code(status);
            res.render(Text::Html(html));
            ctrl.skip_rest();
        }
        Err(e) => tracing::error!(error = %e, template, "failed to render error page"),
    }
}

#[cfg(test)]
mod tests {
    use salvo::affix_state;
    use salvo::catcher::Catcher;
    use salvo::test::{ResponseExt, TestClient};

    use super::*;
    use crate::config::Config;
    use crate::routes;
    use crate::testing::TestApp;

    #[test]
    fn test_page_for() {
        let (status, template, description) = page_for(StatusCode::FORBIDDEN, true).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(template, "errors/400.html");
        assert_eq!(description, Some(CSRF_DESCRIPTION));

        let (status, template, description) = page_for(StatusCode::FORBIDDEN, false).unwrap();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(template, "errors/403.html");
        assert_eq!(description, None);

        assert_eq!(page_for(StatusCode::NOT_FOUND, false).unwrap().1, "errors/404.html");
        assert_eq!(page_for(StatusCode::BAD_GATEWAY, false).unwrap().1, "errors/500.html");
        assert!(page_for(StatusCode::UNAUTHORIZED, false).is_none());
    }

    #[handler]
    async fn forbidden(res: &mut Response) {
        res.status_code(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_plain_forbidden_is_not_blamed_on_csrf() {
        let mut config = Config::testing();
        config.csrf_enabled = true;
        let app = TestApp::with_config(config).await;
        let router = routes::router(&app.state.config)
            .unwrap()
            .push(Router::with_path("forbidden").get(forbidden));
        let service = Service::new(router)
            .hoop(affix_state::inject(app.state.clone()))
            .catcher(Catcher::default().hoop(error_page));

        let mut res = TestClient::get(app.url("/forbidden")).send(&service).await;
        assert_eq!(res.status_code, Some(StatusCode::FORBIDDEN));
        let body = res.take_string().await.unwrap();
        assert!(body.contains("Forbidden"));
        assert!(!body.contains(CSRF_DESCRIPTION));

        let mut res = TestClient::post(app.url("/auth/login"))
            .raw_form("username=admin&password=helloflask")
            .send(&service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
        let body = res.take_string().await.unwrap();
        assert!(body.contains(CSRF_DESCRIPTION));
    }
}
