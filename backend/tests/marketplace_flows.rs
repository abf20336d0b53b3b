use ac_matcher::auth::SessionKeys;
use ac_matcher::config::AppConfig;
use ac_matcher::{build_router, AppState};
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: dir.path().join("test.db").to_string_lossy().into_owned(),
            app_secret: "integration-secret".to_string(),
            session_ttl_hours: 1,
            cookie_secure: false,
            db_pool_size: 2,
        };
        let state = AppState::from_config(&config).expect("app state");
        Self {
            router: build_router(state),
            _dir: dir,
        }
    }

    async fn get(&self, path: &str, session: Option<&str>) -> Response<Body> {
        let mut req = Request::get(path);
        if let Some(cookie) = session {
            req = req.header(COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, form: &str, session: Option<&str>) -> Response<Body> {
        let mut req = Request::post(path).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = session {
            req = req.header(COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(req.body(Body::from(form.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Registers an account and returns its `name=value` session cookie.
    async fn register(&self, role: &str, email: &str) -> String {
        let form = format!(
            "role={role}&name=Tester&phone=0911222333&city=Taipei&email={email}&password=pw-123456"
        );
        let resp = self.post("/register", &form, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&resp), "/");
        session_cookie(&resp)
    }
}

fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn session_cookie(resp: &Response<Body>) -> String {
    let set_cookie = resp
        .headers()
        .get(SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const JOB_FORM: &str = "service_type=cleaning&city=Taipei&district=Daan&ac_type=split&units=2&urgent=1";

#[tokio::test]
async fn registration_signs_the_user_in() {
    let app = TestApp::new();
    let cookie = app.register("owner", "amy%40example.com").await;
    assert!(cookie.starts_with("ac_session="));

    let resp = app.get("/dashboard", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains("My jobs"));
}

#[tokio::test]
async fn registration_rejects_bad_role_and_duplicate_email() {
    let app = TestApp::new();
    let resp = app
        .post(
            "/register",
            "role=admin&name=X&phone=1&email=x%40example.com&password=pw",
            None,
        )
        .await;
    assert_eq!(location(&resp), "/register?err=bad_role");

    app.register("owner", "Amy%40Example.com").await;
    let resp = app
        .post(
            "/register",
            "role=provider&name=Y&phone=2&email=amy%40example.com&password=pw",
            None,
        )
        .await;
    assert_eq!(location(&resp), "/register?err=email_exists");
    assert!(resp.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = TestApp::new();
    app.register("provider", "tech%40example.com").await;

    let resp = app
        .post("/login", "email=tech%40example.com&password=wrong", None)
        .await;
    assert_eq!(location(&resp), "/login?err=bad_login");
    assert!(resp.headers().get(SET_COOKIE).is_none());

    let resp = app
        .post("/login", "email=+TECH%40example.com+&password=pw-123456", None)
        .await;
    assert_eq!(location(&resp), "/");
    let cookie = session_cookie(&resp);
    let resp = app.get("/dashboard", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_forged_session_redirects_to_login() {
    let app = TestApp::new();
    let resp = app.get("/dashboard", None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = app.get("/dashboard", Some("ac_session=not-a-token")).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn session_for_a_missing_user_redirects_to_login() {
    let app = TestApp::new();
    app.register("owner", "o%40example.com").await;

    let token = SessionKeys::new("integration-secret", 1, false)
        .create_token(99)
        .unwrap();
    let resp = app.get("/dashboard", Some(&format!("ac_session={token}"))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn blank_units_default_to_one() {
    let app = TestApp::new();
    let owner = app.register("owner", "o%40example.com").await;

    let resp = app
        .post("/jobs/post", "service_type=cleaning&city=Taipei&units=&urgent=0", Some(&owner))
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");

    let detail = body_text(app.get("/jobs/1", None).await).await;
    assert!(detail.contains("Units: 1"));
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = TestApp::new();
    let resp = app.get("/logout", None).await;
    assert_eq!(location(&resp), "/");
    let set_cookie = resp.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn roles_gate_the_mutating_routes() {
    let app = TestApp::new();
    let owner = app.register("owner", "o%40example.com").await;
    let provider = app.register("provider", "p%40example.com").await;

    let resp = app.post("/jobs/post", JOB_FORM, Some(&provider)).await;
    assert_eq!(location(&resp), "/login");
    let resp = app.get("/jobs/post", None).await;
    assert_eq!(location(&resp), "/login");

    let resp = app
        .post("/me/portfolio/add", "image_url=https%3A%2F%2Fimg%2Fa.jpg", Some(&owner))
        .await;
    assert_eq!(location(&resp), "/login");
    let resp = app.get("/me/provider", Some(&owner)).await;
    assert_eq!(location(&resp), "/login");
}

#[tokio::test]
async fn job_lifecycle_from_posting_to_closing() {
    let app = TestApp::new();
    let owner = app.register("owner", "o%40example.com").await;
    let other_owner = app.register("owner", "o2%40example.com").await;
    let provider = app.register("provider", "p%40example.com").await;

    let resp = app.post("/jobs/post", JOB_FORM, Some(&owner)).await;
    assert_eq!(location(&resp), "/dashboard");

    let listing = body_text(app.get("/jobs", None).await).await;
    assert!(listing.contains("href=\"/jobs/1\""));

    let resp = app
        .post("/jobs/1/propose", "price=2400&available_time=Sat&warranty=90+days", Some(&provider))
        .await;
    assert_eq!(location(&resp), "/dashboard");

    // Only the owner sees quotes.
    let owner_view = body_text(app.get("/jobs/1", Some(&owner)).await).await;
    assert!(owner_view.contains("2400"));
    assert!(owner_view.contains("Quotes (1)"));
    let provider_view = body_text(app.get("/jobs/1", Some(&provider)).await).await;
    assert!(!provider_view.contains("Quotes ("));
    assert!(provider_view.contains("Send a quote"));
    let anonymous_view = body_text(app.get("/jobs/1", None).await).await;
    assert!(!anonymous_view.contains("2400"));

    // Someone else's job cannot be closed.
    let resp = app.post("/jobs/1/close", "", Some(&other_owner)).await;
    assert_eq!(location(&resp), "/jobs");
    let listing = body_text(app.get("/jobs", None).await).await;
    assert!(listing.contains("href=\"/jobs/1\""));

    let resp = app.post("/jobs/1/close", "", Some(&owner)).await;
    assert_eq!(location(&resp), "/jobs/1");
    let listing = body_text(app.get("/jobs", None).await).await;
    assert!(!listing.contains("href=\"/jobs/1\""));

    // Closed jobs take no further quotes.
    let resp = app.post("/jobs/1/propose", "price=2000", Some(&provider)).await;
    assert_eq!(location(&resp), "/jobs");
    let provider_dash = body_text(app.get("/dashboard", Some(&provider)).await).await;
    assert_eq!(provider_dash.matches("<strong>2400</strong>").count(), 1);
    assert!(!provider_dash.contains("<strong>2000</strong>"));
}

#[tokio::test]
async fn unknown_job_redirects_to_listing() {
    let app = TestApp::new();
    let resp = app.get("/jobs/99", None).await;
    assert_eq!(location(&resp), "/jobs");
}

#[tokio::test]
async fn portfolio_holds_at_most_six_items() {
    let app = TestApp::new();
    let provider = app.register("provider", "p%40example.com").await;

    let resp = app
        .post("/me/portfolio/add", "image_url=javascript%3Aalert(1)", Some(&provider))
        .await;
    assert_eq!(location(&resp), "/me/portfolio?err=bad_url");

    for i in 0..6 {
        let form = format!("image_url=https%3A%2F%2Fimg.example.com%2F{i}.jpg&caption=job+{i}");
        let resp = app.post("/me/portfolio/add", &form, Some(&provider)).await;
        assert_eq!(location(&resp), "/me/portfolio?added=1");
    }
    let resp = app
        .post("/me/portfolio/add", "image_url=https%3A%2F%2Fimg.example.com%2F7.jpg", Some(&provider))
        .await;
    assert_eq!(location(&resp), "/me/portfolio?err=max6");

    let page = body_text(app.get("/me/portfolio", Some(&provider)).await).await;
    assert!(page.contains("(6/6)"));
    assert!(!page.contains("action=\"/me/portfolio/add\""));
}

#[tokio::test]
async fn portfolio_items_are_deleted_only_by_their_owner() {
    let app = TestApp::new();
    let alice = app.register("provider", "alice%40example.com").await;
    let bob = app.register("provider", "bob%40example.com").await;

    app.post("/me/portfolio/add", "image_url=https%3A%2F%2Fimg%2Falice.jpg", Some(&alice))
        .await;

    let resp = app.post("/me/portfolio/1/delete", "", Some(&bob)).await;
    assert_eq!(location(&resp), "/me/portfolio?deleted=1");
    let page = body_text(app.get("/me/portfolio", Some(&alice)).await).await;
    assert!(page.contains("(1/6)"));

    app.post("/me/portfolio/1/delete", "", Some(&alice)).await;
    let page = body_text(app.get("/me/portfolio", Some(&alice)).await).await;
    assert!(page.contains("(0/6)"));
}

#[tokio::test]
async fn provider_profile_is_public() {
    let app = TestApp::new();
    app.register("owner", "o%40example.com").await;
    let provider = app.register("provider", "p%40example.com").await;

    let resp = app
        .post(
            "/me/provider",
            "display_name=Cool+Air+Wu&shop_name=Wu+HVAC&specialties=cleaning%E3%80%81repair%2Ccleaning",
            Some(&provider),
        )
        .await;
    assert_eq!(location(&resp), "/me/provider?saved=1");

    let edit = body_text(app.get("/me/provider?saved=1", Some(&provider)).await).await;
    assert!(edit.contains("Profile saved."));
    assert!(edit.contains("value=\"cleaning,repair\""));

    let public = body_text(app.get("/providers/2", None).await).await;
    assert!(public.contains("Cool Air Wu"));
    assert!(public.contains("Identity verified"));

    // Owners have no public provider page.
    let resp = app.get("/providers/1", None).await;
    assert_eq!(location(&resp), "/jobs");
}
