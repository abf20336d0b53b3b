use axum::response::Html;
use serde::Deserialize;
use tera::{Context, Tera};

use crate::error::AppError;
use crate::models::User;

/// Outcome flags that redirects carry back to a page in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct Flash {
    pub err: Option<String>,
    pub saved: Option<String>,
    pub added: Option<String>,
    pub deleted: Option<String>,
}

impl Flash {
    /// Inserts every flag so templates can compare them without tripping
    /// over undefined variables.
    pub fn insert_into(&self, context: &mut Context) {
        context.insert("err", &self.err);
        context.insert("saved", &self.saved.is_some());
        context.insert("added", &self.added.is_some());
        context.insert("deleted", &self.deleted.is_some());
    }
}

/// Context shared by every page: the signed-in user drives the nav bar.
pub fn page_context(user: Option<&User>) -> Context {
    let mut context = Context::new();
    context.insert("user", &user);
    context
}

/// Page templates, embedded at compile time. Names end in `.html` so Tera
/// autoescapes every interpolation.
const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("home.html", include_str!("../templates/home.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("jobs.html", include_str!("../templates/jobs.html")),
    ("job_detail.html", include_str!("../templates/job_detail.html")),
    ("post_job.html", include_str!("../templates/post_job.html")),
    ("owner_dashboard.html", include_str!("../templates/owner_dashboard.html")),
    ("provider_dashboard.html", include_str!("../templates/provider_dashboard.html")),
    ("provider_profile.html", include_str!("../templates/provider_profile.html")),
    ("me_provider.html", include_str!("../templates/me_provider.html")),
    ("me_portfolio.html", include_str!("../templates/me_portfolio.html")),
];

#[derive(Debug)]
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, AppError> {
        let mut tera = Tera::default();
        // Registered together so `{% extends %}` resolves regardless of order.
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<Html<String>, AppError> {
        Ok(Html(self.tera.render(template, context)?))
    }
}
