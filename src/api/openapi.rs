use super::handlers::{auth, diagnostics, health};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes added outside (`OPTIONS /health`, static pages) are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::signup::signup))
        .routes(routes!(auth::password::forgot_password))
        .routes(routes!(auth::password::reset_password))
        .routes(routes!(auth::session::session))
        .routes(routes!(auth::session::logout))
        .routes(routes!(diagnostics::debug_report))
        .routes(routes!(diagnostics::test_ping, diagnostics::test_echo));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Sign-up, sign-in, password recovery and session cookies".to_string());

    let mut diagnostics_tag = Tag::new("diagnostics");
    diagnostics_tag.description = Some("Deployment checks".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, diagnostics_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `:` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        (!value.is_empty()).then_some(value)
    }

    match author.find('<') {
        Some(start) => (
            non_empty(author[..start].trim()),
            non_empty(author[start + 1..].trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert_eq!(
            contact.as_ref().and_then(|c| c.name.as_deref()),
            Some("Onboarding Team")
        );
        assert_eq!(
            contact.as_ref().and_then(|c| c.email.as_deref()),
            Some("onboarding@payments.dev")
        );
        assert_eq!(
            doc.info.license.map(|license| license.name),
            Some("BSD-3-Clause".to_string())
        );
    }

    #[test]
    fn every_endpoint_is_documented() {
        let doc = openapi();
        for path in [
            "/health",
            "/api/login",
            "/api/signup",
            "/api/forgot-password",
            "/api/reset-password",
            "/api/session",
            "/api/logout",
            "/api/debug",
            "/api/test",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let test_path = &doc.paths.paths["/api/test"];
        assert!(test_path.get.is_some());
        assert!(test_path.post.is_some());
    }

    #[test]
    fn author_parsing() {
        assert_eq!(
            parse_author("Ana <ana@example.com>"),
            (Some("Ana"), Some("ana@example.com"))
        );
        assert_eq!(parse_author("Ana"), (Some("Ana"), None));
        assert_eq!(parse_author("<ana@example.com>"), (None, Some("ana@example.com")));
    }
}
