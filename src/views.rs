use actix_web::http::header;
use actix_web::HttpResponse;
use handlebars::Handlebars;
use serde::Serialize;

use crate::errors::UserError;

pub type Templates = Handlebars<'static>;

pub fn load_templates() -> Result<Templates, handlebars::TemplateError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_templates_directory(
        ".hbs",
        concat!(env!("CARGO_MANIFEST_DIR"), "/templates"),
    )?;
    Ok(handlebars)
}

pub fn render<T: Serialize>(hb: &Templates, name: &str, data: &T) -> Result<HttpResponse, UserError> {
    render_with(HttpResponse::Ok(), hb, name, data)
}

pub fn render_with<T: Serialize>(
    mut builder: actix_web::HttpResponseBuilder,
    hb: &Templates,
    name: &str,
    data: &T,
) -> Result<HttpResponse, UserError> {
    let body = hb.render(name, data).map_err(|e| {
        error!("Failed to render template {}: {}", name, e);
        UserError::UnexpectedError
    })?;

    Ok(builder.content_type(header::ContentType::html()).body(body))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

pub fn cat_detail_url(cat_id: i32) -> String {
    format!("/cats/{}/", cat_id)
}

pub fn toy_detail_url(toy_id: i32) -> String {
    format!("/toys/{}/", toy_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_page_template_is_registered() {
        let hb = load_templates().unwrap();
        for name in [
            "home",
            "about",
            "cats/index",
            "cats/detail",
            "cats/form",
            "cats/confirm_delete",
            "toys/index",
            "toys/detail",
            "toys/form",
            "toys/confirm_delete",
            "registration/signup",
            "registration/login",
        ] {
            assert!(hb.has_template(name), "missing template {}", name);
        }
    }

    #[test]
    fn redirects_use_found() {
        let response = redirect(&cat_detail_url(3));
        assert_eq!(response.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/cats/3/"
        );
    }

    #[test]
    fn toy_page_renders_fields() {
        let hb = load_templates().unwrap();
        let html = hb
            .render(
                "toys/detail",
                &json!({ "user": null, "toy": { "id": 1, "name": "Mouse", "color": "grey" } }),
            )
            .unwrap();
        assert!(html.contains("Mouse"));
        assert!(html.contains("grey"));
    }
}
