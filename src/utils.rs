use actix_web::http::header::LOCATION;
use actix_web::HttpResponse;
use actix_web_flash_messages::IncomingFlashMessages;
use serde_json::json;

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((LOCATION, location))
        .finish()
}

/// Wraps a view in the `{"status": "success", ...}` envelope together with any
/// flash messages left by the previous redirect.
pub fn json_page(flash_messages: IncomingFlashMessages, data: serde_json::Value) -> HttpResponse {
    let messages: Vec<_> = flash_messages
        .iter()
        .map(|m| {
            json!({
                "level": format!("{:?}", m.level()).to_lowercase(),
                "content": m.content(),
            })
        })
        .collect();
    HttpResponse::Ok().json(json!({
        "status": "success",
        "messages": messages,
        "data": data,
    }))
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
