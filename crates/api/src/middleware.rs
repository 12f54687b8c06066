use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use millerp_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor-id";

pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let actor_id = extract_actor(req.headers()).map_err(|msg| {
        errors::json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None)
    })?;

    req.extensions_mut().insert(ActorContext::new(actor_id));
    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<UserId, &'static str> {
    let header = headers
        .get(ACTOR_HEADER)
        .ok_or("missing X-Actor-Id header")?;

    let value = header.to_str().map_err(|_| "X-Actor-Id is not valid text")?;

    let value = value.trim();
    if value.is_empty() {
        return Err("missing X-Actor-Id header");
    }

    value.parse().map_err(|_| "X-Actor-Id must be a UUID")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn actor_header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert!(extract_actor(&headers).is_err());

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(extract_actor(&headers).is_err());

        let actor = UserId::new();
        headers.insert(ACTOR_HEADER, HeaderValue::from_str(&actor.to_string()).unwrap());
        assert_eq!(extract_actor(&headers).unwrap(), actor);
    }
}
