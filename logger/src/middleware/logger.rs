use std::{pin::Pin, sync::Arc, time::Instant};

use actix_web::{
    Error, HttpMessage, ResponseError,
    body::{BoxBody, MessageBody},
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::CONTENT_LENGTH,
    web::{self, Bytes},
};
use colored::Colorize;
use common::{env_config::Config, jwt::get_jwt_claims_or_error};
use futures::{
    StreamExt,
    future::{LocalBoxFuture, Ready, ready},
};
use log::{debug, info};
use serde_json::Value;

/// Bodies larger than this, or without a Content-Length, are not copied for debug output.
const MAX_LOGGED_BODY: usize = 64 * 1024;

pub struct LoggerMiddleware {}

impl LoggerMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for LoggerMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Arc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let query_string = req.query_string().to_string();

        let console_logging_enabled = req
            .app_data::<web::Data<Arc<Config>>>()
            .map(|config| config.console_logging_enabled)
            .unwrap_or(true);
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            // set by the extractor middleware when a bearer token was sent
            let user_id = get_jwt_claims_or_error(&req).ok().map(|c| c.user_id);

            // copy the request body so it can be logged, then hand it back
            let request_body = if console_logging_enabled
                && log::log_enabled!(log::Level::Debug)
                && body_is_loggable(&req)
            {
                let mut payload = req.take_payload();
                let body_bytes = extract_body(&mut payload).await?;
                let logged = serde_json::from_slice::<Value>(&body_bytes).unwrap_or(Value::Null);
                let stream: Pin<
                    Box<dyn futures::Stream<Item = Result<Bytes, actix_web::error::PayloadError>>>,
                > = futures::stream::once(async move {
                    Ok::<Bytes, actix_web::error::PayloadError>(body_bytes)
                })
                .boxed();
                req.set_payload(Payload::from(stream));
                logged
            } else {
                Value::Null
            };

            let res = srv.call(req).await?;

            if console_logging_enabled {
                let status_code = res.status().as_u16();
                let colored_status = match status_code {
                    200..=299 => status_code.to_string().green(),
                    300..=399 => status_code.to_string().yellow(),
                    400..=499 => status_code.to_string().bright_red(),
                    _ => status_code.to_string().red(),
                };

                let colored_method = match method.as_str() {
                    "GET" => method.blue(),
                    "POST" => method.yellow(),
                    "PUT" => method.purple(),
                    "DELETE" => method.red(),
                    _ => method.normal(),
                };

                let target = if query_string.is_empty() {
                    path
                } else {
                    format!("{}?{}", path, query_string)
                };

                info!(
                    "[{}] {} {} {} user_id={}",
                    colored_status,
                    colored_method,
                    target.bright_white(),
                    format!("({}ms)", started.elapsed().as_millis()).bright_black(),
                    user_id
                        .map_or("None".to_string(), |id| id.to_string())
                        .bright_blue(),
                );

                if request_body.as_object().is_some_and(|body| !body.is_empty()) {
                    debug!(
                        "  Request: {}",
                        serde_json::to_string(&request_body)
                            .unwrap_or_default()
                            .bright_green()
                    );
                }
            }

            Ok(res.map_into_boxed_body())
        })
    }
}

fn body_is_loggable(req: &ServiceRequest) -> bool {
    req.headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
        .is_some_and(|len| len > 0 && len <= MAX_LOGGED_BODY)
}

async fn extract_body(payload: &mut Payload) -> Result<Bytes, Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use actix_web::test;

    use super::*;

    fn with_length(len: &str) -> ServiceRequest {
        test::TestRequest::post()
            .insert_header((CONTENT_LENGTH, len))
            .to_srv_request()
    }

    #[::core::prelude::v1::test]
    fn only_small_declared_bodies_are_copied() {
        assert!(body_is_loggable(&with_length("512")));
        assert!(body_is_loggable(&with_length(&MAX_LOGGED_BODY.to_string())));
        assert!(!body_is_loggable(&with_length(&(MAX_LOGGED_BODY + 1).to_string())));
        assert!(!body_is_loggable(&with_length("0")));
        assert!(!body_is_loggable(&with_length("lots")));
        assert!(!body_is_loggable(&test::TestRequest::post().to_srv_request()));
    }
}
