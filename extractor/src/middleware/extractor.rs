use std::{future::Future, pin::Pin, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web,
};
use futures::future::{Ready, ok};

use common::{
    env_config::Config,
    error::{AppError, Res},
    jwt::{self, JwtClaims},
};

/// Parses `Authorization: Bearer <token>` and stores the outcome as
/// `Res<JwtClaims>` in the request extensions. Requests without a bearer
/// token pass through untouched; enforcement is left to the auth middleware.
pub struct ExtractionMiddleware {}

impl ExtractionMiddleware {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for ExtractionMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for ExtractionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ExtractionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ExtractionMiddlewareService {
            service: Arc::new(service),
        })
    }
}

pub struct ExtractionMiddlewareService<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for ExtractionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_owned());

        if let Some(token) = token {
            let claims_res = match req.app_data::<web::Data<Arc<Config>>>() {
                Some(config) => jwt::validate_jwt(&token, &config.jwt_config.secret),
                None => Err(AppError::Internal(
                    "JWT configuration is not registered".to_string(),
                )),
            };
            if let Err(err) = &claims_res {
                log::debug!("Rejected bearer token on {}: {}", req.path(), err);
            }
            req.extensions_mut().insert::<Res<JwtClaims>>(claims_res);
        }

        let srv = Arc::clone(&self.service);
        Box::pin(async move { srv.call(req).await.map(|res| res.map_into_boxed_body()) })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use common::{
        env_config::JwtConfig,
        jwt::{ClaimsSpec, generate_jwt},
    };
    use uuid::Uuid;

    use super::*;

    fn config() -> Arc<Config> {
        Arc::new(Config {
            environment: "test".to_string(),
            database_url: None,
            jwt_config: JwtConfig {
                secret: "extractor-secret".to_string(),
                expiration_hours: 1,
            },
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            num_workers: 1,
            cors_allowed_origin: "http://localhost:3000".to_string(),
            console_logging_enabled: false,
            log_level: log::LevelFilter::Off,
            log_file: None,
            default_page_size: 10,
            max_page_size: 100,
        })
    }

    async fn extract(authorization: Option<&str>) -> Option<Result<Uuid, String>> {
        let srv = ExtractionMiddleware::new()
            .new_transform(test::ok_service())
            .await
            .unwrap();
        let mut req = test::TestRequest::default().app_data(web::Data::new(config()));
        if let Some(value) = authorization {
            req = req.insert_header(("Authorization", value));
        }
        let res = srv.call(req.to_srv_request()).await.unwrap();
        let extracted = res
            .request()
            .extensions()
            .get::<Res<JwtClaims>>()
            .map(|claims| claims.as_ref().map(|c| c.user_id).map_err(|e| e.to_string()));
        extracted
    }

    #[actix_web::test]
    async fn valid_bearer_token_yields_claims() {
        let user_id = Uuid::new_v4();
        let token = generate_jwt(
            ClaimsSpec {
                user_id,
                role: "admin".to_string(),
            },
            &config().jwt_config,
        )
        .unwrap();

        let claims = extract(Some(&format!("Bearer {}", token))).await;
        assert_eq!(claims, Some(Ok(user_id)));
    }

    #[actix_web::test]
    async fn garbage_token_is_recorded_as_error() {
        let claims = extract(Some("Bearer not-a-jwt")).await;
        assert!(matches!(claims, Some(Err(_))));
    }

    #[actix_web::test]
    async fn requests_without_bearer_are_left_alone() {
        assert!(extract(None).await.is_none());
        assert!(extract(Some("Basic dXNlcjpwYXNz")).await.is_none());
    }
}
