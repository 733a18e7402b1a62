use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::{error::AppError, jwt::get_jwt_claims_or_error};
use futures::future::{Ready, ok};

/// Requires the claims left by the extractor middleware, carrying `required_role`.
/// On success the claims are available to handlers as `web::ReqData<JwtClaims>`.
pub struct AuthMiddleware {
    required_role: Rc<String>,
}

impl AuthMiddleware {
    pub fn new(required_role: impl Into<String>) -> Self {
        AuthMiddleware {
            required_role: Rc::new(required_role.into()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Arc::new(service),
            required_role: self.required_role.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    required_role: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = match get_jwt_claims_or_error(&req) {
            Ok(claims) => claims,
            Err(response) => {
                return Box::pin(async move { Ok(req.into_response(response)) });
            }
        };

        if claims.role != *self.required_role {
            log::warn!(
                "User {} with role {} denied on {}",
                claims.user_id,
                claims.role,
                req.path()
            );
            let response = AppError::Forbidden(format!("{} role required", self.required_role))
                .to_http_response();
            return Box::pin(async move { Ok(req.into_response(response)) });
        }

        // expose claims to handlers through ReqData
        req.extensions_mut().insert(claims);
        let srv = Arc::clone(&self.service);
        Box::pin(async move { srv.call(req).await.map(|res| res.map_into_boxed_body()) })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{
        dev::{Service, Transform},
        http::StatusCode,
        test,
    };
    use common::{
        error::Res,
        jwt::{ADMIN_ROLE, JwtClaims},
    };
    use uuid::Uuid;

    use super::*;

    fn claims(role: &str) -> JwtClaims {
        JwtClaims {
            user_id: Uuid::new_v4(),
            role: role.to_string(),
            exp: usize::MAX,
        }
    }

    async fn status_for(middleware: AuthMiddleware, claims: Option<Res<JwtClaims>>) -> StatusCode {
        let srv = middleware
            .new_transform(test::ok_service())
            .await
            .unwrap();
        let req = test::TestRequest::default().to_srv_request();
        if let Some(claims) = claims {
            req.extensions_mut().insert(claims);
        }
        srv.call(req).await.unwrap().status()
    }

    #[actix_web::test]
    async fn missing_or_invalid_token_is_unauthorized() {
        assert_eq!(
            status_for(AuthMiddleware::new(ADMIN_ROLE), None).await,
            StatusCode::UNAUTHORIZED
        );
        let invalid = Err(AppError::Unauthorized("Invalid token".to_string()));
        assert_eq!(
            status_for(AuthMiddleware::new(ADMIN_ROLE), Some(invalid)).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn role_mismatch_is_forbidden() {
        let admin_only = AuthMiddleware::new(ADMIN_ROLE);
        assert_eq!(
            status_for(admin_only, Some(Ok(claims("manager")))).await,
            StatusCode::FORBIDDEN
        );
    }

    #[actix_web::test]
    async fn matching_role_passes_through() {
        let admin_only = AuthMiddleware::new(ADMIN_ROLE);
        assert_eq!(
            status_for(admin_only, Some(Ok(claims(ADMIN_ROLE)))).await,
            StatusCode::OK
        );
        let managers = AuthMiddleware::new("manager");
        assert_eq!(
            status_for(managers, Some(Ok(claims("manager")))).await,
            StatusCode::OK
        );
    }
}
