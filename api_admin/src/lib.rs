use actix_web::web::{self};

pub mod routes {
    pub mod admin;
}

pub mod services {
    pub mod admin;
}

pub mod dtos {
    pub mod admin;
}

/// Back-office routes, admin role only. Fixed segments are registered before `/{uuid}`.
pub fn mount_admin() -> actix_web::Scope<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<actix_web::body::BoxBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    web::scope("/admin/subscriptions")
        .wrap(api_auth::admin_middleware())
        .service(routes::admin::get_subscriptions)
        .service(routes::admin::get_stats)
        .service(routes::admin::post_expire)
        .service(routes::admin::get_subscription)
        .service(routes::admin::put_approve)
        .service(routes::admin::put_reject)
        .service(routes::admin::put_suspend)
        .service(routes::admin::put_subscription)
}
