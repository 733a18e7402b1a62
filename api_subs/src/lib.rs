use actix_web::web::{self};

pub mod routes {
    pub mod sub;
}

pub mod services {
    pub mod effects;
    pub mod lifecycle;
    pub mod sub;
}

pub mod dtos {
    pub mod sub;
}

pub mod models {
    pub mod plan;
}

/// Self-service signup routes. `/plans` is registered before `/{uuid}`.
pub fn mount_subscriptions() -> actix_web::Scope {
    web::scope("/subscriptions")
        .service(routes::sub::get_plans)
        .service(routes::sub::post_subscription)
        .service(routes::sub::get_subscription)
        .service(routes::sub::put_plan)
        .service(routes::sub::put_payment)
        .service(routes::sub::put_payment_confirm)
        .service(routes::sub::put_payment_fail)
        .service(routes::sub::put_cancel)
}
