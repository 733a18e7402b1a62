mod cors;

use std::{io, sync::Arc};

use actix_web::{
    App, HttpServer,
    web::{self},
};
use common::{
    env_config::Config,
    http::{json_config, path_config, query_config},
};
use db::{MemorySubscriptionStore, PgSubscriptionStore, Store};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // get env vars
    let config = Config::from_env().map_err(io::Error::other)?;
    let config_data = config.clone();
    let origin = config.cors_allowed_origin.clone();

    // init logger
    if config.console_logging_enabled {
        logger::setup(config.log_level, config.log_file.as_deref()).map_err(io::Error::other)?;
    }

    // pick the store
    let store: Store = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::setup(url, config.is_production())
                .await
                .map_err(|e| io::Error::other(e.to_string()))?;
            log::info!("Using Postgres subscription store");
            Arc::new(PgSubscriptionStore::new(pool))
        }
        None => {
            log::warn!("DATABASE_URL is not set, subscriptions are kept in memory only");
            Arc::new(MemorySubscriptionStore::new())
        }
    };

    log::info!(
        "Listening on {}:{} ({} workers)",
        config.server_host,
        config.server_port,
        config.num_workers
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(config_data.clone()))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .wrap(logger::middleware()) // 3rd
            .wrap(extractor::middleware()) // 2nd
            .wrap(cors::middleware(&origin)) // 1st
            .service(
                web::scope("/api")
                    .service(api_subs::mount_subscriptions())
                    .service(api_admin::mount_admin()),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
