use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use server::config::Config;
use server::handlers;
use server::server::RoomDirectory;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let directory = RoomDirectory::new(
        config.storage(),
        config.hibernate_after(),
        config.default_room.clone(),
    );
    if let Some(idle) = config.hibernate_after() {
        let directory = directory.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::delay_for(idle).await;
                directory.evict_idle();
            }
        });
    }
    if config.in_memory {
        log::info!("Listening on {}, squares kept in memory", config.bind);
    } else {
        log::info!(
            "Listening on {}, squares stored under {}",
            config.bind,
            config.data_dir.display()
        );
    }

    let allowed_origin = config.allowed_origin.clone();
    HttpServer::new(move || {
        let cors = match &allowed_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header(),
            None => Cors::permissive(),
        };
        App::new()
            .wrap(cors)
            .data(directory.clone())
            .configure(handlers::root)
            .default_service(web::route().to(handlers::bad_request))
    })
    .bind(&config.bind)?
    .run()
    .await
}
