#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{env, sync::Arc};

use actix_cors::Cors;
use actix_web::{App, http, middleware, web};
use booxclash_config::ServerConfig;
use booxclash_game::{GameRooms, GameTimings};
use booxclash_questions::QuestionBank;
use booxclash_rooms::{InMemoryRoomStore, RoomStore};
use booxclash_server::{
    api::health_endpoint,
    ws::{self, server::WsServer},
};
use tokio::try_join;

fn main() -> Result<(), std::io::Error> {
    let config = ServerConfig::from_env().expect("Invalid server configuration");

    let config = {
        let args: Vec<String> = env::args().collect();

        if args.len() > 1 {
            config.with_port(args[1].parse::<u16>().expect("Invalid port argument"))
        } else {
            config
        }
    };

    booxclash_logging::init().expect("Failed to initialize logging");

    actix_web::rt::System::with_tokio_rt(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build tokio runtime")
    })
    .block_on(async move {
        let bank = Arc::new(
            QuestionBank::load(&config.questions_path).expect("Failed to load question bank"),
        );
        let room_store: Arc<dyn RoomStore> = Arc::new(InMemoryRoomStore::default());

        let game = GameRooms::new(bank.clone(), GameTimings::from(&config));
        let (ws_server, ws_server_handle) = WsServer::new(game, room_store.clone());
        let ws_service = tokio::spawn(ws_server.run());

        let bank_data = web::Data::from(bank);
        let room_store_data = web::Data::from(room_store);
        let ws_server_data = web::Data::new(ws_server_handle.clone());
        let allowed_origins = config.allowed_origins.clone();

        let app = move || {
            let cors = allowed_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
                .allowed_methods(vec!["GET", "POST", "OPTIONS", "DELETE", "PUT"])
                .allowed_headers(vec![
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                    http::header::CONTENT_TYPE,
                ])
                .supports_credentials()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .wrap(middleware::Logger::default())
                .wrap(middleware::Compress::default())
                .app_data(bank_data.clone())
                .app_data(room_store_data.clone())
                .app_data(ws_server_data.clone())
                .service(health_endpoint)
                .service(ws::api::websocket)
                .service(booxclash_rooms::api::bind_services(web::scope(
                    "/api/rooms",
                )))
                .service(booxclash_questions::api::bind_services(web::scope(
                    "/api/questions",
                )))
        };

        let mut http_server = actix_web::HttpServer::new(app);

        if let Some(workers) = config.workers {
            log::debug!("Running with {workers} Actix workers");
            http_server = http_server.workers(workers);
        }

        log::info!(
            "Listening on {}:{} with {} allowed origins",
            config.bind_addr,
            config.port,
            config.allowed_origins.len()
        );

        let http_server = http_server
            .bind((config.bind_addr.clone(), config.port))?
            .run();

        if let Err(err) = try_join!(
            async move {
                let resp = http_server.await;

                log::debug!("Shutting down ws server...");
                ws_server_handle.shutdown();

                resp
            },
            async move {
                ws_service.await.map_err(std::io::Error::other)?;
                log::debug!("WsServer connection closed");
                Ok::<_, std::io::Error>(())
            },
        ) {
            log::error!("Error on shutdown: {err:?}");
            return Err(err);
        }

        log::debug!("Server shut down");

        Ok(())
    })
}
