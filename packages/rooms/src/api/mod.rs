//! HTTP API for registered rooms.
//!
//! # Endpoints
//!
//! * `POST /create` - Register a room
//! * `GET /{roomId}` - Fetch a room
//! * `POST /{roomId}/join` - Register a player in a room
//! * `GET /{roomId}/players` - List registered players
//!
//! The store is read from `web::Data<dyn RoomStore>`.

use actix_web::{
    HttpResponse, Result, Scope,
    dev::{ServiceFactory, ServiceRequest},
    error::InternalError,
    http::StatusCode,
    route,
    web::{self, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    JoinOutcome, RegisteredPlayer, Room, RoomError, RoomStore,
    models::{CreateRoom, JoinRoomRequest},
};

#[must_use]
pub fn bind_services<
    T: ServiceFactory<ServiceRequest, Config = (), Error = actix_web::Error, InitError = ()>,
>(
    scope: Scope<T>,
) -> Scope<T> {
    scope
        .service(create_room_endpoint)
        .service(get_room_endpoint)
        .service(join_room_endpoint)
        .service(get_players_endpoint)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreatedRoom {
    pub room_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlayers {
    pub players: Vec<RegisteredPlayer>,
}

impl From<RoomError> for actix_web::Error {
    fn from(err: RoomError) -> Self {
        let (status, message) = match &err {
            RoomError::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "Room already exists."),
            RoomError::NotFound(_) => (StatusCode::NOT_FOUND, "Room not found."),
            RoomError::Full(_) => (StatusCode::BAD_REQUEST, "Room is full."),
            RoomError::MissingFields => (StatusCode::BAD_REQUEST, "All fields are required."),
            RoomError::InvalidCapacity => (
                StatusCode::BAD_REQUEST,
                "Room must allow at least one player.",
            ),
            RoomError::CodeExhausted => (StatusCode::INTERNAL_SERVER_ERROR, "Server error"),
        };

        if status.is_server_error() {
            log::error!("Room request failed: {err:?}");
        } else {
            log::debug!("Room request rejected: {err}");
        }

        InternalError::from_response(
            err.to_string(),
            HttpResponse::build(status).json(ApiMessage {
                message: message.to_string(),
            }),
        )
        .into()
    }
}

/// # Errors
///
/// * If the request is missing fields or the room id is taken
#[route("/create", method = "POST")]
pub async fn create_room_endpoint(
    body: Json<CreateRoom>,
    store: web::Data<dyn RoomStore>,
) -> Result<HttpResponse> {
    let room = crate::create_room(&**store, body.into_inner(), &mut rand::rng()).await?;

    Ok(HttpResponse::Created().json(ApiCreatedRoom {
        room_id: room.room_id,
    }))
}

/// # Errors
///
/// * If the room does not exist
#[route("/{roomId}", method = "GET")]
pub async fn get_room_endpoint(
    path: web::Path<String>,
    store: web::Data<dyn RoomStore>,
) -> Result<Json<Room>> {
    Ok(Json(crate::get_room(&**store, &path).await?))
}

/// # Errors
///
/// * If the name or country is missing
/// * If the room does not exist or is full
#[route("/{roomId}/join", method = "POST")]
pub async fn join_room_endpoint(
    path: web::Path<String>,
    body: Json<JoinRoomRequest>,
    store: web::Data<dyn RoomStore>,
) -> Result<Json<ApiMessage>> {
    let message = match crate::join_room(&**store, &path, &body.name, &body.country).await? {
        JoinOutcome::Joined => "Joined the room successfully.",
        JoinOutcome::AlreadyJoined => "Player already in room.",
    };

    Ok(Json(ApiMessage {
        message: message.to_string(),
    }))
}

/// # Errors
///
/// * If the room does not exist
#[route("/{roomId}/players", method = "GET")]
pub async fn get_players_endpoint(
    path: web::Path<String>,
    store: web::Data<dyn RoomStore>,
) -> Result<Json<ApiPlayers>> {
    Ok(Json(ApiPlayers {
        players: crate::get_players(&**store, &path).await?,
    }))
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use actix_web::{App, test};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::InMemoryRoomStore;

    fn store() -> web::Data<dyn RoomStore> {
        let store: Arc<dyn RoomStore> = Arc::new(InMemoryRoomStore::default());
        web::Data::from(store)
    }

    macro_rules! app {
        ($store:expr) => {
            test::init_service(
                App::new()
                    .app_data($store.clone())
                    .service(bind_services(web::scope("/api/rooms"))),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn create_then_get_room() {
        let store = store();
        let app = app!(store);

        let req = test::TestRequest::post()
            .uri("/api/rooms/create")
            .set_json(json!({
                "roomId": "abc123",
                "subject": "math",
                "numPlayers": 3,
                "hostName": "Ms. Banda",
                "hostCountry": "Zambia",
                "hostIsPlayer": true,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "roomId": "ABC123" }));

        let req = test::TestRequest::get().uri("/api/rooms/ABC123").to_request();
        let room: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(room["subject"], "math");
        assert_eq!(room["numPlayers"], 3);
        assert_eq!(
            room["players"],
            json!([{ "name": "Ms. Banda", "country": "Zambia" }])
        );
    }

    #[actix_web::test]
    async fn create_room_twice_is_bad_request() {
        let store = store();
        let app = app!(store);
        let body = json!({
            "roomId": "ROOM1",
            "subject": "math",
            "numPlayers": 3,
            "hostName": "Ms. Banda",
            "hostCountry": "Zambia",
        });

        let req = test::TestRequest::post()
            .uri("/api/rooms/create")
            .set_json(&body)
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/api/rooms/create")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Room already exists.");
    }

    #[actix_web::test]
    async fn join_room_reports_outcomes() {
        let store = store();
        crate::create_room(
            &**store,
            CreateRoom {
                room_id: Some("ROOM1".to_string()),
                subject: "math".to_string(),
                num_players: 2,
                host_name: "Ms. Banda".to_string(),
                host_country: "Zambia".to_string(),
                host_is_player: false,
            },
            &mut rand::rng(),
        )
        .await
        .unwrap();
        let app = app!(store);

        let join = |name: &str| {
            test::TestRequest::post()
                .uri("/api/rooms/room1/join")
                .set_json(json!({ "roomId": "room1", "name": name, "country": "Kenya" }))
                .to_request()
        };

        let resp = test::call_service(&app, join("Alice")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Joined the room successfully.");

        let resp = test::call_service(&app, join("Alice")).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Player already in room.");

        let resp = test::call_service(&app, join("Bob")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, join("Carl")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Room is full.");

        let resp = test::call_service(&app, join("Alice")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Room is full.");

        let resp = test::call_service(&app, join("")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/api/rooms/ROOM1/players")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            json!({ "players": [
                { "name": "Alice", "country": "Kenya" },
                { "name": "Bob", "country": "Kenya" },
            ] })
        );
    }

    #[actix_web::test]
    async fn unknown_room_is_not_found() {
        let store = store();
        let app = app!(store);

        let req = test::TestRequest::get().uri("/api/rooms/NOPE").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri("/api/rooms/NOPE/players")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
