use actix_web::{HttpRequest, HttpResponse, Result, get, web};

use crate::ws::{handler, server::WsServerHandle};

#[allow(clippy::future_not_send)]
#[get("/ws")]
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    ws_server: web::Data<WsServerHandle>,
) -> Result<HttpResponse> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    // spawn websocket handler (and don't await it) so that the response is returned immediately
    actix_web::rt::spawn(handler::handle_ws(
        ws_server.get_ref().clone(),
        session,
        msg_stream,
    ));

    Ok(response)
}
