use actix_web::{Result, route, web::Json};
use serde_json::{Value, json};

#[route("/health", method = "GET")]
pub async fn health_endpoint() -> Result<Json<Value>> {
    log::trace!("Healthy");
    Ok(Json(json!({
        "healthy": true,
        "hash": env!("GIT_HASH"),
    })))
}

#[cfg(test)]
mod test {
    use actix_web::{App, test};
    use pretty_assertions::assert_eq;

    use super::*;

    #[actix_web::test]
    async fn health_reports_healthy_with_hash() {
        let app = test::init_service(App::new().service(health_endpoint)).await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["healthy"], true);
        assert_eq!(body["hash"], env!("GIT_HASH"));
    }
}
