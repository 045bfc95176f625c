//! HTTP API for the question bank.
//!
//! # Endpoints
//!
//! * `GET /{subject}/{level}` - Up to ten shuffled questions
//!
//! ```rust,no_run
//! use actix_web::{App, web};
//! use booxclash_questions::{QuestionBank, api::bind_services};
//!
//! let bank = web::Data::new(QuestionBank::default());
//! let app = App::new()
//!     .app_data(bank)
//!     .service(bind_services(web::scope("/api/questions")));
//! ```

use actix_web::{
    HttpResponse, Result, Scope,
    dev::{ServiceFactory, ServiceRequest},
    error::InternalError,
    http::StatusCode,
    route,
    web::{self, Json},
};
use serde::Serialize;

use crate::{DEFAULT_SELECTION_LIMIT, Question, QuestionBank, QuestionsError};

#[must_use]
pub fn bind_services<
    T: ServiceFactory<ServiceRequest, Config = (), Error = actix_web::Error, InitError = ()>,
>(
    scope: Scope<T>,
) -> Scope<T> {
    scope.service(get_questions_endpoint)
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    message: String,
}

impl From<QuestionsError> for actix_web::Error {
    fn from(err: QuestionsError) -> Self {
        let (status, message) = match &err {
            QuestionsError::NotFound { subject, level } => {
                log::warn!("No questions found for {subject} - {level}");
                (StatusCode::NOT_FOUND, "Questions not found.".to_string())
            }
            _ => {
                log::error!("Failed to load questions: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to load questions.".to_string(),
                )
            }
        };

        InternalError::from_response(
            err.to_string(),
            HttpResponse::build(status).json(ApiMessage { message }),
        )
        .into()
    }
}

/// Returns up to ten shuffled questions for a subject and level.
///
/// # Errors
///
/// * If the subject or level has no questions
#[route("/{subject}/{level}", method = "GET")]
pub async fn get_questions_endpoint(
    path: web::Path<(String, String)>,
    bank: web::Data<QuestionBank>,
) -> Result<Json<Vec<Question>>> {
    let (subject, level) = path.into_inner();
    log::debug!("Request received for subject: {subject}, level: {level}");

    let questions = bank.select(
        &subject,
        &level,
        DEFAULT_SELECTION_LIMIT,
        &mut rand::rng(),
    )?;

    log::debug!(
        "Sending {} questions for {subject} - {level}",
        questions.len()
    );

    Ok(Json(questions))
}
