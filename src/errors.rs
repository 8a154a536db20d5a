use actix_web::http::{header::ContentType, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;

#[derive(Display, Debug, PartialEq)]
pub enum UserError {
    #[display(fmt = "Invalid input parameter")]
    ValidationError,
    #[display(fmt = "Internal server error")]
    DBPoolGetError,
    #[display(fmt = "Not found")]
    NotFoundError,
    #[display(fmt = "Authentication required")]
    UnauthorizedError,
    #[display(fmt = "Internal server error")]
    UnexpectedError,
}

impl ResponseError for UserError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            UserError::ValidationError => StatusCode::BAD_REQUEST,
            UserError::DBPoolGetError => StatusCode::INTERNAL_SERVER_ERROR,
            UserError::NotFoundError => StatusCode::NOT_FOUND,
            UserError::UnauthorizedError => StatusCode::UNAUTHORIZED,
            UserError::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel::result::Error> for UserError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => UserError::NotFoundError,
            e => {
                error!("Unexpected database error: {}", e);
                UserError::UnexpectedError
            }
        }
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(_: validator::ValidationErrors) -> Self {
        UserError::ValidationError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_not_found_maps_to_404() {
        let err = UserError::from(diesel::result::Error::NotFound);
        assert_eq!(err, UserError::NotFoundError);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn other_diesel_errors_are_opaque() {
        let err = UserError::from(diesel::result::Error::RollbackTransaction);
        assert_eq!(err, UserError::UnexpectedError);
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn unauthorized_is_401() {
        assert_eq!(
            UserError::UnauthorizedError.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
