use actix_web::{HttpResponse, Responder, error, web};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::error::{AppError, Res};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Body shared by every response: `{status, message, data}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: ResponseStatus,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Envelope {
            status: ResponseStatus::Success,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope {
            status: ResponseStatus::Error,
            message: message.into(),
            data: None,
        }
    }
}

pub struct Success;
impl Success {
    pub fn created<T: Serialize>(message: &str, body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Created().json(Envelope::success(message, body)))
    }
    pub fn ok<T: Serialize>(message: &str, body: T) -> Res<impl Responder> {
        Result::Ok(HttpResponse::Ok().json(Envelope::success(message, body)))
    }
}

// Extractor failures are reported through the same envelope as handler errors.

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::BadRequest(format!("Invalid JSON body: {}", err)))
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::BadRequest(format!("Invalid path parameter: {}", err)))
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        error::Error::from(AppError::BadRequest(format!("Invalid query string: {}", err)))
    })
}

/// Parses a body that may be omitted: empty means `T::default()`, malformed is a 400.
pub fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Res<T> {
    if body.trim_ascii().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| AppError::BadRequest(format!("Invalid JSON body: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize)]
    struct Notes {
        notes: Option<String>,
    }

    #[test]
    fn empty_body_is_default() {
        assert_eq!(optional_json::<Notes>(b"").unwrap().notes, None);
        assert_eq!(optional_json::<Notes>(b" \n").unwrap().notes, None);
    }

    #[test]
    fn body_is_parsed_when_present() {
        let parsed: Notes = optional_json(br#"{"notes":"ok"}"#).unwrap();
        assert_eq!(parsed.notes.as_deref(), Some("ok"));
    }

    #[test]
    fn malformed_body_is_a_bad_request() {
        let err = optional_json::<Notes>(br#"{"notes":"#).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = optional_json::<Notes>(br#"{"notes":42}"#).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
