use validator::{Validate, ValidationErrors};

use crate::api::errors::ApiError;

/// Runs `validator` rules and flattens the first message per field into a 400.
pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| ApiError::BadRequest(describe(&errors)))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errors)| {
            errors.first().map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();

    if messages.is_empty() {
        "Invalid request payload".to_string()
    } else {
        messages.join("; ")
    }
}
