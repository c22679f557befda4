use serde_json::{json, Map, Value};
use validator::{Validate, ValidationErrors};

use crate::api::errors::ApiError;

/// Runs derive-based validation and folds the failures into a
/// field-to-messages JSON object for the error envelope.
pub(crate) fn validate<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| ApiError::Validation(errors_to_json(&errors)))
}

fn errors_to_json(errors: &ValidationErrors) -> Value {
    let mut fields = Map::new();
    for (field, failures) in errors.field_errors() {
        let messages: Vec<Value> = failures
            .iter()
            .map(|failure| {
                failure
                    .message
                    .as_ref()
                    .map(|message| Value::String(message.to_string()))
                    .unwrap_or_else(|| Value::String(failure.code.to_string()))
            })
            .collect();
        fields.insert(field.to_string(), Value::Array(messages));
    }
    json!({ "errors": fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Payload {
        #[validate(email(message = "Invalid email address"))]
        email: String,
    }

    #[test]
    fn validation_failure_names_the_field() {
        let result = validate(&Payload { email: "not-an-email".to_string() });
        let Err(ApiError::Validation(details)) = result else {
            panic!("expected validation error");
        };
        assert_eq!(details["errors"]["email"][0], "Invalid email address");
    }

    #[test]
    fn valid_payload_passes() {
        assert!(validate(&Payload { email: "a@b.test".to_string() }).is_ok());
    }
}
