//! Driver error normalization.

use mongodb::error::{CommandError, Error, ErrorKind, WriteError, WriteFailure};

use docrepo_core::error::StoreError;

/// Unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;
/// `MaxTimeMSExpired`.
pub const MAX_TIME_EXPIRED: i32 = 50;

/// Server error code carried by `err`, if any.
fn server_code(err: &Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code, .. })) => Some(*code),
        ErrorKind::Command(CommandError { code, .. }) => Some(*code),
        _ => None,
    }
}

/// Maps a driver error onto [`StoreError`].
pub fn map_error(err: Error) -> StoreError {
    match server_code(&err) {
        Some(DUPLICATE_KEY) => StoreError::DuplicateKey(err.to_string()),
        Some(MAX_TIME_EXPIRED) => StoreError::Timeout(err.to_string()),
        _ => match err.kind.as_ref() {
            ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
                StoreError::Serialization(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use bson::{de::deserialize_from_document, doc};

    use super::*;

    fn write_error(code: i32, name: &str) -> Error {
        let failure: WriteError = deserialize_from_document(doc! {
            "code": code,
            "codeName": name,
            "errmsg": "E11000 duplicate key error collection: app.users index: email_1",
        })
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteError(failure)).into()
    }

    fn command_error(code: i32, name: &str) -> Error {
        let failure: CommandError = deserialize_from_document(doc! {
            "code": code,
            "codeName": name,
            "errmsg": "command failed",
        })
        .unwrap();
        ErrorKind::Command(failure).into()
    }

    #[test]
    fn test_duplicate_key_write_error() {
        let err = map_error(write_error(DUPLICATE_KEY, "DuplicateKey"));

        assert!(matches!(err, StoreError::DuplicateKey(message) if message.contains("email_1")));
    }

    #[test]
    fn test_duplicate_key_from_command() {
        let err = map_error(command_error(DUPLICATE_KEY, "DuplicateKey"));

        assert!(matches!(err, StoreError::DuplicateKey(_)));
    }

    #[test]
    fn test_max_time_expired_is_a_timeout() {
        let err = map_error(command_error(MAX_TIME_EXPIRED, "MaxTimeMSExpired"));

        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[test]
    fn test_other_codes_are_backend_errors() {
        assert!(matches!(map_error(command_error(13, "Unauthorized")), StoreError::Backend(_)));
        assert!(matches!(map_error(write_error(121, "DocumentValidationFailure")), StoreError::Backend(_)));
    }
}
