//! Serializable result envelope.
//!
//! Operations return [`DbResult`]; `Envelope` is the boundary view of that
//! result: `{"rc": 0, "data": ...}` on success and
//! `{"rc": 1, "msg": "...", "err": {...}}` on failure.

use crate::error::{DbError, DbResult, Diagnostic};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Return code of a successful operation.
pub const RC_SUCCESS: u8 = 0;
/// Return code of a failed operation.
pub const RC_FAILURE: u8 = 1;

/// Machine-readable cause attached to a failure envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorCause {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl From<&DbError> for ErrorCause {
    fn from(err: &DbError) -> Self {
        let diagnostics = match err {
            DbError::Query { diagnostics, .. } => diagnostics.clone(),
            _ => Vec::new(),
        };
        Self {
            kind: err.kind(),
            code: err.code().map(String::from),
            diagnostics,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Envelope<T> {
    Success { data: T },
    Failure { msg: String, err: ErrorCause },
}

impl<T> Envelope<T> {
    pub fn rc(&self) -> u8 {
        match self {
            Self::Success { .. } => RC_SUCCESS,
            Self::Failure { .. } => RC_FAILURE,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Payload of a success envelope.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Message of a failure envelope.
    pub fn msg(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { msg, .. } => Some(msg),
        }
    }
}

impl<T> From<DbResult<T>> for Envelope<T> {
    fn from(result: DbResult<T>) -> Self {
        match result {
            Ok(data) => Self::Success { data },
            Err(err) => Self::Failure {
                msg: err.to_string(),
                err: ErrorCause::from(&err),
            },
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Success { data } => {
                let mut s = serializer.serialize_struct("Envelope", 2)?;
                s.serialize_field("rc", &RC_SUCCESS)?;
                s.serialize_field("data", data)?;
                s.end()
            }
            Self::Failure { msg, err } => {
                let mut s = serializer.serialize_struct("Envelope", 3)?;
                s.serialize_field("rc", &RC_FAILURE)?;
                s.serialize_field("msg", msg)?;
                s.serialize_field("err", err)?;
                s.end()
            }
        }
    }
}
