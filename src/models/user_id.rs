use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Header carrying the caller's user identifier.
///
/// Header names are case-insensitive on the wire; `HeaderMap` stores them lowercased.
pub const USER_ID_HEADER: &str = "userid";

/// How an incoming identifier is classified before it reaches the history store
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserIdFormat {
    /// 24 hex digits is an ObjectId, anything else is a raw string
    #[default]
    Auto,
    /// Every identifier must be an ObjectId
    ObjectId,
    /// Identifiers are always matched as plain strings
    Raw,
}

/// Externally issued user identifier
///
/// The history store matches on exactly one representation; there is no
/// "try ObjectId, fall back to string" query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserId {
    /// Store-native ObjectId
    ObjectId(ObjectId),
    /// Opaque string identifier
    Raw(String),
}

impl UserId {
    /// Classifies a raw identifier according to `format`
    pub fn parse(raw: &str, format: UserIdFormat) -> AppResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidInput("Missing userId header".to_string()));
        }

        match format {
            UserIdFormat::Raw => Ok(UserId::Raw(raw.to_string())),
            UserIdFormat::ObjectId => ObjectId::parse_str(raw)
                .map(UserId::ObjectId)
                .map_err(|_| {
                    AppError::InvalidInput(format!("userId '{}' is not a valid ObjectId", raw))
                }),
            UserIdFormat::Auto => {
                if raw.len() == 24 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
                    ObjectId::parse_str(raw)
                        .map(UserId::ObjectId)
                        .map_err(|e| AppError::InvalidInput(e.to_string()))
                } else {
                    Ok(UserId::Raw(raw.to_string()))
                }
            }
        }
    }

    /// Textual form used as routing and cache key
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserId::ObjectId(oid) => write!(f, "{}", oid.to_hex()),
            UserId::Raw(id) => write!(f, "{}", id),
        }
    }
}
