//! Session credentials and the values that can stand in for one.

use super::record::Record;
use crate::error::{Error, Result};

/// A server-issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::InvalidSession("empty session token".into()));
        }
        Ok(Self { token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// An authenticating principal: a `_User` record plus its session token,
/// when one has been established.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    record: Record,
    session_token: Option<String>,
}

impl User {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            session_token: None,
        }
    }

    pub fn with_session_token(record: Record, token: impl Into<String>) -> Self {
        Self {
            record,
            session_token: Some(token.into()),
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

/// The closed set of values a query accepts as a session credential: a raw
/// token, a session, or a user carrying a token. Anything else simply does
/// not implement the trait, and a token-less user is rejected at the call
/// site rather than at request time.
pub trait IntoSessionToken {
    fn into_session_token(self) -> Result<String>;
}

impl IntoSessionToken for String {
    fn into_session_token(self) -> Result<String> {
        if self.is_empty() {
            return Err(Error::InvalidSession("empty session token".into()));
        }
        Ok(self)
    }
}

impl IntoSessionToken for &str {
    fn into_session_token(self) -> Result<String> {
        self.to_string().into_session_token()
    }
}

impl IntoSessionToken for &Session {
    fn into_session_token(self) -> Result<String> {
        Ok(self.token.clone())
    }
}

impl IntoSessionToken for Session {
    fn into_session_token(self) -> Result<String> {
        Ok(self.token)
    }
}

impl IntoSessionToken for &User {
    fn into_session_token(self) -> Result<String> {
        match &self.session_token {
            Some(token) => Ok(token.clone()),
            None => Err(Error::InvalidSession(
                "user carries no session token".into(),
            )),
        }
    }
}
