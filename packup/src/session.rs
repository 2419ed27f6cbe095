//! Player session model with deterministic offline derivation.
//!
//! Offline sessions are derived purely locally: the UUID is the MD5 digest of the
//! username reinterpreted as a 128-bit value, and the access token is the digest
//! of the username suffixed with `_access`, under the same encoding. Neither is a
//! credential, they only need to be deterministic across processes.

use uuid::Uuid;


/// A player session, either derived offline or obtained from a Microsoft account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Offline {
        username: String,
        uuid: Uuid,
        access_token: String,
    },
    Microsoft {
        username: String,
        uuid: Uuid,
        access_token: String,
        xuid: String,
    },
}

impl Session {

    /// Derive an offline session from the given username, no I/O involved.
    pub fn offline(username: impl Into<String>) -> Self {

        let username = username.into();

        let uuid = Uuid::from_bytes(md5::compute(username.as_bytes()).0);
        let access_token = Uuid::from_bytes(md5::compute(format!("{username}_access").as_bytes()).0)
            .as_simple()
            .to_string();

        Self::Offline {
            username,
            uuid,
            access_token,
        }

    }

    #[inline]
    pub fn username(&self) -> &str {
        match self {
            Session::Offline { username, .. } => username,
            Session::Microsoft { username, .. } => username,
        }
    }

    #[inline]
    pub fn uuid(&self) -> &Uuid {
        match self {
            Session::Offline { uuid, .. } => uuid,
            Session::Microsoft { uuid, .. } => uuid,
        }
    }

    #[inline]
    pub fn access_token(&self) -> &str {
        match self {
            Session::Offline { access_token, .. } => access_token,
            Session::Microsoft { access_token, .. } => access_token,
        }
    }

    /// Legacy session token, of the form `token:<access_token>:<uuid>`.
    pub fn session_token(&self) -> String {
        format!("token:{}:{}", self.access_token(), self.uuid().as_simple())
    }

    /// Identifier of the session type on the game's command line.
    #[inline]
    pub fn user_type(&self) -> &'static str {
        match self {
            Session::Offline { .. } => "offline",
            Session::Microsoft { .. } => "msa",
        }
    }

}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn offline_is_deterministic() {
        let a = Session::offline("Player");
        let b = Session::offline("Player");
        assert_eq!(a.uuid(), b.uuid());
        assert_eq!(a.access_token(), b.access_token());
        assert_eq!(a.session_token(), b.session_token());
    }

    #[test]
    fn offline_is_case_sensitive() {
        let a = Session::offline("Notch");
        let b = Session::offline("notch");
        assert_ne!(a.uuid(), b.uuid());
    }

    #[test]
    fn offline_uuid_is_md5_of_username() {
        let session = Session::offline("Player");
        let expected = Uuid::from_bytes(md5::compute(b"Player").0);
        assert_eq!(session.uuid(), &expected);
    }

    #[test]
    fn session_token_format() {
        let session = Session::offline("Player");
        let expected = format!("token:{}:{}", session.access_token(), session.uuid().as_simple());
        assert_eq!(session.session_token(), expected);
        assert_eq!(session.user_type(), "offline");
    }

}
