//! Persisting the logged-in user's token and profile.

mod storage;

pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

use serde::{de::DeserializeOwned, Serialize};

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";

/// The current user's session, kept in some [`Storage`].
///
/// Nothing here checks whether the token is still valid, that only becomes
/// apparent when the server rejects a request.
#[derive(Debug, Clone, Default)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S) -> Self { SessionStore { storage } }

    pub fn storage(&self) -> &S { &self.storage }

    pub fn save_token(&self, token: &str) -> Result<(), SessionError> {
        self.storage.set_item(TOKEN_KEY, token)?;
        Ok(())
    }

    pub fn token(&self) -> Result<Option<String>, SessionError> {
        self.storage.get_item(TOKEN_KEY).map_err(Into::into)
    }

    pub fn remove_token(&self) -> Result<(), SessionError> {
        self.storage.remove_item(TOKEN_KEY)?;
        Ok(())
    }

    /// Store the user's profile as JSON.
    pub fn save_user_data<T>(&self, user: &T) -> Result<(), SessionError>
    where
        T: Serialize + ?Sized,
    {
        let json =
            serde_json::to_string(user).map_err(SessionError::Serialize)?;
        self.storage.set_item(USER_KEY, &json)?;

        Ok(())
    }

    /// Read back whatever [`SessionStore::save_user_data()`] stored, or
    /// `None` if nothing (or an empty string) has been saved.
    pub fn user_data<T>(&self) -> Result<Option<T>, SessionError>
    where
        T: DeserializeOwned,
    {
        match self.storage.get_item(USER_KEY)? {
            Some(ref raw) if raw.is_empty() => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(
                |source| SessionError::Corrupted {
                    key: USER_KEY,
                    source,
                },
            ),
            None => Ok(None),
        }
    }

    pub fn remove_user_data(&self) -> Result<(), SessionError> {
        self.storage.remove_item(USER_KEY)?;
        Ok(())
    }

    /// Do we have a (non-empty) token?
    pub fn is_logged_in(&self) -> Result<bool, SessionError> {
        let token = self.token()?;
        Ok(token.map(|t| !t.is_empty()).unwrap_or(false))
    }

    /// Forget both the token and the user's profile.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.remove_token()?;
        self.remove_user_data()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unable to access the session storage")]
    Storage(#[from] StorageError),
    #[error("The stored \"{key}\" entry isn't valid JSON")]
    Corrupted {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unable to serialize the user data")]
    Serialize(#[source] serde_json::Error),
}
