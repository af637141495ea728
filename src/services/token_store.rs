use secrecy::Secret;
use std::future::Future;
use tower_sessions::Session;

/// Session keys used for the login state
pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_FULL_NAME: &str = "user_full_name";
pub const KEY_ROLE: &str = "user_role";

#[derive(thiserror::Error, Debug)]
#[error("Session store error: {0}")]
pub struct StoreError(pub String);

/// String key-value storage the token store writes through.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl KeyValueStore for Session {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Session::get::<String>(self, key)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.insert(key, value)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        Session::remove::<String>(self, key)
            .await
            .map(|_| ())
            .map_err(|e| StoreError(e.to_string()))
    }
}

/// The logged-in user as cached in the store.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub access_token: Secret<String>,
    pub full_name: String,
    pub role: String,
}

/// Access token plus display name and role, written together on login and
/// cleared together on logout or when the backend rejects the token.
pub struct TokenStore<S> {
    store: S,
}

impl<S: KeyValueStore> TokenStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn save(
        &self,
        access_token: String,
        full_name: String,
        role: String,
    ) -> Result<(), StoreError> {
        self.store.set(KEY_ACCESS_TOKEN, access_token).await?;
        self.store.set(KEY_FULL_NAME, full_name).await?;
        self.store.set(KEY_ROLE, role).await
    }

    pub async fn access_token(&self) -> Result<Option<Secret<String>>, StoreError> {
        Ok(self
            .store
            .get(KEY_ACCESS_TOKEN)
            .await?
            .filter(|token| !token.is_empty())
            .map(Secret::new))
    }

    pub async fn current_user(&self) -> Result<Option<SessionUser>, StoreError> {
        let Some(access_token) = self.access_token().await? else {
            return Ok(None);
        };

        Ok(Some(SessionUser {
            access_token,
            full_name: self.store.get(KEY_FULL_NAME).await?.unwrap_or_default(),
            role: self.store.get(KEY_ROLE).await?.unwrap_or_default(),
        }))
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(KEY_ACCESS_TOKEN).await?;
        self.store.remove(KEY_FULL_NAME).await?;
        self.store.remove(KEY_ROLE).await
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryKeyValueStore;
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_save_then_read_user() {
        let tokens = TokenStore::new(MemoryKeyValueStore::default());
        tokens
            .save("tok".to_string(), "Ana Pérez".to_string(), "admin".to_string())
            .await
            .unwrap();

        let user = tokens.current_user().await.unwrap().unwrap();
        assert_eq!(user.access_token.expose_secret(), "tok");
        assert_eq!(user.full_name, "Ana Pérez");
        assert_eq!(user.role, "admin");
    }

    #[tokio::test]
    async fn test_clear_removes_all_keys() {
        let kv = MemoryKeyValueStore::default();
        let tokens = TokenStore::new(kv.clone());
        tokens
            .save("tok".to_string(), "Ana".to_string(), "user".to_string())
            .await
            .unwrap();
        assert_eq!(kv.len(), 3);

        tokens.clear().await.unwrap();

        assert_eq!(kv.len(), 0);
        assert!(tokens.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_token_counts_as_logged_out() {
        let kv = MemoryKeyValueStore::default();
        kv.set(KEY_ACCESS_TOKEN, String::new()).await.unwrap();

        let tokens = TokenStore::new(kv);
        assert!(tokens.access_token().await.unwrap().is_none());
    }
}
