//! Key rollover across processes sharing one key repository
//!
//! Each `TokenGenerator` below stands in for a separate server process. They
//! share storage only, so a rollover performed by one (or by the operator
//! CLI) is picked up by the others through the key sequence.

use oidcng::keys::{AeadKeyset, KeyManager};
use oidcng::oauth::{GrantType, OpenIDClient, TokenGenerator, User};
use oidcng::storage::{MemoryOAuthStorage, OAuthStorage};
use std::sync::Arc;

const ASSOCIATED_DATA: &str = "oidcng-rollover";

async fn server(storage: Arc<dyn OAuthStorage>, root: &AeadKeyset) -> TokenGenerator {
    let key_manager = KeyManager::new(root.clone(), ASSOCIATED_DATA, storage);
    key_manager.initialize().await.unwrap();
    TokenGenerator::new(
        Arc::new(key_manager),
        "https://op.example.com",
        vec![],
        "http://refeds.org/assurance",
    )
}

fn client() -> OpenIDClient {
    OpenIDClient::new(
        "c1",
        vec!["https://rp/cb".to_string()],
        vec!["openid".to_string()],
        vec![GrantType::Implicit],
    )
}

fn create_user() -> User {
    let mut user = User::new("sub1");
    user.attributes
        .insert("email".to_string(), serde_json::json!("sub1@example.com"));
    user
}

async fn assert_rollover_between_processes(storage: Arc<dyn OAuthStorage>) {
    let user = create_user();
    let root = AeadKeyset::generate();
    let first = server(storage.clone(), &root).await;
    let second = server(storage.clone(), &root).await;

    // Both processes start on the same key
    let before = first
        .generate_access_token_with_embedded_user_info(&user, &client())
        .await
        .unwrap();
    assert_eq!(
        second
            .key_manager()
            .ensure_latest_signing_key_id()
            .await
            .unwrap(),
        before.key_id
    );

    // Operator rollover through a third key manager
    let operator = KeyManager::new(root.clone(), ASSOCIATED_DATA, storage.clone());
    operator.initialize().await.unwrap();
    let symmetric = operator.rollover_symmetric_key().await.unwrap();
    let signing = operator.rollover_signing_key().await.unwrap();
    assert_eq!(signing.symmetric_key_id, Some(symmetric.key_id.clone()));

    // New tokens from either process use the new keys
    let after = second
        .generate_access_token_with_embedded_user_info(&user, &client())
        .await
        .unwrap();
    assert_eq!(after.key_id, signing.key_id);
    let sealed = first.encrypt_aead("payload").await.unwrap();
    assert_eq!(sealed.key_id, symmetric.key_id);

    // Tokens issued before and after the rollover stay valid everywhere
    for generator in [&first, &second] {
        assert_eq!(
            generator
                .decrypt_access_token_with_embedded_user_info(&before.value)
                .await
                .unwrap(),
            user
        );
        assert_eq!(
            generator
                .decrypt_access_token_with_embedded_user_info(&after.value)
                .await
                .unwrap(),
            user
        );
        assert_eq!(
            generator
                .decrypt_aead(&sealed.value, &sealed.key_id)
                .await
                .unwrap(),
            "payload"
        );
    }

    let kids: Vec<String> = first
        .key_manager()
        .public_keys()
        .await
        .unwrap()
        .into_iter()
        .map(|jwk| jwk.kid)
        .collect();
    assert_eq!(kids, vec![signing.key_id, before.key_id]);
}

#[tokio::test]
async fn test_rollover_with_memory_storage() {
    assert_rollover_between_processes(Arc::new(MemoryOAuthStorage::new())).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_rollover_with_sqlite_storage() {
    use oidcng::storage::{StorageBackend, create_storage_backend};

    let directory = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite://{}", directory.path().join("keys.db").display());
    let storage = create_storage_backend(StorageBackend::Sqlite(database_url))
        .await
        .unwrap();

    assert_rollover_between_processes(storage).await;
}

#[tokio::test]
async fn test_signing_keys_survive_restart() {
    let user = create_user();
    let storage: Arc<dyn OAuthStorage> = Arc::new(MemoryOAuthStorage::new());
    let root = AeadKeyset::generate();

    let token = server(storage.clone(), &root)
        .await
        .generate_access_token_with_embedded_user_info(&user, &client())
        .await
        .unwrap();

    let restarted = server(storage.clone(), &root).await;
    assert_eq!(
        restarted
            .key_manager()
            .ensure_latest_signing_key_id()
            .await
            .unwrap(),
        token.key_id
    );
    assert_eq!(
        restarted
            .decrypt_access_token_with_embedded_user_info(&token.value)
            .await
            .unwrap(),
        user
    );
    assert_eq!(storage.list_signing_keys().await.unwrap().len(), 1);
}
