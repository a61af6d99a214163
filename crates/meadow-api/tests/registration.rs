//! End-to-end tests for the registration saga against a real on-disk
//! database and a scripted mail gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use meadow_api::auth::{RegisterError, SagaState, register_user};
use meadow_api::{ApiConfig, AppState, AppStateInner};
use meadow_db::{Database, StoreError};
use meadow_mailer::{ActivationVars, Mailer, MailerError};
use meadow_types::api::RegisterRequest;

struct FakeMailer {
    fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl FakeMailer {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(
        &self,
        _template: &str,
        _username: &str,
        email: &str,
        vars: &ActivationVars,
        _sandbox: bool,
    ) -> Result<u16, MailerError> {
        if self.fail {
            return Err(MailerError::RetriesExhausted { attempts: 3 });
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), vars.activation_url.clone()));
        Ok(202)
    }
}

fn test_state(mailer: Arc<FakeMailer>) -> (TempDir, AppState) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::open(&dir.path().join("test.db")).expect("open db");
    let state = Arc::new(AppStateInner {
        db,
        mailer,
        config: ApiConfig {
            env: "test".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            invitation_ttl: Duration::from_secs(72 * 3600),
            sandbox_mail: true,
        },
    });
    (dir, state)
}

fn request(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: "correct-horse-battery".to_string(),
    }
}

fn count(state: &AppState, sql: &str, param: &str) -> i64 {
    state
        .db
        .with_conn(|conn| conn.query_row(sql, [param], |row| row.get(0)).map_err(Into::into))
        .unwrap()
}

#[tokio::test]
async fn successful_registration_persists_user_and_hashed_token() {
    let mailer = Arc::new(FakeMailer::new(false));
    let (_dir, state) = test_state(mailer.clone());

    let saga = register_user(&state, &request("ann", "ann@example.com"))
        .await
        .unwrap();
    assert_eq!(saga.state(), SagaState::Notified);

    let user = saga.user();
    assert!(!user.is_active);
    assert_eq!(
        count(&state, "SELECT COUNT(*) FROM users WHERE id = ?1", &user.id),
        1
    );

    // Exactly one token row, holding the digest of the returned plaintext.
    let expected_hash = hex::encode(Sha256::digest(saga.plain_token().as_bytes()));
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM activation_tokens WHERE token_hash = ?1",
            &expected_hash,
        ),
        1
    );

    // The mail embedded the plaintext token, not the digest.
    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ann@example.com");
    assert!(sent[0].1.ends_with(saga.plain_token()));
}

#[tokio::test]
async fn exhausted_notification_rolls_the_registration_back() {
    let (_dir, state) = test_state(Arc::new(FakeMailer::new(true)));

    let err = register_user(&state, &request("ann", "ann@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegisterError::Notification(_)));

    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            "ann"
        ),
        0
    );
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM activation_tokens WHERE user_id != ?1",
            "",
        ),
        0
    );
}

#[tokio::test]
async fn duplicate_email_and_username_map_to_distinct_errors() {
    let (_dir, state) = test_state(Arc::new(FakeMailer::new(false)));

    register_user(&state, &request("ann", "ann@example.com"))
        .await
        .unwrap();

    let same_email = register_user(&state, &request("beth", "ann@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        same_email,
        RegisterError::Store(StoreError::DuplicateEmail)
    ));

    let same_username = register_user(&state, &request("ann", "beth@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(
        same_username,
        RegisterError::Store(StoreError::DuplicateUsername)
    ));
}

#[tokio::test]
async fn activation_consumes_every_token_for_the_user() {
    let (_dir, state) = test_state(Arc::new(FakeMailer::new(false)));

    let saga = register_user(&state, &request("ann", "ann@example.com"))
        .await
        .unwrap();
    let user_id = saga.user().id.clone();

    let token_hash = hex::encode(Sha256::digest(saga.plain_token().as_bytes()));
    state
        .db
        .activate_user(&token_hash, &meadow_db::now_utc())
        .unwrap();

    let user = state.db.get_user_by_id(&user_id).unwrap();
    assert!(user.is_active);
    assert_eq!(
        count(
            &state,
            "SELECT COUNT(*) FROM activation_tokens WHERE user_id = ?1",
            &user_id,
        ),
        0
    );

    // Redeeming the same token again must fail.
    let replay = state.db.activate_user(&token_hash, &meadow_db::now_utc());
    assert!(matches!(replay, Err(StoreError::NotFound)));
}
