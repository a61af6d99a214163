use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use meadow_db::models::UserRow;
use meadow_db::{StoreError, format_ts};
use meadow_mailer::{ActivationVars, MailerError, USER_WELCOME_TEMPLATE};
use meadow_types::api::{Envelope, RegisterRequest, RegisterResponse};

use crate::convert::user_response;
use crate::{ApiError, AppState, run_blocking};

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not deliver the activation mail")]
    Notification(#[source] MailerError),
    #[error("identity {user_id} left orphaned: cleanup failed after undeliverable activation mail")]
    Orphaned {
        user_id: String,
        #[source]
        source: StoreError,
    },
    #[error("password hashing failed")]
    Hashing,
}

impl From<RegisterError> for ApiError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Store(e) => ApiError::Store(e),
            RegisterError::Notification(_)
            | RegisterError::Orphaned { .. }
            | RegisterError::Hashing => ApiError::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Started,
    Persisted,
    Notified,
    RolledBack,
}

/// The registration saga: credentials and activation token are persisted in
/// one transaction, the activation mail goes out afterwards, and an
/// undeliverable mail rolls the committed rows back out. The state field
/// records how far the saga got.
#[derive(Debug)]
pub struct RegistrationSaga {
    state: SagaState,
    user: UserRow,
    plain_token: String,
    token_hash: String,
    expires_at: String,
}

impl RegistrationSaga {
    /// Hash the password and mint the activation token. Only the token's
    /// digest will ever be stored; the plaintext lives in this value until
    /// it is handed back to the caller.
    pub fn begin(app: &AppState, req: &RegisterRequest) -> Result<Self, RegisterError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| {
                error!("password hashing failed: {e}");
                RegisterError::Hashing
            })?
            .to_string();

        let mut token_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut token_bytes);
        let plain_token = hex::encode(token_bytes);
        let token_hash = hex::encode(Sha256::digest(plain_token.as_bytes()));

        let now = Utc::now();
        Ok(Self {
            state: SagaState::Started,
            user: UserRow {
                id: Uuid::new_v4().to_string(),
                username: req.username.clone(),
                email: req.email.clone(),
                password: password_hash,
                is_active: false,
                created_at: format_ts(now),
            },
            plain_token,
            token_hash,
            expires_at: format_ts(now + app.config.invitation_ttl),
        })
    }

    pub async fn persist(&mut self, app: &AppState) -> Result<(), StoreError> {
        let db = app.clone();
        let user = self.user.clone();
        let token_hash = self.token_hash.clone();
        let expires_at = self.expires_at.clone();
        run_blocking(move || db.db.create_user_with_invitation(&user, &token_hash, &expires_at))
            .await?;
        self.state = SagaState::Persisted;
        debug!(user_id = %self.user.id, "registration persisted");
        Ok(())
    }

    pub async fn notify(&mut self, app: &AppState) -> Result<u16, MailerError> {
        let vars = ActivationVars {
            username: self.user.username.clone(),
            activation_url: format!("{}/confirm/{}", app.config.frontend_url, self.plain_token),
        };
        let status = app
            .mailer
            .send(
                USER_WELCOME_TEMPLATE,
                &self.user.username,
                &self.user.email,
                &vars,
                app.config.sandbox_mail,
            )
            .await?;
        self.state = SagaState::Notified;
        Ok(status)
    }

    /// Undo the committed persist step after a terminal notification
    /// failure, so no unreachable, unnotified account is left behind.
    pub async fn compensate(&mut self, app: &AppState) -> Result<(), StoreError> {
        let db = app.clone();
        let user_id = self.user.id.clone();
        run_blocking(move || db.db.delete_user(&user_id)).await?;
        self.state = SagaState::RolledBack;
        debug!(user_id = %self.user.id, "registration rolled back");
        Ok(())
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn user(&self) -> &UserRow {
        &self.user
    }

    pub fn plain_token(&self) -> &str {
        &self.plain_token
    }
}

pub async fn register_user(
    app: &AppState,
    req: &RegisterRequest,
) -> Result<RegistrationSaga, RegisterError> {
    let mut saga = RegistrationSaga::begin(app, req)?;
    saga.persist(app).await?;

    match saga.notify(app).await {
        Ok(status) => {
            info!(status, user_id = %saga.user().id, "activation mail accepted");
            Ok(saga)
        }
        Err(mail_err) => {
            warn!(
                error = %mail_err,
                user_id = %saga.user().id,
                "activation mail undeliverable, rolling back registration"
            );
            let user_id = saga.user().id.clone();
            match saga.compensate(app).await {
                Ok(()) => Err(RegisterError::Notification(mail_err)),
                // The cleanup itself failed: the row is still there and
                // needs operator attention, not just a failed-mail retry.
                Err(store_err) => {
                    error!(
                        user_id = %user_id,
                        error = %store_err,
                        "compensating delete failed; identity orphaned"
                    );
                    Err(RegisterError::Orphaned {
                        user_id,
                        source: store_err,
                    })
                }
            }
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&req)?;

    let saga = register_user(&state, &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope {
            data: RegisterResponse {
                user: user_response(saga.user()),
                token: saga.plain_token().to_string(),
            },
        }),
    ))
}

pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    let token_hash = hex::encode(Sha256::digest(token.as_bytes()));
    let now = meadow_db::now_utc();

    let app = state.clone();
    run_blocking(move || app.db.activate_user(&token_hash, &now)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be 3-32 characters".to_string(),
        ));
    }
    if !req.email.contains('@') || req.email.len() > 255 {
        return Err(ApiError::Validation("invalid email address".to_string()));
    }
    if req.password.len() < 8 || req.password.len() > 72 {
        return Err(ApiError::Validation(
            "password must be 8-72 characters".to_string(),
        ));
    }
    Ok(())
}
