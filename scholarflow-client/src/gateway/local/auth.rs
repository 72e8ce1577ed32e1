//! Accounts and sessions of the local backend.
//!
//! Signing up issues a six digit verification code which is written to the log instead of
//! being mailed.

use super::LocalGateway;
use crate::gateway::auth::{AuthGateway, AuthStateChange, AuthTokens, AuthUser};
use crate::gateway::error::GatewayError;
use crate::proxy::{AuthOutcome, AuthRequest, Authenticator, ProxyError};
use crate::types::uuid::Uuid;
use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, query, query_as};
use tokio::sync::broadcast;
use tracing::{debug, info};

const INVALID_CREDENTIALS: &str = "Invalid login credentials";
const INVALID_TOKEN: &str = "Token has expired or is invalid";

#[derive(FromRow)]
struct AccountRow {
	uuid: Uuid,
	email: String,
	password_salt: String,
	password_hash: String,
	verification_code: Option<String>,
	verified: bool,
}

impl AccountRow {
	/// Only good enough for the local development backend: a single unstretched SHA-256 round,
	/// compared without constant time guarantees.
	fn has_password(&self, password: &str) -> bool {
		hash_password(&self.password_salt, password) == self.password_hash
	}
}

#[async_trait]
impl AuthGateway for LocalGateway {
	async fn set_session(&self, tokens: AuthTokens) -> Result<AuthUser, GatewayError> {
		let user: Option<(Uuid, String)> = query_as(
			r"SELECT account.uuid, account.email
			FROM auth_session
			JOIN account ON account.uuid = auth_session.account_uuid
			WHERE auth_session.access_token = ?1 AND auth_session.refresh_token = ?2",
		)
		.bind(&tokens.access_token)
		.bind(&tokens.refresh_token)
		.fetch_optional(&self.pool)
		.await?;

		let Some((uuid, email)) = user else {
			return Err(GatewayError::Unauthorized(INVALID_TOKEN.to_owned()));
		};

		let user = AuthUser {
			uuid,
			email: Some(email),
		};
		self.session.install(tokens, user.clone());
		debug!(user = %user.uuid, "Session installed.");
		Ok(user)
	}

	fn current_user(&self) -> Option<AuthUser> {
		self.session.user()
	}

	async fn sign_out(&self) -> Result<(), GatewayError> {
		if let Some(access_token) = self.session.access_token() {
			query("DELETE FROM auth_session WHERE access_token = ?1")
				.bind(access_token)
				.execute(&self.pool)
				.await?;
		}
		self.session.clear();
		Ok(())
	}

	fn auth_events(&self) -> broadcast::Receiver<AuthStateChange> {
		self.session.subscribe()
	}
}

#[async_trait]
impl Authenticator for LocalGateway {
	async fn authenticate(&self, request: AuthRequest) -> Result<AuthOutcome, ProxyError> {
		match request {
			AuthRequest::Signup { email, password } => {
				self.sign_up(&email, &password).await?;
				Ok(AuthOutcome::OtpSent)
			}
			AuthRequest::Verify { email, token } => {
				let account = self.account(&email).await?;
				match account {
					Some(account) if account.verification_code.as_deref() == Some(token.as_str()) => {
						query("UPDATE account SET verified = 1, verification_code = NULL WHERE uuid = ?1")
							.bind(account.uuid)
							.execute(&self.pool)
							.await
							.map_err(GatewayError::from)?;
						info!(email = account.email, "Account verified.");
						Ok(AuthOutcome::SignedIn(self.issue_tokens(account.uuid).await?))
					}
					_ => Err(ProxyError::Rejected(INVALID_TOKEN.to_owned())),
				}
			}
			AuthRequest::Login { email, password } => {
				let account = self.account(&email).await?;
				match account {
					Some(account) if account.has_password(&password) => {
						if !account.verified {
							return Err(ProxyError::Rejected("Email not confirmed".to_owned()));
						}
						Ok(AuthOutcome::SignedIn(self.issue_tokens(account.uuid).await?))
					}
					_ => Err(ProxyError::Rejected(INVALID_CREDENTIALS.to_owned())),
				}
			}
		}
	}
}

impl LocalGateway {
	async fn sign_up(&self, email: &str, password: &str) -> Result<(), GatewayError> {
		let salt = random_salt();
		let verification_code = verification_code();

		let result = query(
			r"INSERT INTO account(uuid, email, password_salt, password_hash, verification_code)
			VALUES (?1, ?2, ?3, ?4, ?5)",
		)
		.bind(Uuid::new_v4())
		.bind(email)
		.bind(&salt)
		.bind(hash_password(&salt, password))
		.bind(&verification_code)
		.execute(&self.pool)
		.await;

		match result.map_err(GatewayError::from) {
			Ok(_) => {
				info!(email, verification_code, "Account created, verification code issued.");
				Ok(())
			}
			Err(GatewayError::Rejected(_)) => Err(GatewayError::Rejected("User already registered".to_owned())),
			Err(error) => Err(error),
		}
	}

	async fn account(&self, email: &str) -> Result<Option<AccountRow>, GatewayError> {
		query_as(
			r"SELECT uuid, email, password_salt, password_hash, verification_code, verified
			FROM account
			WHERE email = ?1",
		)
		.bind(email)
		.fetch_optional(&self.pool)
		.await
		.map_err(Into::into)
	}

	async fn issue_tokens(&self, account_uuid: Uuid) -> Result<AuthTokens, GatewayError> {
		let tokens = AuthTokens {
			access_token: Uuid::new_v4().simple().to_string(),
			refresh_token: Uuid::new_v4().simple().to_string(),
		};

		query("INSERT INTO auth_session(access_token, refresh_token, account_uuid) VALUES (?1, ?2, ?3)")
			.bind(&tokens.access_token)
			.bind(&tokens.refresh_token)
			.bind(account_uuid)
			.execute(&self.pool)
			.await?;

		Ok(tokens)
	}
}

fn random_salt() -> String {
	hex::encode(rand::rng().random::<[u8; 16]>())
}

fn verification_code() -> String {
	format!("{:06}", rand::rng().random_range(0..1_000_000))
}

fn hash_password(salt: &str, password: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(salt.as_bytes());
	hasher.update(password.as_bytes());
	hex::encode(hasher.finalize())
}
