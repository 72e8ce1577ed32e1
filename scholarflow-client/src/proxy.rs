//! Client for the serverless proxy in front of the AI model and the auth service.

use crate::gateway::auth::AuthTokens;
use crate::gateway::error::GatewayError;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use static_assertions::assert_obj_safe;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProxyError {
	#[error("Remote unavailable: {0}")]
	Unavailable(anyhow::Error),
	#[error("{0}")]
	Rejected(String),
}

impl From<GatewayError> for ProxyError {
	fn from(error: GatewayError) -> Self {
		match error {
			GatewayError::Rejected(message) | GatewayError::Unauthorized(message) => Self::Rejected(message),
			other => Self::Unavailable(other.into()),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthRequest {
	Login { email: String, password: String },
	/// Creates the account and mails a one time code which has to be [`AuthRequest::Verify`]ed.
	Signup { email: String, password: String },
	Verify { email: String, token: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
	SignedIn(AuthTokens),
	OtpSent,
}

/// Exchanges credentials for session tokens.
#[async_trait]
pub trait Authenticator: Send + Sync {
	async fn authenticate(&self, request: AuthRequest) -> Result<AuthOutcome, ProxyError>;
}

assert_obj_safe!(Authenticator);

/// The AI model answering tutor questions.
#[async_trait]
pub trait Assistant: Send + Sync {
	async fn ask(&self, request: &TutorRequest) -> Result<String, ProxyError>;
}

assert_obj_safe!(Assistant);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TutorRole {
	User,
	Model,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TutorTurn {
	pub role: TutorRole,
	pub text: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TutorRequest {
	pub prompt: String,
	pub history: Vec<TutorTurn>,
	/// Base64 encoded image attached to the prompt.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,
}

#[derive(Serialize)]
struct AuthRequestBody<'request> {
	email: &'request str,
	password: &'request str,
	#[serde(rename = "type")]
	kind: &'static str,
	token: Option<&'request str>,
}

impl<'request> From<&'request AuthRequest> for AuthRequestBody<'request> {
	fn from(request: &'request AuthRequest) -> Self {
		use AuthRequest::*;
		match request {
			Login { email, password } => Self {
				email,
				password,
				kind: "login",
				token: None,
			},
			Signup { email, password } => Self {
				email,
				password,
				kind: "signup",
				token: None,
			},
			Verify { email, token } => Self {
				email,
				password: "",
				kind: "verify",
				token: Some(token),
			},
		}
	}
}

/// Every proxy response is either a payload or an error, never both.
#[derive(Deserialize, Debug, Default)]
struct ProxyResponse {
	answer: Option<String>,
	access_token: Option<String>,
	refresh_token: Option<String>,
	error: Option<String>,
	error_description: Option<String>,
}

#[derive(Clone)]
pub struct ProxyClient {
	client: reqwest::Client,
	base_url: Url,
}

impl ProxyClient {
	pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ProxyError> {
		let base_url = Url::parse(base_url).map_err(|error| ProxyError::Unavailable(error.into()))?;
		let client = reqwest::Client::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|error| ProxyError::Unavailable(error.into()))?;

		Ok(Self { client, base_url })
	}

	async fn post(&self, path: &str, body: &impl Serialize) -> Result<ProxyResponse, ProxyError> {
		let url = self
			.base_url
			.join(path)
			.map_err(|error| ProxyError::Unavailable(error.into()))?;
		debug!(%url, "Calling proxy.");

		let response = self
			.client
			.post(url)
			.json(body)
			.send()
			.await
			.map_err(|error| ProxyError::Unavailable(error.into()))?;
		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|error| ProxyError::Unavailable(error.into()))?;

		interpret_response(status, &text)
	}
}

#[async_trait]
impl Assistant for ProxyClient {
	async fn ask(&self, request: &TutorRequest) -> Result<String, ProxyError> {
		let response = self.post("api/ai", request).await?;
		response
			.answer
			.ok_or_else(|| ProxyError::Unavailable(anyhow!("AI response contained no answer")))
	}
}

#[async_trait]
impl Authenticator for ProxyClient {
	async fn authenticate(&self, request: AuthRequest) -> Result<AuthOutcome, ProxyError> {
		let response = self.post("api/auth", &AuthRequestBody::from(&request)).await?;

		match (response.access_token, response.refresh_token) {
			(Some(access_token), Some(refresh_token)) => Ok(AuthOutcome::SignedIn(AuthTokens {
				access_token,
				refresh_token,
			})),
			_ if matches!(request, AuthRequest::Signup { .. }) => Ok(AuthOutcome::OtpSent),
			_ => Err(ProxyError::Unavailable(anyhow!("Auth response contained no tokens"))),
		}
	}
}

/// A well formed error body is a rejection whatever the status, anything else that isn't a
/// successful JSON response means the proxy is unavailable.
fn interpret_response(status: StatusCode, body: &str) -> Result<ProxyResponse, ProxyError> {
	let response = match serde_json::from_str::<ProxyResponse>(body) {
		Ok(response) => response,
		Err(error) => {
			warn!(%status, %error, "Proxy returned malformed response.");
			return Err(ProxyError::Unavailable(anyhow!("Malformed response ({status}): {error}")));
		}
	};

	if let Some(message) = response.error_description.clone().or_else(|| response.error.clone()) {
		return Err(ProxyError::Rejected(message));
	}

	if !status.is_success() {
		return Err(ProxyError::Unavailable(anyhow!("Proxy responded with {status}")));
	}

	Ok(response)
}
