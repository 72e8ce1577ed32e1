use crate::gateway::auth::SessionSlot;
use crate::gateway::error::{GatewayError, IntoGatewayResult, remote_error};
use anyhow::anyhow;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const API_KEY: &str = "apikey";
const PREFER: &str = "Prefer";

/// HTTP access to the platform's table, storage and auth APIs.
///
/// Requests carry the access token of the installed session, or the anonymous key without one.
pub(crate) struct RestClient {
	client: reqwest::Client,
	base_url: Url,
	anon_key: String,
	session: Arc<SessionSlot>,
}

pub(crate) struct RestRequest {
	builder: RequestBuilder,
	description: String,
}

impl RestClient {
	pub fn new(
		url: &str,
		anon_key: &str,
		request_timeout: Duration,
		session: Arc<SessionSlot>,
	) -> Result<Self, GatewayError> {
		let mut base_url = Url::parse(url).unavailable("Invalid backend URL")?;
		if base_url.cannot_be_a_base() {
			return Err(GatewayError::Unavailable(anyhow!("Backend URL {url} can't have paths")));
		}
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());
			base_url.set_path(&path);
		}

		let client = reqwest::Client::builder()
			.timeout(request_timeout)
			.build()
			.unavailable("Failed to create HTTP client")?;

		Ok(Self {
			client,
			base_url,
			anon_key: anon_key.to_owned(),
			session,
		})
	}

	pub fn table(&self, method: Method, table: &str) -> RestRequest {
		let bearer = self.session.access_token().unwrap_or_else(|| self.anon_key.clone());
		self.request(method, &format!("rest/v1/{table}"), &bearer)
	}

	pub fn storage(&self, method: Method, bucket: &str, name: &str) -> RestRequest {
		let bearer = self.session.access_token().unwrap_or_else(|| self.anon_key.clone());
		self.request(method, &format!("storage/v1/object/{bucket}/{name}"), &bearer)
	}

	/// Auth endpoints are called with explicit tokens since the session may not be installed yet.
	pub fn auth_request(&self, method: Method, endpoint: &str, access_token: &str) -> RestRequest {
		self.request(method, &format!("auth/v1/{endpoint}"), access_token)
	}

	pub fn public_object_url(&self, bucket: &str, name: &str) -> String {
		format!("{}storage/v1/object/public/{bucket}/{name}", self.base_url)
	}

	/// The realtime websocket lives on the same host, with the anonymous key as query parameter.
	pub fn realtime_endpoint(&self) -> Result<Url, GatewayError> {
		let mut endpoint = self
			.base_url
			.join("realtime/v1/websocket")
			.unavailable("Invalid realtime URL")?;
		let scheme = if endpoint.scheme() == "http" { "ws" } else { "wss" };
		endpoint
			.set_scheme(scheme)
			.map_err(|()| GatewayError::Unavailable(anyhow!("Backend URL can't be turned into a websocket URL")))?;
		endpoint
			.query_pairs_mut()
			.append_pair(API_KEY, &self.anon_key)
			.append_pair("vsn", "1.0.0");
		Ok(endpoint)
	}

	fn request(&self, method: Method, path: &str, bearer: &str) -> RestRequest {
		let description = format!("{method} {path}");
		let url = match self.base_url.join(path) {
			Ok(url) => url,
			// base URLs are checked on construction
			Err(_) => self.base_url.clone(),
		};

		let builder = self
			.client
			.request(method, url)
			.header(API_KEY, &self.anon_key)
			.header(AUTHORIZATION, format!("Bearer {bearer}"));

		RestRequest { builder, description }
	}
}

impl RestRequest {
	pub fn query<Query: Serialize + ?Sized>(mut self, query: &Query) -> Self {
		self.builder = self.builder.query(query);
		self
	}

	pub fn json<Body: Serialize + ?Sized>(mut self, body: &Body) -> Self {
		self.builder = self.builder.json(body);
		self
	}

	pub fn body(mut self, data: Vec<u8>) -> Self {
		self.builder = self.builder.body(data);
		self
	}

	pub fn content_type(mut self, content_type: &str) -> Self {
		if let Ok(content_type) = HeaderValue::from_str(content_type) {
			self.builder = self.builder.header(CONTENT_TYPE, content_type);
		}
		self
	}

	/// Inserted rows are sent back in the response.
	pub fn returning_representation(mut self) -> Self {
		self.builder = self.builder.header(PREFER, "return=representation");
		self
	}

	/// Inserts, or updates the row with the same primary key.
	pub fn merging_duplicates(mut self) -> Self {
		self.builder = self
			.builder
			.header(PREFER, "return=representation,resolution=merge-duplicates");
		self
	}

	pub async fn send_json<Response: DeserializeOwned>(self) -> Result<Response, GatewayError> {
		let description = self.description.clone();
		let body = self.send().await?;
		serde_json::from_str(&body).map_err(|error| GatewayError::Decode(anyhow!("{description}: {error}")))
	}

	pub async fn send_empty(self) -> Result<(), GatewayError> {
		self.send().await.map(|_| ())
	}

	async fn send(self) -> Result<String, GatewayError> {
		debug!(request = self.description, "Calling backend.");
		let response = self.builder.send().await?;
		let status = response.status();
		let body = response.text().await?;

		if status.is_success() {
			Ok(body)
		} else {
			debug!(request = self.description, %status, "Backend refused request.");
			Err(remote_error(status, &body))
		}
	}
}

/// Inserts with `return=representation` answer with an array holding the written row.
pub(crate) fn first_row<Row>(rows: Vec<Row>, table: &str) -> Result<Row, GatewayError> {
	rows.into_iter()
		.next()
		.ok_or_else(|| GatewayError::Decode(anyhow!("Write to {table} returned no row")))
}
