use crate::chat::error::ChatError;
use crate::configuration::ConfigurationError;
use crate::feed::FeedError;
use crate::forum::ForumError;
use crate::gateway::error::GatewayError;
use crate::profile::ProfileSetupError;
use crate::proxy::ProxyError;
use crate::session::SessionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScholarflowError {
	#[error("Failed to load configuration: {0}")]
	Configuration(#[from] ConfigurationError),
	#[error("Backend error: {0}")]
	Gateway(#[from] GatewayError),
	#[error("Proxy error: {0}")]
	Proxy(#[from] ProxyError),
	#[error("Session error: {0}")]
	Session(#[from] SessionError),
	#[error("Chat error: {0}")]
	Chat(#[from] ChatError),
	#[error("Forum error: {0}")]
	Forum(#[from] ForumError),
	#[error("Feed error: {0}")]
	Feed(#[from] FeedError),
	#[error("Profile setup failed: {0}")]
	ProfileSetup(#[from] ProfileSetupError),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}
