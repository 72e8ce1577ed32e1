use crate::configuration::{Backend, Configuration};
use crate::error::ScholarflowError;
use crate::gateway::Gateway;
use crate::gateway::hosted::HostedGateway;
use crate::gateway::local::LocalGateway;
use crate::proxy::{Assistant, Authenticator, ProxyClient};
use crate::session::SessionContext;
use std::sync::Arc;

/// Everything the screens share, wired up according to the configured backend.
pub struct ApplicationContext {
	pub configuration: Configuration,
	pub gateway: Arc<dyn Gateway>,
	pub authenticator: Arc<dyn Authenticator>,
	pub assistant: Arc<dyn Assistant>,
	pub session: Arc<SessionContext>,
}

impl ApplicationContext {
	pub async fn new(configuration: Configuration) -> Result<ApplicationContext, ScholarflowError> {
		let proxy = Arc::new(ProxyClient::new(&configuration.proxy_url, configuration.request_timeout)?);

		let gateway: Arc<dyn Gateway>;
		let authenticator: Arc<dyn Authenticator>;
		match &configuration.backend {
			Backend::Hosted {
				url,
				anon_key,
				heartbeat_interval,
			} => {
				gateway = Arc::new(HostedGateway::new(
					url,
					anon_key,
					configuration.request_timeout,
					*heartbeat_interval,
				)?);
				authenticator = proxy.clone();
			}
			// accounts live in the same database
			Backend::Local { database_url } => {
				let local = Arc::new(LocalGateway::connect(database_url).await?);
				gateway = local.clone();
				authenticator = local;
			}
		}
		let session = Arc::new(SessionContext::start(Arc::clone(&gateway)));

		Ok(Self {
			configuration,
			gateway,
			authenticator,
			assistant: proxy,
			session,
		})
	}
}
