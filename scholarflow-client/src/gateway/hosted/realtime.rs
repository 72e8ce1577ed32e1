//! Realtime change feed over the platform's Phoenix channel websocket.
//!
//! One connection is shared by all subscriptions and owned by a driver task. Subscribing and
//! releasing are commands to that task, answered once the server replied to the `phx_join` or
//! `phx_leave` frame. Every subscription of a room shares the room's channel.

use crate::chat::model::ChatMessage;
use crate::gateway::auth::SessionSlot;
use crate::gateway::error::{GatewayError, IntoGatewayResult};
use crate::gateway::realtime::{SubscriberRegistry, Subscription, SubscriptionId};
use crate::types::uuid::Uuid;
use anyhow::anyhow;
use futures_util::{Sink, SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const PHOENIX_TOPIC: &str = "phoenix";
const MINIMUM_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) struct RealtimeClient {
	endpoint: Url,
	acknowledgement_timeout: Duration,
	heartbeat_interval: Duration,
	session: Arc<SessionSlot>,
	subscribers: Arc<SubscriberRegistry>,
	connection: tokio::sync::Mutex<Option<mpsc::Sender<Command>>>,
}

impl RealtimeClient {
	pub fn new(
		endpoint: Url,
		acknowledgement_timeout: Duration,
		heartbeat_interval: Duration,
		session: Arc<SessionSlot>,
	) -> Self {
		Self {
			endpoint,
			acknowledgement_timeout,
			heartbeat_interval,
			session,
			subscribers: Default::default(),
			connection: Default::default(),
		}
	}

	pub async fn subscribe(&self, room_uuid: Uuid, buffer: usize) -> Result<Subscription, GatewayError> {
		let subscription = self.subscribers.register(room_uuid, buffer);
		let subscription_id = subscription.id();

		let commands = match self.connect().await {
			Ok(commands) => commands,
			Err(error) => {
				self.subscribers.remove(subscription_id);
				return Err(error);
			}
		};

		let access_token = self.session.access_token();
		let result = self
			.request(&commands, |acknowledge| Command::Join {
				room_uuid,
				subscription_id,
				access_token,
				acknowledge,
			})
			.await;

		match result {
			Ok(()) => {
				debug!(room = %room_uuid, subscription = %subscription_id, "Joined realtime channel.");
				Ok(subscription)
			}
			Err(error) => {
				// the join may still be in flight, a late reply must not keep the channel alive
				let _ = commands
					.send(Command::Leave {
						room_uuid,
						subscription_id,
						acknowledge: None,
					})
					.await;
				self.subscribers.remove(subscription_id);
				Err(error)
			}
		}
	}

	pub async fn unsubscribe(&self, subscription_id: SubscriptionId) -> Result<(), GatewayError> {
		let Some(room_uuid) = self.subscribers.room_of(subscription_id) else {
			debug!(subscription = %subscription_id, "Subscription was already released.");
			return Ok(());
		};

		let commands = self
			.connection
			.lock()
			.await
			.clone()
			.filter(|commands| !commands.is_closed());
		// without a connection there is no channel left to leave
		let result = match commands {
			Some(commands) => {
				self.request(&commands, |acknowledge| Command::Leave {
					room_uuid,
					subscription_id,
					acknowledge: Some(acknowledge),
				})
				.await
			}
			None => Ok(()),
		};

		self.subscribers.remove(subscription_id);
		result
	}

	/// The command sender of the live connection, connecting first if there is none.
	async fn connect(&self) -> Result<mpsc::Sender<Command>, GatewayError> {
		let mut connection = self.connection.lock().await;
		if let Some(commands) = connection.as_ref().filter(|commands| !commands.is_closed()) {
			return Ok(commands.clone());
		}

		let (socket, _response) = timeout(self.acknowledgement_timeout, connect_async(self.endpoint.as_str()))
			.await
			.map_err(|_| GatewayError::Unavailable(anyhow!("Timed out connecting to realtime endpoint")))?
			.unavailable("Failed to connect to realtime endpoint")?;
		info!(host = self.endpoint.host_str(), "Realtime connection established.");

		let (commands, receiver) = mpsc::channel(16);
		let driver = Driver::new(Arc::clone(&self.subscribers));
		tokio::spawn(drive(driver, socket, receiver, self.heartbeat_interval));
		*connection = Some(commands.clone());

		Ok(commands)
	}

	async fn request(
		&self,
		commands: &mpsc::Sender<Command>,
		command: impl FnOnce(oneshot::Sender<Result<(), GatewayError>>) -> Command,
	) -> Result<(), GatewayError> {
		let (acknowledge, acknowledgement) = oneshot::channel();
		commands
			.send(command(acknowledge))
			.await
			.map_err(|_| GatewayError::Unavailable(anyhow!("Realtime connection is closed")))?;

		match timeout(self.acknowledgement_timeout, acknowledgement).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(GatewayError::Unavailable(anyhow!(
				"Realtime connection closed before acknowledging"
			))),
			Err(_) => Err(GatewayError::Unavailable(anyhow!(
				"Timed out waiting for realtime acknowledgement"
			))),
		}
	}
}

async fn drive<Socket>(
	mut driver: Driver,
	socket: Socket,
	mut commands: mpsc::Receiver<Command>,
	heartbeat_interval: Duration,
) where
	Socket: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
		+ Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
		+ Unpin,
{
	let (mut sink, mut stream) = socket.split();
	let heartbeat_interval = heartbeat_interval.max(MINIMUM_HEARTBEAT_INTERVAL);
	let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);

	loop {
		let outgoing = tokio::select! {
			command = commands.recv() => match command {
				Some(command) => driver.on_command(command),
				None => break,
			},
			message = stream.next() => match message {
				Some(Ok(Message::Text(text))) => driver.on_text(text.as_str()),
				Some(Ok(Message::Close(_))) | None => {
					info!("Realtime connection closed by server.");
					break;
				}
				Some(Ok(_)) => None,
				Some(Err(error)) => {
					warn!(%error, "Realtime connection failed.");
					break;
				}
			},
			_ = heartbeat.tick() => Some(Frame::heartbeat(driver.next_reference())),
		};

		if let Some(frame) = outgoing {
			if let Err(error) = send_frame(&mut sink, &frame).await {
				warn!(%error, event = frame.event, "Failed to send realtime frame.");
				break;
			}
		}
	}

	driver.shut_down();
}

async fn send_frame<Output>(sink: &mut Output, frame: &Frame) -> Result<(), GatewayError>
where
	Output: Sink<Message> + Unpin,
	Output::Error: std::error::Error + Send + Sync + 'static,
{
	let text = serde_json::to_string(frame).decode_error("Failed to encode realtime frame")?;
	sink.send(Message::text(text))
		.await
		.unavailable("Failed to write to realtime connection")
}

type Acknowledge = oneshot::Sender<Result<(), GatewayError>>;

enum Command {
	Join {
		room_uuid: Uuid,
		subscription_id: SubscriptionId,
		access_token: Option<String>,
		acknowledge: Acknowledge,
	},
	/// Without `acknowledge` this withdraws a join that wasn't acknowledged in time.
	Leave {
		room_uuid: Uuid,
		subscription_id: SubscriptionId,
		acknowledge: Option<Acknowledge>,
	},
}

enum PendingReply {
	Join { topic: String },
	Leave { acknowledge: Option<Acknowledge> },
}

/// Channel bookkeeping of one connection.
struct Driver {
	subscribers: Arc<SubscriberRegistry>,
	next_reference: u64,
	channels: HashMap<String, HashSet<SubscriptionId>>,
	/// Subscriptions waiting for the reply to their topic's only `phx_join`.
	joining: HashMap<String, Vec<(SubscriptionId, Acknowledge)>>,
	pending: HashMap<String, PendingReply>,
}

impl Driver {
	fn new(subscribers: Arc<SubscriberRegistry>) -> Self {
		Self {
			subscribers,
			next_reference: 1,
			channels: Default::default(),
			joining: Default::default(),
			pending: Default::default(),
		}
	}

	fn next_reference(&mut self) -> String {
		let reference = self.next_reference;
		self.next_reference += 1;
		reference.to_string()
	}

	/// Returns the frame to send for the command, if any.
	fn on_command(&mut self, command: Command) -> Option<Frame> {
		match command {
			Command::Join {
				room_uuid,
				subscription_id,
				access_token,
				acknowledge,
			} => {
				let topic = room_topic(room_uuid);
				if let Some(subscriptions) = self.channels.get_mut(&topic) {
					subscriptions.insert(subscription_id);
					let _ = acknowledge.send(Ok(()));
					return None;
				}
				if let Some(waiting) = self.joining.get_mut(&topic) {
					waiting.push((subscription_id, acknowledge));
					return None;
				}

				let reference = self.next_reference();
				let frame = Frame::join(room_uuid, access_token.as_deref(), reference.clone());
				self.joining.insert(topic.clone(), vec![(subscription_id, acknowledge)]);
				self.pending.insert(reference, PendingReply::Join { topic });
				Some(frame)
			}
			Command::Leave {
				room_uuid,
				subscription_id,
				acknowledge,
			} => {
				let topic = room_topic(room_uuid);
				if let Some(waiting) = self.joining.get_mut(&topic) {
					// the join reply decides about the channel once it arrives
					waiting.retain(|(waiting_id, _)| *waiting_id != subscription_id);
					acknowledge_leave(acknowledge);
					return None;
				}

				let Some(subscriptions) = self.channels.get_mut(&topic) else {
					acknowledge_leave(acknowledge);
					return None;
				};
				if !subscriptions.remove(&subscription_id) || !subscriptions.is_empty() {
					acknowledge_leave(acknowledge);
					return None;
				}

				self.channels.remove(&topic);
				Some(self.leave_channel(topic, acknowledge))
			}
		}
	}

	fn leave_channel(&mut self, topic: String, acknowledge: Option<Acknowledge>) -> Frame {
		let reference = self.next_reference();
		self.pending
			.insert(reference.clone(), PendingReply::Leave { acknowledge });
		Frame::leave(topic, reference)
	}

	/// Returns the frame to send in response, if any.
	fn on_text(&mut self, text: &str) -> Option<Frame> {
		let frame = match serde_json::from_str::<Frame>(text) {
			Ok(frame) => frame,
			Err(error) => {
				warn!(%error, "Received malformed realtime frame.");
				return None;
			}
		};

		match frame.classify() {
			Incoming::Reply { reference, result } => self.on_reply(reference, result),
			Incoming::Insert(message) => {
				self.subscribers.publish(&message);
				None
			}
			Incoming::ChannelClosed { topic } => {
				warn!(topic, "Realtime channel was closed by the server.");
				for subscription_id in self.channels.remove(&topic).unwrap_or_default() {
					self.subscribers.remove(subscription_id);
				}
				for (subscription_id, acknowledge) in self.joining.remove(&topic).unwrap_or_default() {
					self.subscribers.remove(subscription_id);
					let _ = acknowledge.send(Err(GatewayError::Unavailable(anyhow!("Realtime channel was closed"))));
				}
				None
			}
			Incoming::Ignored => None,
		}
	}

	fn on_reply(&mut self, reference: String, result: Result<(), String>) -> Option<Frame> {
		let Some(pending) = self.pending.remove(&reference) else {
			// heartbeat replies
			return None;
		};

		match pending {
			PendingReply::Join { topic } => {
				let waiting = self.joining.remove(&topic).unwrap_or_default();
				match result {
					Ok(()) if waiting.is_empty() => {
						debug!(topic, "Joined channel nobody waits for anymore, leaving it.");
						Some(self.leave_channel(topic, None))
					}
					Ok(()) => {
						let subscriptions = self.channels.entry(topic).or_default();
						for (subscription_id, acknowledge) in waiting {
							subscriptions.insert(subscription_id);
							let _ = acknowledge.send(Ok(()));
						}
						None
					}
					Err(reason) => {
						for (_, acknowledge) in waiting {
							let _ = acknowledge.send(Err(GatewayError::Rejected(reason.clone())));
						}
						None
					}
				}
			}
			PendingReply::Leave { acknowledge } => {
				if let Err(reason) = result {
					debug!(reason, "Server refused leaving channel, it's gone anyway.");
				}
				acknowledge_leave(acknowledge);
				None
			}
		}
	}

	/// Fails everything in flight and ends the queues of every subscription of this connection.
	fn shut_down(&mut self) {
		for (_, waiting) in self.joining.drain() {
			for (_, acknowledge) in waiting {
				let _ = acknowledge.send(Err(GatewayError::Unavailable(anyhow!("Realtime connection closed"))));
			}
		}

		for (_, pending) in self.pending.drain() {
			if let PendingReply::Leave { acknowledge } = pending {
				acknowledge_leave(acknowledge);
			}
		}

		for subscription_id in self.channels.drain().flat_map(|(_, subscriptions)| subscriptions) {
			self.subscribers.remove(subscription_id);
		}
	}
}

fn acknowledge_leave(acknowledge: Option<Acknowledge>) {
	if let Some(acknowledge) = acknowledge {
		let _ = acknowledge.send(Ok(()));
	}
}

fn room_topic(room_uuid: Uuid) -> String {
	format!("realtime:room_{room_uuid}")
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct Frame {
	topic: String,
	event: String,
	payload: Value,
	#[serde(rename = "ref")]
	reference: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Incoming {
	Reply { reference: String, result: Result<(), String> },
	Insert(ChatMessage),
	ChannelClosed { topic: String },
	Ignored,
}

impl Frame {
	fn join(room_uuid: Uuid, access_token: Option<&str>, reference: String) -> Self {
		let mut payload = json!({
			"config": {
				"broadcast": {"self": false},
				"presence": {"key": ""},
				"postgres_changes": [{
					"event": "INSERT",
					"schema": "public",
					"table": "forum_messages",
					"filter": format!("forum_id=eq.{room_uuid}"),
				}],
			},
		});
		if let Some(access_token) = access_token {
			payload["access_token"] = json!(access_token);
		}

		Self {
			topic: room_topic(room_uuid),
			event: "phx_join".to_owned(),
			payload,
			reference: Some(reference),
		}
	}

	fn leave(topic: String, reference: String) -> Self {
		Self {
			topic,
			event: "phx_leave".to_owned(),
			payload: json!({}),
			reference: Some(reference),
		}
	}

	fn heartbeat(reference: String) -> Self {
		Self {
			topic: PHOENIX_TOPIC.to_owned(),
			event: "heartbeat".to_owned(),
			payload: json!({}),
			reference: Some(reference),
		}
	}

	fn classify(self) -> Incoming {
		match self.event.as_str() {
			"phx_reply" => {
				let Some(reference) = self.reference else {
					return Incoming::Ignored;
				};
				let result = match self.payload["status"].as_str() {
					Some("ok") => Ok(()),
					status => Err(self.payload["response"]["reason"]
						.as_str()
						.or(status)
						.unwrap_or("unknown error")
						.to_owned()),
				};
				Incoming::Reply { reference, result }
			}
			"postgres_changes" => {
				let record = self.payload["data"]["record"].clone();
				match serde_json::from_value(record) {
					Ok(message) => Incoming::Insert(message),
					Err(error) => {
						warn!(topic = self.topic, %error, "Received undecodable insert event.");
						Incoming::Ignored
					}
				}
			}
			"phx_error" | "phx_close" if self.topic != PHOENIX_TOPIC => Incoming::ChannelClosed { topic: self.topic },
			_ => Incoming::Ignored,
		}
	}
}
