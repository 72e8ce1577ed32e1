use crate::chat::ChatRoom;
use crate::chat::lifecycle::SubscriptionState;
use crate::chat::model::ChatEntry;
use crate::configuration::Configuration;
use crate::context::ApplicationContext;
use crate::error::ScholarflowError;
use crate::feed::Feed;
use crate::forum::Forums;
use crate::gateway::auth::AuthUser;
use crate::image::Image;
use crate::profile::{ProfileDraft, ProfileSetup};
use crate::proxy::{AuthOutcome, AuthRequest};
use crate::session::SessionError;
use crate::session::state::SessionState;
use crate::tutor::Tutor;
use crate::types::uuid::Uuid;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser)]
pub struct Commandline {
	#[clap(short = 'c', long = "config-file", default_value = "configuration.toml")]
	pub configuration_file_path: String,
	#[clap(subcommand)]
	pub command: BaseCommand,
}

#[derive(clap::Args)]
pub struct Credentials {
	#[clap(long, env = "SCHOLARFLOW_EMAIL")]
	pub email: String,
	#[clap(long, env = "SCHOLARFLOW_PASSWORD", hide_env_values = true)]
	pub password: String,
}

#[derive(clap::Subcommand)]
pub enum BaseCommand {
	/// Print the configuration
	Configuration,
	/// Create an account, a one time code is sent by mail
	Signup {
		#[clap(flatten)]
		credentials: Credentials,
	},
	/// Confirm an account with the one time code from the signup mail
	Verify {
		#[clap(long, env = "SCHOLARFLOW_EMAIL")]
		email: String,
		code: String,
	},
	/// Set up the own profile
	Profile {
		#[clap(flatten)]
		credentials: Credentials,
		#[clap(long)]
		full_name: String,
		#[clap(long)]
		username: String,
		#[clap(long)]
		bio: Option<String>,
		/// Image file to use as avatar
		#[clap(long)]
		avatar: Option<PathBuf>,
	},
	/// Show the own profile and posts
	Me {
		#[clap(flatten)]
		credentials: Credentials,
	},
	/// End the session on the backend
	Logout {
		#[clap(flatten)]
		credentials: Credentials,
	},
	/// List all forums, newest first
	Forums {
		#[clap(flatten)]
		credentials: Credentials,
	},
	/// Create a forum and print its invite code
	CreateForum {
		#[clap(flatten)]
		credentials: Credentials,
		name: String,
	},
	/// Chat in a forum, every line read from stdin is sent as a message
	Chat {
		#[clap(flatten)]
		credentials: Credentials,
		#[clap(required_unless_present = "invite_code")]
		room: Option<Uuid>,
		#[clap(long, conflicts_with = "room")]
		invite_code: Option<String>,
	},
	/// Show the home feed or, with --user, someone's page
	Feed {
		#[clap(flatten)]
		credentials: Credentials,
		#[clap(long)]
		user: Option<Uuid>,
	},
	/// Publish a post with an image and a caption
	Publish {
		#[clap(flatten)]
		credentials: Credentials,
		#[clap(long)]
		image: PathBuf,
		caption: String,
	},
	/// Ask the AI tutor a question, optionally about an image
	Ask {
		#[clap(long)]
		image: Option<PathBuf>,
		#[clap(default_value = "")]
		question: String,
	},
	/// Let the AI tutor explain a post from the home feed
	Analyze {
		#[clap(flatten)]
		credentials: Credentials,
		post: i64,
	},
}

impl Commandline {
	pub async fn run(self) -> Result<(), ScholarflowError> {
		let configuration = Configuration::from_file(&self.configuration_file_path)?;

		tracing_subscriber::fmt()
			.with_env_filter(EnvFilter::new(&configuration.log_filters))
			.with_writer(std::io::stderr)
			.init();

		if let BaseCommand::Configuration = self.command {
			println!("{configuration:?}");
			return Ok(());
		}

		let context = ApplicationContext::new(configuration).await?;
		match self.command {
			BaseCommand::Configuration => {}
			BaseCommand::Signup { credentials } => signup(&context, credentials).await?,
			BaseCommand::Verify { email, code } => {
				let outcome = context
					.authenticator
					.authenticate(AuthRequest::Verify { email, token: code })
					.await?;
				start_session(&context, outcome).await?;
			}
			BaseCommand::Profile {
				credentials,
				full_name,
				username,
				bio,
				avatar,
			} => {
				sign_in(&context, credentials).await?;
				let avatar = match avatar {
					Some(path) => Some(Image::read(path).await?),
					None => None,
				};
				let setup = ProfileSetup::new(context.gateway.clone(), context.session.clone());
				let profile = setup
					.save(ProfileDraft {
						full_name,
						username,
						bio,
						avatar,
					})
					.await?;
				println!("Profile of @{} saved.", profile.username);
			}
			BaseCommand::Me { credentials } => {
				let user = sign_in(&context, credentials).await?;
				let setup = ProfileSetup::new(context.gateway.clone(), context.session.clone());
				let Some(profile) = setup.own_profile() else {
					println!("No profile yet, set one up with `scholarflow profile`.");
					return Ok(());
				};
				println!(
					"@{} {}",
					profile.username,
					profile.full_name.as_deref().unwrap_or_default()
				);
				if let Some(bio) = &profile.bio {
					println!("{bio}");
				}
				let page = Feed::new(context.gateway.clone()).user_page(user.uuid).await?;
				for post in page.posts {
					println!("#{} {}  {}", post.id, post.caption, post.image_url);
				}
			}
			BaseCommand::Logout { credentials } => {
				sign_in(&context, credentials).await?;
				context.session.sign_out().await?;
				println!("Signed out.");
			}
			BaseCommand::Forums { credentials } => {
				sign_in(&context, credentials).await?;
				for room in Forums::new(context.gateway.clone()).list().await? {
					println!("{}  {}  [{}]", room.uuid, room.name, room.invite_code);
				}
			}
			BaseCommand::CreateForum { credentials, name } => {
				let user = sign_in(&context, credentials).await?;
				let room = Forums::new(context.gateway.clone()).create(&name, user.uuid).await?;
				println!("Created {} ({}), invite code: {}", room.name, room.uuid, room.invite_code);
			}
			BaseCommand::Chat {
				credentials,
				room,
				invite_code,
			} => {
				let user = sign_in(&context, credentials).await?;
				let room_uuid = match (room, invite_code) {
					(Some(room_uuid), _) => room_uuid,
					(None, invite_code) => {
						Forums::new(context.gateway.clone())
							.join_by_code(&invite_code.unwrap_or_default())
							.await?
							.uuid
					}
				};
				chat(&context, &user, room_uuid).await?;
			}
			BaseCommand::Feed { credentials, user } => {
				sign_in(&context, credentials).await?;
				let feed = Feed::new(context.gateway.clone());
				match user {
					Some(user_uuid) => {
						let page = feed.user_page(user_uuid).await?;
						println!("@{} ({} posts)", page.profile.username, page.posts.len());
						for post in page.posts {
							println!("#{} {}  {}", post.id, post.caption, post.image_url);
						}
					}
					None => {
						for entry in feed.home().await? {
							let author = entry.author.map_or_else(|| "unknown".to_owned(), |author| author.username);
							println!("#{} @{author}: {}  {}", entry.post.id, entry.post.caption, entry.post.image_url);
						}
					}
				}
			}
			BaseCommand::Publish {
				credentials,
				image,
				caption,
			} => {
				let user = sign_in(&context, credentials).await?;
				let image = Image::read(image).await?;
				let post = Feed::new(context.gateway.clone())
					.publish(user.uuid, Some(image), &caption)
					.await?;
				println!("Published post #{}.", post.id);
			}
			BaseCommand::Ask { image, question } => {
				let image = match image {
					Some(path) => Some(Image::read(path).await?),
					None => None,
				};
				let mut tutor = Tutor::new(context.assistant.clone());
				if let Some(reply) = tutor.ask(&question, image).await {
					println!("{}", reply.text);
				}
			}
			BaseCommand::Analyze { credentials, post } => {
				sign_in(&context, credentials).await?;
				let home = Feed::new(context.gateway.clone()).home().await?;
				let Some(entry) = home.into_iter().find(|entry| entry.post.id == post) else {
					println!("There is no post #{post}.");
					return Ok(());
				};
				let mut tutor = Tutor::new(context.assistant.clone());
				if let Some(reply) = tutor.analyze_post(&entry.post).await {
					println!("{}", reply.text);
				}
			}
		}
		Ok(())
	}
}

async fn signup(context: &ApplicationContext, credentials: Credentials) -> Result<(), ScholarflowError> {
	let Credentials { email, password } = credentials;
	let outcome = context
		.authenticator
		.authenticate(AuthRequest::Signup { email, password })
		.await?;
	if outcome == AuthOutcome::OtpSent {
		println!("Account created, confirm it with the code sent to your mail: scholarflow verify <code>");
		return Ok(());
	}
	start_session(context, outcome).await?;
	Ok(())
}

async fn sign_in(context: &ApplicationContext, credentials: Credentials) -> Result<AuthUser, ScholarflowError> {
	let Credentials { email, password } = credentials;
	let outcome = context
		.authenticator
		.authenticate(AuthRequest::Login { email, password })
		.await?;
	start_session(context, outcome).await
}

async fn start_session(context: &ApplicationContext, outcome: AuthOutcome) -> Result<AuthUser, ScholarflowError> {
	let AuthOutcome::SignedIn(tokens) = outcome else {
		return Err(SessionError::SignedOut.into());
	};

	match context.session.sign_in(tokens).await? {
		SessionState::NeedsProfile { user } => {
			info!(user = %user.uuid, "No profile yet, set one up with `scholarflow profile`.");
			Ok(user)
		}
		SessionState::Ready { user, profile } => {
			info!(user = %user.uuid, username = profile.username, "Signed in.");
			Ok(user)
		}
		SessionState::Loading | SessionState::SignedOut => Err(SessionError::SignedOut.into()),
	}
}

async fn chat(context: &ApplicationContext, user: &AuthUser, room_uuid: Uuid) -> Result<(), ScholarflowError> {
	let mut room = ChatRoom::new(
		context.gateway.clone(),
		context.configuration.event_buffer,
		context.configuration.profile_cache_capacity,
	);
	room.enter_room(room_uuid).await?;

	let mut updates = room.updates();
	let mut printed = print_entries(&room.messages(), 0);
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		tokio::select! {
			changed = updates.changed() => {
				if changed.is_err() {
					break;
				}
				printed = print_entries(&room.messages(), printed);
				if room.state() != SubscriptionState::Open {
					eprintln!("Connection to the room was lost.");
					break;
				}
			}
			line = lines.next_line() => {
				let Some(line) = line? else {
					break;
				};
				room.send_message(room_uuid, user.uuid, &line).await?;
			}
		}
	}

	room.leave().await?;
	Ok(())
}

/// Prints the entries after the first `printed` ones and returns how many are printed by now.
fn print_entries(entries: &[ChatEntry], printed: usize) -> usize {
	// the list only shrinks when it is cleared
	let start = if entries.len() < printed { 0 } else { printed };
	for entry in &entries[start..] {
		println!(
			"[{}] {}: {}",
			entry.message.created_at.format("%H:%M"),
			entry.author_name(),
			entry.message.body
		);
	}
	entries.len()
}

#[cfg(test)]
mod test {
	use super::*;
	use clap::Parser;

	#[test]
	fn should_parse_chat_by_invite_code() {
		let commandline = Commandline::try_parse_from([
			"scholarflow",
			"chat",
			"--email",
			"ferris@example.org",
			"--password",
			"secret",
			"--invite-code",
			"abc123",
		])
		.expect("Failed to parse commandline");

		assert!(matches!(
			commandline.command,
			BaseCommand::Chat { room: None, invite_code: Some(code), .. } if code == "abc123"
		));
		assert_eq!("configuration.toml", commandline.configuration_file_path);
	}

	#[test]
	fn should_parse_me_and_logout() {
		let me = Commandline::try_parse_from(["scholarflow", "me", "--email", "ferris@example.org", "--password", "secret"])
			.expect("Failed to parse commandline");
		let logout =
			Commandline::try_parse_from(["scholarflow", "logout", "--email", "ferris@example.org", "--password", "secret"])
				.expect("Failed to parse commandline");

		assert!(matches!(me.command, BaseCommand::Me { .. }));
		assert!(matches!(logout.command, BaseCommand::Logout { .. }));
	}

	#[test]
	fn should_require_room_or_invite_code() {
		let result = Commandline::try_parse_from([
			"scholarflow",
			"chat",
			"--email",
			"ferris@example.org",
			"--password",
			"secret",
		]);

		assert!(result.is_err());
	}

	#[test]
	fn should_parse_ask_with_image() {
		let commandline =
			Commandline::try_parse_from(["scholarflow", "-c", "other.toml", "ask", "--image", "cell.png", "What is this?"])
				.expect("Failed to parse commandline");

		assert_eq!("other.toml", commandline.configuration_file_path);
		assert!(matches!(
			commandline.command,
			BaseCommand::Ask { image: Some(image), question } if image == PathBuf::from("cell.png") && question == "What is this?"
		));
	}
}
