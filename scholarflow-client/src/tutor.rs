//! Conversation with the AI tutor.

use crate::feed::model::Post;
use crate::image::Image;
use crate::proxy::{Assistant, TutorRequest, TutorRole, TutorTurn};
use std::sync::Arc;
use tracing::warn;

pub const GREETING: &str = "Hi! I'm the ScholarFlow AI tutor. What are you stuck on?";
pub const APOLOGY: &str = "Sorry, the tutor can't answer right now. Please try again.";

/// Number of earlier turns sent along with a question.
const HISTORY_WINDOW: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speaker {
	Student,
	Tutor,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
	pub speaker: Speaker,
	pub text: String,
	pub has_image: bool,
}

impl Turn {
	fn tutor(text: impl Into<String>) -> Self {
		Self {
			speaker: Speaker::Tutor,
			text: text.into(),
			has_image: false,
		}
	}
}

impl From<&Turn> for TutorTurn {
	fn from(turn: &Turn) -> Self {
		let role = match turn.speaker {
			Speaker::Student => TutorRole::User,
			Speaker::Tutor => TutorRole::Model,
		};
		Self {
			role,
			text: turn.text.clone(),
		}
	}
}

pub struct Tutor {
	assistant: Arc<dyn Assistant>,
	turns: Vec<Turn>,
}

impl Tutor {
	pub fn new(assistant: Arc<dyn Assistant>) -> Self {
		Self {
			assistant,
			turns: vec![Turn::tutor(GREETING)],
		}
	}

	pub fn turns(&self) -> &[Turn] {
		&self.turns
	}

	pub fn clear(&mut self) {
		self.turns.clear();
	}

	/// Asks a question, optionally about an image, and returns the tutor's reply.
	///
	/// Without text and image there is nothing to ask and `None` is returned. A failing proxy
	/// doesn't fail the conversation, the tutor replies with an apology instead.
	pub async fn ask(&mut self, text: &str, image: Option<Image>) -> Option<&Turn> {
		let text = text.trim();
		if text.is_empty() && image.is_none() {
			return None;
		}

		let request = TutorRequest {
			prompt: text.to_owned(),
			history: self.history(),
			image: image.as_ref().map(Image::to_base64),
		};
		self.turns.push(Turn {
			speaker: Speaker::Student,
			text: text.to_owned(),
			has_image: image.is_some(),
		});

		let reply = match self.assistant.ask(&request).await {
			Ok(answer) => Turn::tutor(answer),
			Err(error) => {
				warn!(%error, "Tutor didn't answer.");
				Turn::tutor(APOLOGY)
			}
		};
		self.turns.push(reply);
		self.turns.last()
	}

	/// Asks the tutor to explain a post from the feed.
	pub async fn analyze_post(&mut self, post: &Post) -> Option<&Turn> {
		let prompt = format!(
			"This post has the caption \"{}\" and this image: {}. Please analyze it and explain it to me.",
			post.caption, post.image_url
		);
		self.ask(&prompt, None).await
	}

	fn history(&self) -> Vec<TutorTurn> {
		let start = self.turns.len().saturating_sub(HISTORY_WINDOW);
		self.turns[start..].iter().map(TutorTurn::from).collect()
	}
}
