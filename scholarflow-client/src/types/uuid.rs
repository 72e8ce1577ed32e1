use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::{Database, Decode, Encode};
use std::str::FromStr;

/// Identifier of every row the backend hands out (users, rooms, messages).
#[derive(
	derive_more::From,
	derive_more::Into,
	derive_more::Deref,
	derive_more::Display,
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	PartialOrd,
	Ord,
	Hash,
	Serialize,
	Deserialize,
)]
#[serde(transparent)]
pub struct Uuid(uuid::Uuid);

impl Uuid {
	pub fn new_v4() -> Self {
		Self(uuid::Uuid::new_v4())
	}
}

impl FromStr for Uuid {
	type Err = uuid::Error;

	fn from_str(text: &str) -> Result<Self, Self::Err> {
		text.parse().map(Uuid)
	}
}

impl<'r, Db> Decode<'r, Db> for Uuid
where
	Db: Database,
	uuid::Uuid: Decode<'r, Db>,
{
	fn decode(value: <Db as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
		uuid::Uuid::decode(value).map(Uuid)
	}
}

impl<'q, Db> Encode<'q, Db> for Uuid
where
	Db: Database,
	uuid::Uuid: Encode<'q, Db>,
{
	fn encode_by_ref(&self, buffer: &mut <Db as Database>::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
		self.0.encode_by_ref(buffer)
	}
}

impl<Db> sqlx::Type<Db> for Uuid
where
	Db: Database,
	uuid::Uuid: sqlx::Type<Db>,
{
	fn type_info() -> Db::TypeInfo {
		uuid::Uuid::type_info()
	}

	fn compatible(type_info: &Db::TypeInfo) -> bool {
		uuid::Uuid::compatible(type_info)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn should_serialize_as_plain_string() {
		let uuid = Uuid::from_str("5f0c3a5e-8d3b-4a55-9c5e-0b0e3f4a1c2d").expect("Failed to parse uuid");

		let json = serde_json::to_string(&uuid).expect("Failed to serialize uuid");

		assert_eq!(r#""5f0c3a5e-8d3b-4a55-9c5e-0b0e3f4a1c2d""#, json);
	}

	#[test]
	fn should_display_in_hyphenated_form() {
		let uuid = Uuid::from_str("5F0C3A5E-8D3B-4A55-9C5E-0B0E3F4A1C2D").expect("Failed to parse uuid");

		assert_eq!("5f0c3a5e-8d3b-4a55-9c5e-0b0e3f4a1c2d", uuid.to_string());
	}
}
