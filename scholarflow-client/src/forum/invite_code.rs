use rand::Rng;

pub const INVITE_CODE_LENGTH: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random code of upper case letters and digits that lets others join a room.
pub fn generate_invite_code() -> String {
	let mut rng = rand::rng();
	(0..INVITE_CODE_LENGTH)
		.map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
		.collect()
}
