use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 6;

/// Generate a workflow instance id of the form
/// `<kind>-<unix millis>-<6 random base36 chars>`.
///
/// Uniqueness is probabilistic, not guaranteed; ids embed their creation
/// time so listings sort chronologically.
pub fn workflow_instance_id(kind: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{kind}-{}-{suffix}", Utc::now().timestamp_millis())
}
