#[cfg(test)]
#[path = "ids_test.rs"]
mod tests;

use rand::Rng;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const ID_LENGTH: usize = 20;

/// Random base-62 id of `length` characters.
pub fn uuid_with_length(length: usize) -> String {
    let mut rng = rand::thread_rng();
    return (0..length)
        .map(|_| return ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect::<String>();
}

/// Id used for sessions, chat items and optimistic sources.
pub fn uuid() -> String {
    return uuid_with_length(ID_LENGTH);
}
