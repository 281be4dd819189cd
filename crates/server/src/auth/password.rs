use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::seq::SliceRandom;
use rand::Rng;

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Length of generated passwords.
pub const GENERATED_PASSWORD_LEN: usize = 12;

// No 0/O, 1/l/I.
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";

/// Random password from an unambiguous alphabet, always containing at least
/// one lowercase letter, one uppercase letter and one digit.
pub fn generate_password() -> String {
    generate_password_with(&mut rand::thread_rng())
}

pub fn generate_password_with<R: Rng>(rng: &mut R) -> String {
    let pick = |rng: &mut R, set: &[u8]| set[rng.gen_range(0..set.len())];

    let mut chars = vec![pick(rng, LOWER), pick(rng, UPPER), pick(rng, DIGITS)];
    let all: Vec<u8> = [LOWER, UPPER, DIGITS].concat();
    while chars.len() < GENERATED_PASSWORD_LEN {
        chars.push(pick(rng, &all));
    }
    chars.shuffle(rng);

    chars.into_iter().map(char::from).collect()
}
