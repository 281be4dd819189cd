//! Username generation for imported accounts.

use std::collections::HashSet;

use super::parse::fold_ascii;

pub const MAX_USERNAME_LEN: usize = 30;

fn truncate(name: &str, max: usize) -> &str {
    // Usernames are ASCII by construction, so byte slicing is safe.
    let cut = &name[..name.len().min(max)];
    cut.trim_end_matches('.')
}

/// `first.last` from a full name, ASCII-folded and lowercased.
///
/// Single-token names use the token; names without any usable character
/// become `user`.
pub fn base_username(full_name: &str) -> String {
    let folded = fold_ascii(full_name);
    let tokens: Vec<String> = folded
        .split_whitespace()
        .map(|t| t.chars().filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit()).collect::<String>())
        .filter(|t| !t.is_empty())
        .collect();

    let joined = match tokens.as_slice() {
        [] => return "user".to_string(),
        [only] => only.clone(),
        [first, .., last] => format!("{}.{}", first, last),
    };

    truncate(&joined, MAX_USERNAME_LEN).to_string()
}

/// Hands out unique usernames against a set of names already taken, either
/// in the database or earlier in the same batch.
#[derive(Debug, Default)]
pub struct UsernamePool {
    taken: HashSet<String>,
}

impl UsernamePool {
    pub fn new(existing: impl IntoIterator<Item = String>) -> Self {
        Self {
            taken: existing.into_iter().map(|u| u.to_lowercase()).collect(),
        }
    }

    /// Reserve a username for `full_name`. Collisions get the lowest free
    /// numeric suffix starting at 2, shortening the base to stay within
    /// [`MAX_USERNAME_LEN`].
    pub fn allocate(&mut self, full_name: &str) -> String {
        let base = base_username(full_name);
        if self.taken.insert(base.clone()) {
            return base;
        }

        let mut n: u32 = 2;
        loop {
            let suffix = n.to_string();
            let candidate = format!(
                "{}{}",
                truncate(&base, MAX_USERNAME_LEN - suffix.len()),
                suffix
            );
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
