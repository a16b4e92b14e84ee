use teloxide::types::{Message, PhotoSize};

pub trait MessageStuff {
    /// Telegram sends every photo in several resolutions. Returns the biggest one, if this
    /// message has a photo at all.
    fn find_biggest_photo(&self) -> Option<&PhotoSize>;
}

impl MessageStuff for Message {
    fn find_biggest_photo(&self) -> Option<&PhotoSize> {
        self.photo()?.iter().max_by_key(|x| x.width + x.height)
    }
}

/// Formats an optional username as a `@handle`, or `fallback` if there is none.
#[must_use]
pub fn handle_or(username: Option<&str>, fallback: &str) -> String {
    match username {
        Some(username) if !username.is_empty() => format!("@{username}"),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::handle_or;

    #[test]
    fn handles() {
        assert_eq!(handle_or(Some("amogus"), "none"), "@amogus");
        assert_eq!(handle_or(None, "none"), "none");
        assert_eq!(handle_or(Some(""), "nobody"), "nobody");
    }
}
