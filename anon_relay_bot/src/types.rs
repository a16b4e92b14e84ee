use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use teloxide::types::{User, UserId};

/// ID of a submission in the database. Also what the approve/reject buttons refer to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubmissionId(pub i64);

impl Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Failed to parse a string into one of the enums here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: {value:?}")]
pub struct ParseEnumError {
    what: &'static str,
    value: String,
}

/// Kind of a submission's content.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Animation,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
            ContentKind::Animation => "animation",
        }
    }
}

impl FromStr for ContentKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "text" => ContentKind::Text,
            "photo" => ContentKind::Photo,
            "video" => ContentKind::Video,
            "animation" => ContentKind::Animation,
            _ => {
                return Err(ParseEnumError {
                    what: "content kind",
                    value: s.to_string(),
                })
            }
        })
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media kinds the bot is willing to relay.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    /// A GIF, or rather an MP4 without sound, as Telegram does them.
    Animation,
}

impl From<MediaKind> for ContentKind {
    fn from(value: MediaKind) -> Self {
        match value {
            MediaKind::Photo => ContentKind::Photo,
            MediaKind::Video => ContentKind::Video,
            MediaKind::Animation => ContentKind::Animation,
        }
    }
}

/// Contents of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text {
        text: String,
    },
    Media {
        kind: MediaKind,
        /// Telegram file ID. The file itself stays on Telegram's servers.
        media_ref: String,
        /// May be empty.
        caption: String,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Content {
        Content::Text { text: text.into() }
    }

    pub fn media(kind: MediaKind, media_ref: impl Into<String>, caption: impl Into<String>) -> Content {
        Content::Media {
            kind,
            media_ref: media_ref.into(),
            caption: caption.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Text { .. } => ContentKind::Text,
            Content::Media { kind, .. } => (*kind).into(),
        }
    }
}

/// Where a submission is in its lifecycle. Both `Approved` and `Rejected` are final.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Status::Pending,
            "approved" => Status::Approved,
            "rejected" => Status::Rejected,
            _ => {
                return Err(ParseEnumError {
                    what: "status",
                    value: s.to_string(),
                })
            }
        })
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submission as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub content: Content,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Who sent a submission. Only ever shown to admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub display_name: String,
    pub username: Option<String>,
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Sender {
            id: user.id,
            display_name: user.full_name(),
            username: user.username.clone(),
        }
    }
}
