use std::{fmt::Display, str::FromStr};

use crate::types::{ContentKind, ParseEnumError, SubmissionId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlTokenError {
    #[error("empty callback data")]
    Empty,
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("no submission ID")]
    MissingId,
    #[error("failed to parse submission ID {0:?}")]
    BadId(String),
    #[error("no content kind")]
    MissingKind,
    #[error(transparent)]
    BadKind(#[from] ParseEnumError),
    #[error("extraneous data in callback data")]
    Extraneous,
}

/// What an admin asked for by pressing a button under a submission.
///
/// Encoded as `approve_<id>_<kind>` and `reject_<id>`. Telegram only allows
/// 64 bytes of callback data, which this fits in with plenty to spare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    Approve { id: SubmissionId, kind: ContentKind },
    Reject { id: SubmissionId },
}

impl ControlToken {
    pub fn id(&self) -> SubmissionId {
        match self {
            ControlToken::Approve { id, .. } | ControlToken::Reject { id } => *id,
        }
    }
}

impl Display for ControlToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlToken::Approve { id, kind } => write!(f, "approve_{id}_{kind}"),
            ControlToken::Reject { id } => write!(f, "reject_{id}"),
        }
    }
}

impl FromStr for ControlToken {
    type Err = ControlTokenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut iter = value.split('_');
        let action = iter
            .next()
            .filter(|x| !x.is_empty())
            .ok_or(ControlTokenError::Empty)?;

        if action != "approve" && action != "reject" {
            return Err(ControlTokenError::UnknownAction(action.to_string()));
        }

        let id = iter.next().ok_or(ControlTokenError::MissingId)?;
        let id = SubmissionId(
            id.parse()
                .map_err(|_| ControlTokenError::BadId(id.to_string()))?,
        );

        let token = match action {
            "approve" => ControlToken::Approve {
                id,
                kind: iter.next().ok_or(ControlTokenError::MissingKind)?.parse()?,
            },
            _ => ControlToken::Reject { id },
        };

        if iter.next().is_some() {
            return Err(ControlTokenError::Extraneous);
        }

        Ok(token)
    }
}
