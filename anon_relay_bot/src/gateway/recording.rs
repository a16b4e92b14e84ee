//! A [`Gateway`] that writes down everything instead of talking to Telegram.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
};

use teloxide::{
    types::{ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId},
    ApiError, RequestError,
};

use super::{Gateway, MessageEdit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text {
        chat: ChatId,
        text: String,
        /// Callback data of the buttons, if any.
        controls: Vec<String>,
    },
    Photo {
        chat: ChatId,
        photo: String,
        caption: String,
        controls: Vec<String>,
    },
    Video {
        chat: ChatId,
        video: String,
        caption: String,
        controls: Vec<String>,
    },
    Animation {
        chat: ChatId,
        animation: String,
        caption: String,
        controls: Vec<String>,
    },
    Edit {
        chat: ChatId,
        message_id: MessageId,
        edit: MessageEdit,
    },
}

impl Call {
    pub fn chat(&self) -> ChatId {
        match self {
            Call::Text { chat, .. }
            | Call::Photo { chat, .. }
            | Call::Video { chat, .. }
            | Call::Animation { chat, .. }
            | Call::Edit { chat, .. } => *chat,
        }
    }
}

#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    broken_chats: Mutex<HashSet<ChatId>>,
}

impl RecordingGateway {
    /// Every call that went through, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_to(&self, chat: ChatId) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|x| x.chat() == chat)
            .collect()
    }

    /// Make everything sent to this chat fail from now on.
    pub fn break_chat(&self, chat: ChatId) {
        self.broken_chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat);
    }

    pub fn fix_chat(&self, chat: ChatId) {
        self.broken_chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chat);
    }

    async fn record(&self, call: Call) -> Result<(), RequestError> {
        // Give anything running concurrently a chance to interleave.
        tokio::task::yield_now().await;

        let broken = self
            .broken_chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&call.chat());
        if broken {
            return Err(RequestError::Api(ApiError::ChatNotFound));
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

fn callback_data(controls: Option<InlineKeyboardMarkup>) -> Vec<String> {
    controls
        .into_iter()
        .flat_map(|x| x.inline_keyboard)
        .flatten()
        .filter_map(|button| match button.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data),
            _ => None,
        })
        .collect()
}

impl Gateway for RecordingGateway {
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        self.record(Call::Text {
            chat,
            text,
            controls: callback_data(controls),
        })
        .await
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        self.record(Call::Photo {
            chat,
            photo,
            caption,
            controls: callback_data(controls),
        })
        .await
    }

    async fn send_video(
        &self,
        chat: ChatId,
        video: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        self.record(Call::Video {
            chat,
            video,
            caption,
            controls: callback_data(controls),
        })
        .await
    }

    async fn send_animation(
        &self,
        chat: ChatId,
        animation: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        self.record(Call::Animation {
            chat,
            animation,
            caption,
            controls: callback_data(controls),
        })
        .await
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: MessageId,
        edit: MessageEdit,
    ) -> Result<(), RequestError> {
        self.record(Call::Edit {
            chat,
            message_id,
            edit,
        })
        .await
    }
}
