use std::future::Future;

use teloxide::{
    payloads::setters::*,
    prelude::Requester,
    types::{ChatId, FileId, InlineKeyboardMarkup, InputFile, MessageId, ParseMode},
    Bot, RequestError,
};

use crate::types::MediaKind;

#[cfg(test)]
pub(crate) mod recording;

/// New contents for a message the bot sent earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEdit {
    /// Replace the text of a text message.
    Text(String),
    /// Replace the caption of a media message.
    Caption(String),
}

impl MessageEdit {
    /// Same kind of edit, with `f` applied to the new contents.
    #[must_use]
    pub fn map(self, f: impl FnOnce(String) -> String) -> MessageEdit {
        match self {
            MessageEdit::Text(x) => MessageEdit::Text(f(x)),
            MessageEdit::Caption(x) => MessageEdit::Caption(f(x)),
        }
    }
}

/// Everything the moderation logic needs to say to Telegram.
///
/// Text and captions are sent as HTML. Edits are sent as plain text, and always remove the
/// inline keyboard of the edited message.
pub trait Gateway: Send + Sync {
    fn send_text(
        &self,
        chat: ChatId,
        text: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    fn send_photo(
        &self,
        chat: ChatId,
        photo: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    fn send_video(
        &self,
        chat: ChatId,
        video: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    fn send_animation(
        &self,
        chat: ChatId,
        animation: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    fn edit_message(
        &self,
        chat: ChatId,
        message_id: MessageId,
        edit: MessageEdit,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;

    /// Convenience method to call the right `send_*` for this kind of media.
    fn send_media(
        &self,
        kind: MediaKind,
        chat: ChatId,
        media_ref: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> impl Future<Output = Result<(), RequestError>> + Send {
        async move {
            match kind {
                MediaKind::Photo => self.send_photo(chat, media_ref, caption, controls).await,
                MediaKind::Video => self.send_video(chat, media_ref, caption, controls).await,
                MediaKind::Animation => {
                    self.send_animation(chat, media_ref, caption, controls)
                        .await
                }
            }
        }
    }
}

/// Setting an empty caption or keyboard is not the same as not setting one as far as Telegram
/// is concerned, so only set what's there.
macro_rules! with_extras {
    ($request:expr, $caption:expr, $controls:expr) => {{
        let mut request = $request.parse_mode(ParseMode::Html);
        if !$caption.is_empty() {
            request = request.caption($caption);
        }
        if let Some(controls) = $controls {
            request = request.reply_markup(controls);
        }
        request
    }};
}

impl Gateway for Bot {
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        let mut request = self.send_message(chat, text).parse_mode(ParseMode::Html);
        if let Some(controls) = controls {
            request = request.reply_markup(controls);
        }
        request.await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: ChatId,
        photo: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        let file = InputFile::file_id(FileId(photo));
        with_extras!(Requester::send_photo(self, chat, file), caption, controls).await?;
        Ok(())
    }

    async fn send_video(
        &self,
        chat: ChatId,
        video: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        let file = InputFile::file_id(FileId(video));
        with_extras!(Requester::send_video(self, chat, file), caption, controls).await?;
        Ok(())
    }

    async fn send_animation(
        &self,
        chat: ChatId,
        animation: String,
        caption: String,
        controls: Option<InlineKeyboardMarkup>,
    ) -> Result<(), RequestError> {
        let file = InputFile::file_id(FileId(animation));
        with_extras!(Requester::send_animation(self, chat, file), caption, controls).await?;
        Ok(())
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: MessageId,
        edit: MessageEdit,
    ) -> Result<(), RequestError> {
        let no_buttons = InlineKeyboardMarkup {
            inline_keyboard: Vec::new(),
        };

        match edit {
            MessageEdit::Text(text) => {
                self.edit_message_text(chat, message_id, text)
                    .reply_markup(no_buttons)
                    .await?;
            }
            MessageEdit::Caption(caption) => {
                self.edit_message_caption(chat, message_id)
                    .caption(caption)
                    .reply_markup(no_buttons)
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MessageEdit;

    #[test]
    fn edit_map_keeps_kind() {
        let edit = MessageEdit::Caption("a".to_string()).map(|x| x + "b");
        assert_eq!(edit, MessageEdit::Caption("ab".to_string()));
        let edit = MessageEdit::Text(String::new()).map(|x| x + "c");
        assert_eq!(edit, MessageEdit::Text("c".to_string()));
    }
}
