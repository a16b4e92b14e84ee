use std::sync::Arc;

use relay_bot_commons::useful_methods::MessageStuff;
use teloxide::{
    payloads::AnswerCallbackQuerySetters,
    prelude::*,
    types::{Me, User},
    RequestError,
};

use crate::{
    control::ControlToken,
    controller::{ControlOrigin, ModerationController},
    render,
    types::{Content, MediaKind, Sender},
};

pub type Controller = ModerationController<Bot>;

/// Figure out what of this message, if anything, can be relayed.
fn classify(message: &Message) -> Option<Content> {
    if let Some(text) = message.text() {
        return Some(Content::text(text));
    }

    let caption = message.caption().unwrap_or_default();

    if let Some(photo) = message.find_biggest_photo() {
        return Some(Content::media(
            MediaKind::Photo,
            photo.file.id.to_string(),
            caption,
        ));
    }

    if let Some(animation) = message.animation() {
        return Some(Content::media(
            MediaKind::Animation,
            animation.file.id.to_string(),
            caption,
        ));
    }

    if let Some(video) = message.video() {
        return Some(Content::media(
            MediaKind::Video,
            video.file.id.to_string(),
            caption,
        ));
    }

    None
}

/// Returns `true` if this message is a command, which is then answered with the welcome text.
async fn handle_command(bot: &Bot, me: &Me, message: &Message) -> Result<bool, RequestError> {
    let Some(text) = message.text() else {
        return Ok(false);
    };
    if !text.starts_with('/') {
        return Ok(false);
    }
    let Some(command) = text.split_whitespace().next() else {
        return Ok(false);
    };

    // Trim the bot's username from the command and convert to lowercase.
    let username = format!("@{}", me.username());
    let command = command.trim_end_matches(username.as_str()).to_lowercase();
    log::debug!("Seen command {command}");

    // Whatever the command is, "/start", "/help" or some typo, explaining how the bot works
    // is the best answer.
    bot.send_message(message.chat.id, render::WELCOME).await?;
    Ok(true)
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    controller: Arc<Controller>,
) -> Result<(), RequestError> {
    // Submissions only come in through DMs.
    if !message.chat.is_private() {
        return Ok(());
    }

    let Some(user) = &message.from else {
        return Ok(());
    };

    if handle_command(&bot, &me, &message).await? {
        return Ok(());
    }

    // The sender is already told what went wrong, if anything did.
    let _ = controller
        .receive(message.chat.id, &Sender::from(user), classify(&message))
        .await;

    Ok(())
}

fn is_admin(controller: &Controller, user: &User) -> bool {
    // Admin chats are DMs with the admins, so their chat IDs are their user IDs.
    i64::try_from(user.id.0)
        .map(|id| controller.config().is_admin(ChatId(id)))
        .unwrap_or(false)
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    controller: Arc<Controller>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        (alert $text:expr) => {
            bot.answer_callback_query(query.id)
                .text($text)
                .show_alert(true)
                .await?;
            return Ok(());
        };
        ($text:expr) => {
            bot.answer_callback_query(query.id).text($text).await?;
            return Ok(());
        };
        () => {
            bot.answer_callback_query(query.id).await?;
            return Ok(());
        };
    }

    let Some(query_data) = query.data.as_deref() else {
        goodbye!("No query data.");
    };

    let token: ControlToken = match query_data.parse() {
        Ok(token) => token,
        Err(e) => {
            log::warn!("Received bad callback data {query_data:?}: {e}");
            goodbye!(format!("Invalid query data: {e}"));
        }
    };

    if !is_admin(&controller, &query.from) {
        log::info!(
            "Unauthorized user trying to moderate: {} (userid {})",
            query.from.full_name(),
            query.from.id
        );
        goodbye!(alert "Access denied.");
    }

    // May be missing if the message is too old. The action still goes through.
    let origin = query.regular_message().map(ControlOrigin::from);

    let result = match token {
        // The stored submission knows its own kind better than the button does.
        ControlToken::Approve { id, .. } => controller.approve(id, origin.as_ref()).await,
        ControlToken::Reject { id } => controller.reject(id, origin.as_ref()).await,
    };

    match result {
        Ok(()) => {
            goodbye!();
        }
        Err(e) => {
            log::info!("Moderation action {token} by {} failed: {e}", query.from.id);
            goodbye!(alert e.alert_text());
        }
    }
}
