use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use teloxide::{
    types::{ChatId, Message, MessageId},
    RequestError,
};
use tokio::sync::OwnedMutexGuard;

use crate::{
    config::Config,
    database::{Database, StoreError},
    gateway::{Gateway, MessageEdit},
    render,
    types::{Content, Sender, Status, SubmissionId},
};

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("content is neither text nor a photo, video or GIF")]
    UnsupportedContent,
    #[error("failed to deliver a message: {0}")]
    Delivery(#[from] RequestError),
    #[error("submission {0} does not exist")]
    NotFound(SubmissionId),
    #[error("submission {0} was already processed")]
    AlreadyProcessed(SubmissionId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ModerationError {
    /// Text of the alert shown to an admin whose button press failed with this error.
    pub fn alert_text(&self) -> &'static str {
        match self {
            ModerationError::UnsupportedContent => render::UNSUPPORTED,
            ModerationError::Delivery(_) => "❌ Failed to post to the channel!",
            ModerationError::NotFound(_) => "❌ Submission not found!",
            ModerationError::AlreadyProcessed(_) => "❌ This submission was already processed!",
            ModerationError::Store(_) => "❌ Database error, please try again later.",
        }
    }
}

/// The admin's copy of a submission, the one with the buttons that got pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOrigin {
    pub chat: ChatId,
    pub message_id: MessageId,
    /// What the message says right now.
    pub body: MessageEdit,
}

impl From<&Message> for ControlOrigin {
    fn from(message: &Message) -> Self {
        let body = match message.text() {
            Some(text) => MessageEdit::Text(text.to_string()),
            None => MessageEdit::Caption(message.caption().unwrap_or_default().to_string()),
        };
        ControlOrigin {
            chat: message.chat.id,
            message_id: message.id,
            body,
        }
    }
}

/// Per-submission locks, so that the same submission is never worked on by two admin actions
/// at once.
#[derive(Default)]
struct IdLocks {
    locks: Mutex<HashMap<SubmissionId, Weak<tokio::sync::Mutex<()>>>>,
}

impl IdLocks {
    async fn lock(&self, id: SubmissionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Nobody holds these anymore.
            locks.retain(|_, x| x.strong_count() > 0);

            match locks.get(&id).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(id, Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }
}

/// Takes submissions in, hands them to admins, and publishes or discards them on their command.
pub struct ModerationController<G> {
    db: Arc<Database>,
    gateway: G,
    config: Arc<Config>,
    locks: IdLocks,
}

impl<G: Gateway> ModerationController<G> {
    pub fn new(db: Arc<Database>, gateway: G, config: Arc<Config>) -> Self {
        ModerationController {
            db,
            gateway,
            config,
            locks: IdLocks::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Take in a submission from `sender`, who is talking to the bot in `chat`.
    ///
    /// `content` is [`None`] if the message was of a kind the bot doesn't relay. The sender is
    /// always told how it went; the returned result is for logging.
    ///
    /// A submission that got stored stays stored even if delivering it to admins failed.
    pub async fn receive(
        &self,
        chat: ChatId,
        sender: &Sender,
        content: Option<Content>,
    ) -> Result<SubmissionId, ModerationError> {
        let Some(content) = content else {
            self.tell(chat, render::UNSUPPORTED).await;
            return Err(ModerationError::UnsupportedContent);
        };

        let result = self.store_and_notify_admins(sender, &content).await;

        match &result {
            Ok(id) => {
                log::debug!("Submission {id} from {} is up for review", sender.id);
                self.tell(chat, render::SUBMITTED).await;
            }
            Err(e) => {
                log::error!("Failed to take in a submission from {}: {e}", sender.id);
                self.tell(chat, render::SEND_FAILED).await;
            }
        }

        result
    }

    async fn store_and_notify_admins(
        &self,
        sender: &Sender,
        content: &Content,
    ) -> Result<SubmissionId, ModerationError> {
        let id = self.db.next_id().await?;
        self.db.save(id, content).await?;

        let notice = render::admin_notice(sender, content);
        let keyboard = render::admin_keyboard(id, content.kind());

        // One admin with a broken chat shouldn't keep the rest from seeing it.
        let mut first_error = None;
        for &admin in &self.config.admin_chat_ids {
            let result = match content {
                Content::Text { .. } => {
                    self.gateway
                        .send_text(admin, notice.clone(), Some(keyboard.clone()))
                        .await
                }
                Content::Media {
                    kind, media_ref, ..
                } => {
                    self.gateway
                        .send_media(
                            *kind,
                            admin,
                            media_ref.clone(),
                            notice.clone(),
                            Some(keyboard.clone()),
                        )
                        .await
                }
            };

            if let Err(e) = result {
                log::warn!("Failed to send submission {id} to admin {admin}: {e}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(id),
        }
    }

    /// Publish a pending submission to the channel and mark it approved.
    ///
    /// If publishing fails, the submission is left untouched so that the admin can try again.
    /// `origin` gets edited to say it was published and to lose its buttons.
    pub async fn approve(
        &self,
        id: SubmissionId,
        origin: Option<&ControlOrigin>,
    ) -> Result<(), ModerationError> {
        // Held until the status is written, so nobody else can publish this in the meantime.
        let _guard = self.locks.lock(id).await;

        let submission = self
            .db
            .load(id)
            .await?
            .ok_or(ModerationError::NotFound(id))?;

        if submission.status != Status::Pending {
            return Err(ModerationError::AlreadyProcessed(id));
        }

        if let Err(e) = self.publish(&submission.content).await {
            log::error!("Failed to publish submission {id} to the channel: {e}");
            return Err(e.into());
        }

        log::info!("Published submission {id}");

        match self
            .db
            .transition_status(id, Status::Pending, Status::Approved)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                log::error!("Submission {id} stopped being pending while it was being published");
                return Err(ModerationError::AlreadyProcessed(id));
            }
            Err(e) => {
                log::error!("Submission {id} got published but couldn't be marked approved: {e}");
                return Err(e.into());
            }
        }

        self.mark_handled(origin, render::PUBLISHED_SUFFIX).await;
        Ok(())
    }

    /// Mark a pending submission as rejected. Nothing is published.
    ///
    /// Same as with [`Self::approve`], unknown and already handled submissions are refused.
    pub async fn reject(
        &self,
        id: SubmissionId,
        origin: Option<&ControlOrigin>,
    ) -> Result<(), ModerationError> {
        let _guard = self.locks.lock(id).await;

        if self.db.load(id).await?.is_none() {
            return Err(ModerationError::NotFound(id));
        }

        if !self
            .db
            .transition_status(id, Status::Pending, Status::Rejected)
            .await?
        {
            return Err(ModerationError::AlreadyProcessed(id));
        }

        log::info!("Rejected submission {id}");
        self.mark_handled(origin, render::REJECTED_SUFFIX).await;
        Ok(())
    }

    async fn publish(&self, content: &Content) -> Result<(), RequestError> {
        let channel = self.config.channel_id;
        let call_to_action = self.config.call_to_action_url.as_ref();

        match content {
            Content::Text { text } => {
                self.gateway
                    .send_text(
                        channel,
                        render::channel_text_post(text, call_to_action),
                        None,
                    )
                    .await
            }
            Content::Media {
                kind,
                media_ref,
                caption,
            } => {
                self.gateway
                    .send_media(
                        *kind,
                        channel,
                        media_ref.clone(),
                        render::channel_media_caption(caption, call_to_action),
                        None,
                    )
                    .await
            }
        }
    }

    /// Append `suffix` to the admin's message and remove its buttons. Failing that is not a big
    /// deal; the submission is handled either way.
    async fn mark_handled(&self, origin: Option<&ControlOrigin>, suffix: &str) {
        let Some(origin) = origin else {
            return;
        };

        let edit = origin
            .body
            .clone()
            .map(|body| render::with_suffix(&body, suffix));

        if let Err(e) = self
            .gateway
            .edit_message(origin.chat, origin.message_id, edit)
            .await
        {
            log::warn!(
                "Failed to edit message {} in chat {}: {e}",
                origin.message_id.0,
                origin.chat
            );
        }
    }

    async fn tell(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.gateway.send_text(chat, text.to_string(), None).await {
            log::warn!("Failed to reply in chat {chat}: {e}");
        }
    }
}
