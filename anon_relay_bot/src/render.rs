use html_escape::{encode_double_quoted_attribute, encode_text};
use relay_bot_commons::useful_methods::handle_or;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::{
    control::ControlToken,
    types::{Content, ContentKind, MediaKind, Sender, SubmissionId},
};

pub const WELCOME: &str = "
👋 Hi! Send me a message and I'll pass it on to the owner of the channel.

🔒 All messages are completely anonymous. Text, photos, videos and GIFs are accepted.

⚡️ Write something to get started!";

pub const SUBMITTED: &str = "✅ Your message was sent for moderation!";
pub const UNSUPPORTED: &str = "❌ This type of message is not supported.";
pub const SEND_FAILED: &str = "❌ Failed to send your message.";

pub const PUBLISHED_SUFFIX: &str = "✅ Published to the channel!";
pub const REJECTED_SUFFIX: &str = "❌ Submission rejected.";

/// Telegram refuses messages longer than this, counted in UTF-16 code units after the markup
/// is parsed.
const TEXT_LIMIT: usize = 4096;
/// Same, for captions.
const CAPTION_LIMIT: usize = 1024;

/// "Display name" of the media kinds for admins.
pub fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "📷 Photo",
        MediaKind::Video => "🎥 Video",
        MediaKind::Animation => "🎬 GIF",
    }
}

/// Message admins get about a new submission, in HTML. For media, this goes into the caption.
///
/// User text is cut short if needed, so that the notice fits Telegram's limits even with a
/// disposition suffix appended later.
pub fn admin_notice(sender: &Sender, content: &Content) -> String {
    let header = match content {
        Content::Text { .. } => "🔒 New text submission:",
        Content::Media { .. } => "🔒 New media submission:",
    };

    let mut notice = format!(
        "{header}\n\n👤 From: {}\n🆔 ID: {}\n📧 {}\n\n",
        encode_text(&sender.display_name),
        sender.id,
        encode_text(&handle_or(sender.username.as_deref(), "none")),
    );

    let (limit, quoted) = match content {
        Content::Text { text } => {
            notice.push_str("💬 Text: ");
            (TEXT_LIMIT, text.as_str())
        }
        Content::Media { kind, caption, .. } => {
            notice.push_str("📦 Type: ");
            notice.push_str(media_label(*kind));
            if caption.is_empty() {
                return notice;
            }
            notice.push_str("\n📝 Caption: ");
            (CAPTION_LIMIT, caption.as_str())
        }
    };

    let budget = limit
        .saturating_sub(utf16_len(&notice))
        .saturating_sub(suffix_room());
    notice.push_str(&encode_text(&truncate_utf16(quoted, budget)));
    notice
}

/// Approve and reject buttons under a submission.
pub fn admin_keyboard(id: SubmissionId, kind: ContentKind) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "✅ Approve".to_string(),
            ControlToken::Approve { id, kind }.to_string(),
        ),
        InlineKeyboardButton::callback(
            "❌ Reject".to_string(),
            ControlToken::Reject { id }.to_string(),
        ),
    ]])
}

fn call_to_action(url: Option<&Url>) -> String {
    match url {
        Some(url) => format!(
            "\n\n👉 <a href=\"{}\">Send your own message</a>",
            encode_double_quoted_attribute(url.as_str())
        ),
        None => String::new(),
    }
}

/// Channel post for a text submission, in HTML.
pub fn channel_text_post(text: &str, call_to_action_url: Option<&Url>) -> String {
    let call_to_action = call_to_action(call_to_action_url);
    let header = "📨 Anonymous message:\n\n";

    // Escaped characters count as one once Telegram parses the markup, and tags don't count at
    // all. So measuring the tags and the unescaped text errs on the safe side.
    let budget = TEXT_LIMIT
        .saturating_sub(utf16_len(header))
        .saturating_sub(utf16_len("<blockquote></blockquote>"))
        .saturating_sub(utf16_len(&call_to_action));

    format!(
        "{header}<blockquote>{}</blockquote>{call_to_action}",
        encode_text(&truncate_utf16(text, budget)),
    )
}

/// Channel post caption for a media submission, in HTML.
pub fn channel_media_caption(caption: &str, call_to_action_url: Option<&Url>) -> String {
    let call_to_action = call_to_action(call_to_action_url);
    let mut post = String::from("📨 Anonymous message");

    if !caption.is_empty() {
        let budget = CAPTION_LIMIT
            .saturating_sub(utf16_len(&post))
            .saturating_sub(2)
            .saturating_sub(utf16_len(&call_to_action));
        post.push_str("\n\n");
        post.push_str(&encode_text(&truncate_utf16(caption, budget)));
    }

    post.push_str(&call_to_action);
    post
}

/// `original` plus a notice about what happened to the submission.
pub fn with_suffix(original: &str, suffix: &str) -> String {
    if original.is_empty() {
        suffix.to_string()
    } else {
        format!("{original}\n\n{suffix}")
    }
}

/// Length as Telegram counts it.
fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Room to keep free for [`with_suffix`] in messages that may get it later.
fn suffix_room() -> usize {
    2 + utf16_len(PUBLISHED_SUFFIX).max(utf16_len(REJECTED_SUFFIX))
}

/// `text`, cut down to at most `max_units` UTF-16 code units with an ellipsis at the end if it
/// was too long.
fn truncate_utf16(text: &str, max_units: usize) -> String {
    if utf16_len(text) <= max_units {
        return text.to_string();
    }

    // The ellipsis is a single code unit.
    let budget = max_units.saturating_sub(1);
    let mut used = 0;
    let mut truncated: String = text
        .chars()
        .take_while(|x| {
            used += x.len_utf16();
            used <= budget
        })
        .collect();
    truncated.push('…');
    truncated
}
