//! Linear model input from a branch-capable history.

use crate::core::history::{ConversationHistory, HistoryError};
use crate::core::types::{ContentPart, Message, MessageContent, MessageRole, MessageType};

/// What the caller asked to append, and where.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembleRequest {
    /// Branch point; `None` continues from the committed tip.
    pub parent_uuid: Option<String>,
    /// New user text; `None` replays the selected prefix as-is.
    pub message: Option<String>,
    pub attachments: Vec<ContentPart>,
}

/// Identity of the message about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStamp {
    pub uuid: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledInput {
    /// Selected prefix plus the new user message, if any.
    pub messages: Vec<Message>,
    pub user_message: Option<Message>,
}

/// Build the model input for one turn.
///
/// Selects `messages_up_to(parent_uuid)` when a branch point is given,
/// otherwise the committed path, and appends a user message parented on the
/// last selected message. Never touches the history itself.
pub fn assemble(
    history: &ConversationHistory,
    request: &AssembleRequest,
    stamp: MessageStamp,
) -> Result<AssembledInput, HistoryError> {
    let mut messages = match &request.parent_uuid {
        Some(parent) => history.messages_up_to(parent)?,
        None => history.messages(),
    };

    let Some(text) = &request.message else {
        return Ok(AssembledInput {
            messages,
            user_message: None,
        });
    };

    let content = if request.attachments.is_empty() {
        MessageContent::Text(text.clone())
    } else {
        let mut parts = Vec::with_capacity(request.attachments.len() + 1);
        parts.push(ContentPart::text(text.clone()));
        parts.extend(request.attachments.iter().cloned());
        MessageContent::Parts(parts)
    };

    let user_message = Message {
        uuid: stamp.uuid,
        parent_uuid: messages.last().map(|last| last.uuid.clone()),
        role: MessageRole::User,
        content,
        kind: MessageType::Message,
        timestamp: stamp.timestamp,
    };
    messages.push(user_message.clone());

    Ok(AssembledInput {
        messages,
        user_message: Some(user_message),
    })
}
