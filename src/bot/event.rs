use teloxide::types::{ChatId, Update, UpdateKind, UserId};
use thiserror::Error;

/// Why an update could not be turned into an [`InboundMessage`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("update is not a message")]
    NotAMessage,
    #[error("message has no sender")]
    MissingSender,
    #[error("message has no text")]
    MissingText,
}

/// A text message with everything the dispatcher needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: UserId,
    pub chat_id: ChatId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(sender: UserId, chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            sender,
            chat_id,
            text: text.into(),
        }
    }
}

impl TryFrom<Update> for InboundMessage {
    type Error = MalformedEvent;

    fn try_from(update: Update) -> Result<Self, Self::Error> {
        let UpdateKind::Message(message) = update.kind else {
            return Err(MalformedEvent::NotAMessage);
        };

        let sender = message
            .from
            .as_ref()
            .map(|user| user.id)
            .ok_or(MalformedEvent::MissingSender)?;
        let text = message.text().ok_or(MalformedEvent::MissingText)?;

        Ok(Self::new(sender, message.chat.id, text))
    }
}

/// One delivered update: its id always advances the cursor, even when the
/// payload is unusable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled {
    pub update_id: u32,
    pub event: Result<InboundMessage, MalformedEvent>,
}

impl From<Update> for Polled {
    fn from(update: Update) -> Self {
        Self {
            update_id: update.id.0,
            event: InboundMessage::try_from(update),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Update only deserializes its kind from text, the way getUpdates delivers it
    fn update(value: serde_json::Value) -> Update {
        serde_json::from_str(&value.to_string()).unwrap()
    }

    fn message(text: Option<&str>) -> serde_json::Value {
        let mut message = json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": 42, "type": "private", "first_name": "Alice" },
            "from": { "id": 1001, "is_bot": false, "first_name": "Alice" },
        });
        match text {
            Some(text) => message["text"] = json!(text),
            None => {
                message["photo"] = json!([{
                    "file_id": "AgAD",
                    "file_unique_id": "AQAD",
                    "width": 90,
                    "height": 90,
                    "file_size": 1024
                }])
            }
        }
        message
    }

    #[test]
    fn test_text_message() {
        let polled = Polled::from(update(json!({
            "update_id": 10,
            "message": message(Some("/report")),
        })));
        assert_eq!(polled.update_id, 10);
        assert_eq!(
            polled.event,
            Ok(InboundMessage::new(UserId(1001), ChatId(42), "/report"))
        );
    }

    #[test]
    fn test_message_without_text() {
        let polled = Polled::from(update(json!({
            "update_id": 11,
            "message": message(None),
        })));
        assert_eq!(polled.update_id, 11);
        assert_eq!(polled.event, Err(MalformedEvent::MissingText));
    }

    #[test]
    fn test_message_without_sender() {
        let mut payload = message(Some("/report"));
        payload.as_object_mut().unwrap().remove("from");

        let polled = Polled::from(update(json!({
            "update_id": 13,
            "message": payload,
        })));
        assert_eq!(polled.update_id, 13);
        assert_eq!(polled.event, Err(MalformedEvent::MissingSender));
    }

    #[test]
    fn test_edited_message_is_skipped() {
        let edited = update(json!({
            "update_id": 12,
            "edited_message": message(Some("/report")),
        }));
        assert!(matches!(edited.kind, UpdateKind::EditedMessage(_)));

        let polled = Polled::from(edited);
        assert_eq!(polled.update_id, 12);
        assert_eq!(polled.event, Err(MalformedEvent::NotAMessage));
    }
}
