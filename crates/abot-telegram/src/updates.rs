//! Telegram update → core `Update`.

use teloxide::types::{Message, UpdateKind};

use abot_core::{
    domain::{ChatId, MessageId, UserId},
    messaging::types::Update,
};

/// Only new and edited text messages reach the dispatcher; everything else
/// (channel posts, callbacks, service messages) yields `None`.
pub fn convert(update: &teloxide::types::Update) -> Option<Update> {
    match &update.kind {
        UpdateKind::Message(msg) => from_message(msg, false),
        UpdateKind::EditedMessage(msg) => from_message(msg, true),
        _ => None,
    }
}

fn from_message(msg: &Message, edited: bool) -> Option<Update> {
    let from = msg.from()?;
    let text = msg.text().or_else(|| msg.caption())?;
    let reply_from = msg.reply_to_message().and_then(|r| r.from());

    let message_id = MessageId(msg.id.0);
    Some(Update {
        message_id,
        // Telegram keeps the original id on edits.
        edited_message_id: edited.then_some(message_id),
        sender_id: UserId(from.id.0 as i64),
        sender_username: from.username.clone(),
        sender_is_bot: from.is_bot,
        chat_id: ChatId(msg.chat.id.0),
        is_private: msg.chat.is_private(),
        text: text.to_string(),
        reply_to_sender_id: reply_from.map(|u| UserId(u.id.0 as i64)),
        reply_to_username: reply_from.and_then(|u| u.username.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tg_update(value: serde_json::Value) -> teloxide::types::Update {
        serde_json::from_str(&value.to_string()).unwrap()
    }

    #[test]
    fn group_reply_is_converted() {
        let upd = tg_update(json!({
            "update_id": 1,
            "message": {
                "message_id": 5,
                "date": 1700000000,
                "chat": {"id": -100, "type": "group", "title": "g"},
                "from": {"id": 42, "is_bot": false, "first_name": "A", "username": "alice"},
                "text": "/user add",
                "reply_to_message": {
                    "message_id": 4,
                    "date": 1699999999,
                    "chat": {"id": -100, "type": "group", "title": "g"},
                    "from": {"id": 43, "is_bot": false, "first_name": "B", "username": "bob"},
                    "text": "hi"
                }
            }
        }));

        let u = convert(&upd).unwrap();
        assert_eq!(u.message_id, MessageId(5));
        assert!(!u.is_edit());
        assert_eq!(u.sender_id, UserId(42));
        assert_eq!(u.sender_username.as_deref(), Some("alice"));
        assert_eq!(u.chat_id, ChatId(-100));
        assert!(!u.is_private);
        assert_eq!(u.text, "/user add");
        assert_eq!(u.reply_to_sender_id, Some(UserId(43)));
        assert_eq!(u.reply_to_username.as_deref(), Some("bob"));
    }

    #[test]
    fn private_edit_keeps_message_id() {
        let upd = tg_update(json!({
            "update_id": 2,
            "edited_message": {
                "message_id": 9,
                "date": 1700000000,
                "edit_date": 1700000010,
                "chat": {"id": 42, "type": "private", "first_name": "A"},
                "from": {"id": 42, "is_bot": false, "first_name": "A"},
                "text": "echo two"
            }
        }));

        let u = convert(&upd).unwrap();
        assert!(u.is_private);
        assert_eq!(u.edited_message_id, Some(MessageId(9)));
        assert_eq!(u.effective_message_id(), MessageId(9));
        assert!(u.sender_username.is_none());
    }
}
