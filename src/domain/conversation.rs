use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// プロフィール (`profiles` テーブル)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// メッセージ (`messages` テーブル)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// 送信者・受信者のプロフィールを埋め込んだメッセージ
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithParticipants {
    #[serde(flatten)]
    pub message: Message,
    pub sender: User,
    pub receiver: User,
}

impl MessageWithParticipants {
    /// 埋め込みを含めた列指定
    pub const COLUMNS: &'static str = "id,sender_id,receiver_id,content,is_read,created_at,\
         sender:profiles!messages_sender_id_fkey(id,display_name,avatar_url),\
         receiver:profiles!messages_receiver_id_fkey(id,display_name,avatar_url)";
}

/// 会話一覧の1件
///
/// テーブルの行ではなく、メッセージから集計した表示用の値。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub other_user: User,
    pub last_message: Option<Message>,
    pub unread_count: u32,
    pub last_message_time: Option<DateTime<Utc>>,
}

impl Conversation {
    /// `me` が関わるメッセージを相手ごとにまとめ、新しい順に並べる
    pub fn summarize(me: &str, messages: Vec<MessageWithParticipants>) -> Vec<Conversation> {
        let mut by_user: HashMap<String, Conversation> = HashMap::new();
        for MessageWithParticipants {
            message,
            sender,
            receiver,
        } in messages
        {
            let other = if message.sender_id == me {
                receiver
            } else if message.receiver_id == me {
                sender
            } else {
                continue;
            };
            let conversation = by_user
                .entry(other.id.clone())
                .or_insert_with(|| Conversation {
                    other_user: other,
                    last_message: None,
                    unread_count: 0,
                    last_message_time: None,
                });
            if message.receiver_id == me && !message.is_read {
                conversation.unread_count += 1;
            }
            let newer = conversation
                .last_message_time
                .map_or(true, |time| message.created_at > time);
            if newer {
                conversation.last_message_time = Some(message.created_at);
                conversation.last_message = Some(message);
            }
        }
        let mut conversations = by_user.into_values().collect::<Vec<_>>();
        conversations.sort_by(|a, b| {
            b.last_message_time
                .cmp(&a.last_message_time)
                .then_with(|| a.other_user.id.cmp(&b.other_user.id))
        });
        conversations
    }
}
