pub mod booking;
pub mod conversation;
pub mod provider_service;

use derive_more::{Display, Error};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::{Debug, Display as FmtDisplay},
    ops::Deref,
    str::FromStr,
};

pub use self::booking::*;
pub use self::conversation::*;
pub use self::provider_service::*;

pub trait Id:
    Copy
    + Eq
    + Deref<Target = Self::Inner>
    + From<Self::Inner>
    + FmtDisplay
    + Debug
    + Serialize
    + for<'de> Deserialize<'de>
{
    type Inner: FromStr;
}

/// バックエンドのテーブル行に対応するエンティティ
pub trait Entity: Debug + Clone + Serialize + DeserializeOwned {
    type Id: Id;

    /// テーブル名
    const TABLE: &'static str;

    /// バックエンドで採番されるまでは `None`
    fn id(&self) -> Option<Self::Id>;
}

/// リモート呼び出しの失敗
///
/// ネットワーク・認可・検証などの区別は持たず、人が読めるメッセージだけを運ぶ。
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[display(fmt = "{}", message)]
pub struct RemoteFailure {
    message: String,
}

impl RemoteFailure {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            return Self {
                message: "Unknown remote failure".to_owned(),
            };
        }
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for RemoteFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::new(format!("Malformed response: {}", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_failure_message() {
        let failure = RemoteFailure::new("network timeout");
        assert_eq!(failure.message(), "network timeout");
        assert_eq!(failure.to_string(), "network timeout");
    }

    #[test]
    fn test_remote_failure_never_blank() {
        assert!(!RemoteFailure::new("  ").message().is_empty());
    }
}
