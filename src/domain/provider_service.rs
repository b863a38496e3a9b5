use derive_more::{Deref, Display, From};
use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

use crate::domain::{Entity, Id};

/// 提供サービスID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Deref, Default,
)]
#[serde(transparent)]
pub struct ProviderServiceId(i64);

impl Id for ProviderServiceId {
    type Inner = i64;
}

/// 料金 (円)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, From, Deref)]
#[serde(transparent)]
pub struct Price(u64);

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "¥{}", self.0.to_formatted_string(&Locale::ja))
    }
}

/// 事業者が提供するサービス
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderService {
    pub id: ProviderServiceId,
    pub provider_id: String,
    pub service_type: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
}

impl Entity for ProviderService {
    type Id = ProviderServiceId;

    const TABLE: &'static str = "provider_services";

    fn id(&self) -> Option<Self::Id> {
        Some(self.id)
    }
}
