use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{Deref, Display, Error, From};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Entity, Id, ProviderServiceId, RemoteFailure};
use crate::remote::{Remote, RemoteExt};

/// 予約ID
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Deref, Default,
)]
#[serde(transparent)]
pub struct BookingId(i64);

impl Id for BookingId {
    type Inner = i64;
}

/// 予約ステータス
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// 受付待ち
    #[default]
    #[display(fmt = "pending")]
    Pending,
    /// 確定
    #[display(fmt = "confirmed")]
    Confirmed,
    /// 作業中
    #[display(fmt = "in_progress")]
    InProgress,
    /// 完了
    #[display(fmt = "completed")]
    Completed,
    /// キャンセル
    #[display(fmt = "cancelled")]
    Cancelled,
}

/// 予約エンティティ
///
/// `bookings` テーブルの1行。`id` と `created_at` はバックエンドが埋める。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BookingId>,
    pub customer_id: String,
    pub provider_service_id: ProviderServiceId,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Booking {
    /// 作成リクエストの形に変換する
    pub fn to_insert(&self) -> BookingInsert {
        BookingInsert {
            customer_id: self.customer_id.clone(),
            provider_service_id: self.provider_service_id,
            status: self.status,
            location: self.location.clone(),
            start_at: self.start_at,
            end_at: self.end_at,
        }
    }
}

impl Entity for Booking {
    type Id = BookingId;

    const TABLE: &'static str = "bookings";

    fn id(&self) -> Option<Self::Id> {
        self.id
    }
}

/// 予約作成リクエスト
///
/// `Booking` の書き込み可能な列だけを持つ。`Booking` の形を変えたらこちらも揃えること。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInsert {
    pub customer_id: String,
    pub provider_service_id: ProviderServiceId,
    pub status: BookingStatus,
    pub location: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

impl BookingInsert {
    pub fn new(
        customer_id: String,
        provider_service_id: ProviderServiceId,
        location: Option<String>,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Self, BookingError> {
        Self::validate_customer_id(&customer_id)?;
        Self::validate_time(start_at.as_ref(), end_at.as_ref())?;
        Ok(Self {
            customer_id,
            provider_service_id,
            status: BookingStatus::Pending,
            location,
            start_at,
            end_at,
        })
    }

    fn validate(&self) -> Result<(), BookingError> {
        Self::validate_customer_id(&self.customer_id)?;
        Self::validate_time(self.start_at.as_ref(), self.end_at.as_ref())
    }

    fn validate_customer_id(customer_id: &str) -> Result<(), BookingError> {
        if customer_id.trim().is_empty() {
            return Err(BookingError::CustomerIdRequired);
        }
        Ok(())
    }

    fn validate_time(
        start_at: Option<&DateTime<Utc>>,
        end_at: Option<&DateTime<Utc>>,
    ) -> Result<(), BookingError> {
        if let (Some(start), Some(end)) = (start_at, end_at) {
            if start >= end {
                return Err(BookingError::InvalidTime);
            }
        }
        Ok(())
    }
}

/// 予約エラー
#[derive(Error, Display, Debug, PartialEq, Eq)]
pub enum BookingError {
    /// お客様IDが指定されていません
    #[display(fmt = "Customer id is not specified")]
    CustomerIdRequired,
    /// 時間が不正です
    #[display(fmt = "Invalid time")]
    InvalidTime,
    /// バックエンドの失敗
    #[display(fmt = "{}", _0)]
    Remote(#[error(source)] RemoteFailure),
}

impl From<RemoteFailure> for BookingError {
    fn from(value: RemoteFailure) -> Self {
        Self::Remote(value)
    }
}

/// 予約の書き込み口
#[async_trait]
pub trait BookingRepository {
    /// 予約を作成し、採番された予約を返す
    async fn create(&self, insert: &BookingInsert) -> Result<Booking, BookingError>;
}

/// `Remote` に予約を書き込む
pub struct BookingService<R> {
    remote: R,
}

impl<R: Remote> BookingService<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<R: Remote> BookingRepository for BookingService<R> {
    async fn create(&self, insert: &BookingInsert) -> Result<Booking, BookingError> {
        insert.validate()?;
        let booking: Booking = self.remote.create(Booking::TABLE, insert).await?;
        info!(
            "予約を作成しました: id={:?} service={}",
            booking.id, booking.provider_service_id
        );
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use crate::remote::MemoryRemote;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_booking_deserialize() {
        let booking: Booking = serde_json::from_value(json!({
            "id": 12,
            "customer_id": "c-1",
            "provider_service_id": 3,
            "status": "confirmed",
            "location": "Shibuya",
            "start_at": "2024-04-01T09:00:00Z",
            "end_at": "2024-04-01T11:00:00+00:00",
            "created_at": null,
            "description": "エアコン掃除"
        }))
        .unwrap();
        assert_eq!(booking.id, Some(BookingId(12)));
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.start_at, Some(at(9)));
        assert_eq!(booking.end_at, Some(at(11)));
        assert_eq!(booking.created_at, None);
        assert_eq!(booking.id(), Some(BookingId::from(12)));
    }

    #[test]
    fn test_insert_columns_are_booking_columns() {
        let booking: Booking = serde_json::from_value(json!({
            "id": 1,
            "customer_id": "c-1",
            "provider_service_id": 3,
            "status": "pending",
            "created_at": "2024-04-01T00:00:00Z",
            "description": "memo"
        }))
        .unwrap();
        let booking_json = serde_json::to_value(&booking).unwrap();
        let insert_json = serde_json::to_value(booking.to_insert()).unwrap();
        let booking_keys = booking_json.as_object().unwrap();
        let insert_keys = insert_json.as_object().unwrap();
        assert!(insert_keys.keys().all(|k| booking_keys.contains_key(k)));
        assert!(insert_keys.len() < booking_keys.len());
        for excluded in ["id", "description", "created_at"] {
            assert!(!insert_keys.contains_key(excluded));
        }
    }

    #[test]
    fn test_insert_validation() {
        assert_eq!(
            BookingInsert::new(" ".to_owned(), 1.into(), None, None, None),
            Err(BookingError::CustomerIdRequired)
        );
        assert_eq!(
            BookingInsert::new("c-1".to_owned(), 1.into(), None, Some(at(11)), Some(at(9))),
            Err(BookingError::InvalidTime)
        );
        let insert =
            BookingInsert::new("c-1".to_owned(), 1.into(), None, Some(at(9)), None).unwrap();
        assert_eq!(insert.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_booking_service_create() {
        let remote = MemoryRemote::new();
        let service = BookingService::new(remote.clone());
        let insert = BookingInsert::new(
            "c-1".to_owned(),
            7.into(),
            Some("Meguro".to_owned()),
            Some(at(9)),
            Some(at(10)),
        )
        .unwrap();
        let booking = service.create(&insert).await.unwrap();
        assert_eq!(booking.id, Some(BookingId(1)));
        assert_eq!(booking.to_insert(), insert);
        assert_eq!(remote.rows("bookings").await.len(), 1);
    }

    #[tokio::test]
    async fn test_booking_service_create_failure() {
        let remote = MemoryRemote::new();
        remote.fail_with("permission denied for table bookings").await;
        let service = BookingService::new(remote);
        let insert = BookingInsert::new("c-1".to_owned(), 7.into(), None, None, None).unwrap();
        assert_eq!(
            service.create(&insert).await,
            Err(BookingError::Remote(RemoteFailure::new(
                "permission denied for table bookings"
            )))
        );
    }
}
