use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};

use crate::domain::Booking;

/// 日付ごとにまとめた予約 (タスクカレンダー)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskCalendar {
    days: BTreeMap<NaiveDate, Vec<Booking>>,
    unscheduled: Vec<Booking>,
}

impl TaskCalendar {
    /// `offset` の現地日付でまとめる。日付内は開始時刻順、開始時刻の無い予約は入力順
    pub fn group(bookings: impl IntoIterator<Item = Booking>, offset: FixedOffset) -> Self {
        let mut calendar = Self::default();
        for booking in bookings {
            match booking.start_at {
                Some(start_at) => calendar
                    .days
                    .entry(start_at.with_timezone(&offset).date_naive())
                    .or_default()
                    .push(booking),
                None => calendar.unscheduled.push(booking),
            }
        }
        for bookings in calendar.days.values_mut() {
            bookings.sort_by_key(|b| b.start_at);
        }
        calendar
    }

    pub fn day(&self, date: NaiveDate) -> &[Booking] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or_default()
    }

    /// 予約のある日 (昇順)
    pub fn days(&self) -> impl Iterator<Item = (&NaiveDate, &Vec<Booking>)> {
        self.days.iter()
    }

    pub fn unscheduled(&self) -> &[Booking] {
        &self.unscheduled
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty() && self.unscheduled.is_empty()
    }
}
