mod demo;

use std::{error::Error, sync::Arc};

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use otasuke::{
    calendar::TaskCalendar,
    domain::{
        Booking, BookingInsert, BookingRepository, BookingService, Conversation, ProviderService,
        ProviderServiceId,
    },
    loader::{Conversations, CustomerBookings, ListLoader, ListQuery, ProviderServices},
    navigation::{Navigator, RouteInbox, RouteKey},
    refresh::PullToRefresh,
    remote::{PostgrestRemote, Remote},
    OtasukeConfig,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "otasuke-shell")]
#[command(about = "Home-service booking client shell", long_about = None)]
struct Cli {
    /// 設定ファイル (拡張子なし)
    #[arg(short, long, default_value = "otasuke", env = "OTASUKE_CONFIG")]
    config: String,

    /// 通知から渡された遷移先
    #[arg(long, env = "OTASUKE_ROUTE")]
    route: Option<String>,

    /// バックエンドの代わりにメモリ上のデモデータを使う
    #[arg(long)]
    demo: bool,

    /// 表示後に引っ張って更新する距離 (px)
    #[arg(long)]
    pull: Option<f32>,

    #[command(subcommand)]
    command: Option<Screen>,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
enum Screen {
    /// 予約一覧
    Bookings,
    /// タスクカレンダー
    Calendar,
    /// 提供サービス
    Services {
        #[arg(long)]
        id: Option<i64>,
    },
    /// メッセージ
    Conversations,
    /// 予約する
    Book {
        #[arg(long)]
        service: i64,
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        location: Option<String>,
    },
}

/// 通知の遷移先を画面に対応付ける
#[derive(Default)]
struct ShellNavigator {
    requested: Option<Screen>,
}

impl Navigator for ShellNavigator {
    fn navigate(&mut self, route: &RouteKey) {
        let mut parts = route.split('/');
        let screen = match (parts.next(), parts.next()) {
            (Some("bookings"), None) => Some(Screen::Bookings),
            (Some("calendar"), None) => Some(Screen::Calendar),
            (Some("messages" | "conversations"), _) => Some(Screen::Conversations),
            (Some("services"), None) => Some(Screen::Services { id: None }),
            (Some("services"), Some(id)) => id.parse().ok().map(|id| Screen::Services { id: Some(id) }),
            _ => None,
        };
        if screen.is_none() {
            warn!("不明な遷移先を無視しました: {}", route);
        }
        self.requested = screen;
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match OtasukeConfig::load(&cli.config) {
        Ok(config) => {
            tracing_subscriber::fmt()
                .with_max_level(Level::from(&config.logger.level))
                .init();
            if let Err(error) = run(cli, config).await {
                error!("アプリケーションエラー: {}", error);
            }
        }
        Err(error) => {
            tracing_subscriber::fmt::init();
            error!("アプリケーションエラー: {}", error)
        }
    }
}

async fn run(cli: Cli, config: OtasukeConfig) -> Result<(), Box<dyn Error>> {
    let remote: Arc<dyn Remote> = if cli.demo {
        info!("デモデータで起動します");
        Arc::new(demo::remote(&config.customer.id).await)
    } else {
        Arc::new(PostgrestRemote::new(&config.backend)?)
    };
    let offset =
        utc_offset(config.customer.utc_offset_minutes).ok_or("invalid utc_offset_minutes")?;

    let mut inbox = RouteInbox::new();
    inbox.receive(cli.route.as_deref());
    inbox.attach(ShellNavigator::default());
    let screen = inbox
        .navigator()
        .and_then(|n| n.requested.clone())
        .or(cli.command)
        .unwrap_or(Screen::Bookings);

    let mut gesture = PullToRefresh::from_density(config.screen.density);
    let customer_id = config.customer.id.clone();
    match screen {
        Screen::Bookings => {
            let loader = ListLoader::new(CustomerBookings::new(remote));
            for booking in show(loader, Some(customer_id), cli.pull, &mut gesture).await {
                println!("{}", booking_line(&booking, &offset));
            }
        }
        Screen::Calendar => {
            let loader = ListLoader::new(CustomerBookings::new(remote));
            let bookings = show(loader, Some(customer_id), cli.pull, &mut gesture).await;
            let calendar = TaskCalendar::group(bookings, offset);
            for (date, bookings) in calendar.days() {
                println!("{}", date.format("%Y-%m-%d (%a)"));
                for booking in bookings {
                    println!("  {}", booking_line(booking, &offset));
                }
            }
            if !calendar.unscheduled().is_empty() {
                println!("未定");
                for booking in calendar.unscheduled() {
                    println!("  {}", booking_line(booking, &offset));
                }
            }
        }
        Screen::Services { id } => {
            let loader = ListLoader::new(ProviderServices::new(remote));
            let id = id.map(ProviderServiceId::from);
            for service in show(loader, id, cli.pull, &mut gesture).await {
                println!("{}", service_line(&service));
            }
        }
        Screen::Conversations => {
            let loader = ListLoader::new(Conversations::new(remote, customer_id));
            for conversation in show(loader, None, cli.pull, &mut gesture).await {
                println!("{}", conversation_line(&conversation));
            }
        }
        Screen::Book {
            service,
            start,
            end,
            location,
        } => {
            let insert = BookingInsert::new(
                customer_id,
                ProviderServiceId::from(service),
                location,
                start,
                end,
            )?;
            let booking = BookingService::new(remote).create(&insert).await?;
            println!("{}", booking_line(&booking, &offset));
        }
    }
    Ok(())
}

/// 画面を表示する。初回表示で読み込み、`pull` があれば引っ張って更新する
async fn show<Q>(
    loader: ListLoader<Q>,
    param: Option<Q::Param>,
    pull: Option<f32>,
    gesture: &mut PullToRefresh,
) -> Vec<Q::Item>
where
    Q: ListQuery + 'static,
    Q::Item: 'static,
    Q::Param: Clone,
{
    let mut rx = loader.subscribe();
    let name = loader.query().name().to_owned();
    let loader_name = name.clone();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let (is_loading, count, error) = {
                let state = rx.borrow_and_update();
                (state.is_loading, state.items.len(), state.error.clone())
            };
            info!(
                "{}: is_loading={} items={} error={:?}",
                name, is_loading, count, error
            );
        }
    });

    loader.appear(param.clone()).await;
    if let Some(distance) = pull {
        gesture.drag(distance);
        let mut requested = false;
        gesture.release(|| requested = true);
        if requested {
            gesture.set_refreshing(true);
            loader.refresh(param).await;
            gesture.set_refreshing(false);
        }
    }

    let state = loader.state();
    drop(loader);
    join_watcher(watcher, loader_name).await;
    if let Some(error) = &state.error {
        eprintln!("読み込みに失敗しました: {}", error);
    }
    state.items
}

fn utc_offset(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// 状態を表示するタスクの終了を待つ。異常終了は警告に残す
async fn join_watcher(watcher: JoinHandle<()>, name: String) -> bool {
    match watcher.await {
        Ok(()) => true,
        Err(error) => {
            warn!("{}: 状態の表示が異常終了しました: {}", name, error);
            false
        }
    }
}

fn booking_line(booking: &Booking, offset: &FixedOffset) -> String {
    let start = booking
        .start_at
        .map(|t| t.with_timezone(offset).format("%m/%d %H:%M").to_string())
        .unwrap_or_else(|| "--/-- --:--".to_owned());
    format!(
        "#{} {} {} service={} {}",
        booking.id.map(|id| id.to_string()).unwrap_or_default(),
        start,
        booking.status,
        booking.provider_service_id,
        booking.location.as_deref().unwrap_or("")
    )
}

fn service_line(service: &ProviderService) -> String {
    format!(
        "#{} [{}] {} {}",
        service.id,
        service.service_type,
        service.title,
        service
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_owned())
    )
}

fn conversation_line(conversation: &Conversation) -> String {
    format!(
        "{} (未読{}) {}",
        conversation.other_user.display_name,
        conversation.unread_count,
        conversation
            .last_message
            .as_ref()
            .map(|m| m.content.as_str())
            .unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn navigate(route: &str) -> Option<Screen> {
        let mut navigator = ShellNavigator::default();
        navigator.navigate(&RouteKey::parse(Some(route)).unwrap());
        navigator.requested
    }

    #[test]
    fn test_route_to_screen() {
        assert_eq!(navigate("calendar"), Some(Screen::Calendar));
        assert_eq!(navigate("messages/alice"), Some(Screen::Conversations));
        assert_eq!(navigate("services/4"), Some(Screen::Services { id: Some(4) }));
        assert_eq!(navigate("services/x"), None);
        assert_eq!(navigate("settings"), None);
    }

    #[test]
    fn test_utc_offset() {
        assert_eq!(utc_offset(540), FixedOffset::east_opt(9 * 3600));
        assert_eq!(utc_offset(-300), FixedOffset::west_opt(5 * 3600));
        assert_eq!(utc_offset(24 * 60), None);
        assert_eq!(utc_offset(i32::MAX), None);
        assert_eq!(utc_offset(i32::MIN), None);
    }

    #[tokio::test]
    async fn test_join_watcher_reports_panic() {
        let finished = tokio::spawn(async {});
        assert!(join_watcher(finished, "bookings".to_owned()).await);
        let panicked = tokio::spawn(async { panic!("watcher failed") });
        assert!(!join_watcher(panicked, "bookings".to_owned()).await);
    }

    #[tokio::test]
    async fn test_show_with_pull_refreshes() {
        let remote = demo::remote("c-1").await;
        let loader = ListLoader::new(CustomerBookings::new(remote.clone()));
        let mut gesture = PullToRefresh::new(80.0);
        let items = show(loader, Some("c-1".to_owned()), Some(200.0), &mut gesture).await;
        assert!(!items.is_empty());
        assert_eq!(remote.select_count().await, 2);
        assert_eq!(gesture.offset(), 0.0);
    }
}
