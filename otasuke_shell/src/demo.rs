use otasuke::remote::MemoryRemote;
use serde_json::json;

/// デモ用のテーブルを用意する
pub async fn remote(customer_id: &str) -> MemoryRemote {
    let remote = MemoryRemote::new();
    remote
        .seed(
            "provider_services",
            vec![
                json!({"id": 1, "provider_id": "p-1", "service_type": "cleaning", "title": "ハウスクリーニング", "description": "2LDKまで", "price": 15000}),
                json!({"id": 2, "provider_id": "p-2", "service_type": "repair", "title": "水漏れ修理", "price": 8800}),
                json!({"id": 3, "provider_id": "p-1", "service_type": "cleaning", "title": "エアコン掃除", "price": 11000}),
            ],
        )
        .await;
    remote
        .seed(
            "bookings",
            vec![
                json!({"id": 1, "customer_id": customer_id, "provider_service_id": 1, "status": "confirmed", "location": "世田谷区", "start_at": "2024-04-02T01:00:00Z", "end_at": "2024-04-02T04:00:00Z", "created_at": "2024-03-20T12:00:00Z"}),
                json!({"id": 2, "customer_id": customer_id, "provider_service_id": 3, "status": "pending", "location": "世田谷区", "start_at": "2024-04-02T06:00:00Z", "end_at": "2024-04-02T07:30:00Z", "created_at": "2024-03-21T12:00:00Z"}),
                json!({"id": 3, "customer_id": customer_id, "provider_service_id": 2, "status": "pending", "created_at": "2024-03-22T12:00:00Z", "description": "日程調整中"}),
                json!({"id": 4, "customer_id": "someone-else", "provider_service_id": 2, "status": "completed", "start_at": "2024-03-30T02:00:00Z"}),
            ],
        )
        .await;
    let me = json!({"id": customer_id, "display_name": "わたし"});
    let tanaka = json!({"id": "p-1", "display_name": "田中クリーンサービス"});
    let suzuki = json!({"id": "p-2", "display_name": "鈴木設備"});
    remote
        .seed(
            "messages",
            vec![
                json!({"id": 1, "sender_id": "p-1", "receiver_id": customer_id, "content": "4/2に伺います", "is_read": true, "created_at": "2024-03-20T13:00:00Z", "sender": tanaka.clone(), "receiver": me.clone()}),
                json!({"id": 2, "sender_id": customer_id, "receiver_id": "p-1", "content": "よろしくお願いします", "is_read": true, "created_at": "2024-03-20T13:10:00Z", "sender": me.clone(), "receiver": tanaka.clone()}),
                json!({"id": 3, "sender_id": "p-2", "receiver_id": customer_id, "content": "ご希望の日時を教えてください", "is_read": false, "created_at": "2024-03-22T15:00:00Z", "sender": suzuki.clone(), "receiver": me.clone()}),
                json!({"id": 4, "sender_id": "p-2", "receiver_id": customer_id, "content": "平日午後なら空いています", "is_read": false, "created_at": "2024-03-22T15:05:00Z", "sender": suzuki, "receiver": me}),
            ],
        )
        .await;
    remote
}
