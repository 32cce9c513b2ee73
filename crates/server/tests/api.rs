use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::Database;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use engine::{
    Engine,
    sync::{SyncQueue, SyncTask, TokenCipher},
};
use migration::MigratorTrait;
use server::{ServerState, router};

async fn app() -> (Router, mpsc::Receiver<Vec<u8>>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .cipher(TokenCipher::new([3u8; 32]))
        .build()
        .await
        .unwrap();
    let (queue, receiver) = SyncQueue::channel(4);
    let state = ServerState {
        engine: Arc::new(engine),
        queue,
        request_timeout: Duration::from_secs(5),
    };
    (router(state), receiver)
}

struct Caller {
    family: Uuid,
    user: Uuid,
}

impl Caller {
    fn new() -> Self {
        Self {
            family: Uuid::new_v4(),
            user: Uuid::new_v4(),
        }
    }

    async fn send(&self, app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-family-id", self.family.to_string())
            .header("x-user-id", self.user.to_string());
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn new_account(&self, app: &Router, name: &str, opening: &str) -> String {
        let (status, body) = self
            .send(
                app,
                Method::POST,
                "/accounts",
                Some(json!({
                    "name": name,
                    "subtype": "checking",
                    "currency": "USD",
                    "opening_balance": opening,
                    "opening_date": "2024-01-01",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let (app, _rx) = app().await;
    let response = app
        .oneshot(Request::builder().uri("/accounts").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accounts_report_net_worth_and_opening_entry() {
    let (app, _rx) = app().await;
    let caller = Caller::new();
    let checking = caller.new_account(&app, "Checking", "500").await;
    let (status, _) = caller
        .send(
            &app,
            Method::POST,
            "/accounts",
            Some(json!({
                "name": "Visa",
                "subtype": "credit_card",
                "currency": "USD",
                "opening_balance": "120.50",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = caller.send(&app, Method::GET, "/accounts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["accounts"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&list["net_worth"]), dec!(379.50));

    let (status, entries) = caller
        .send(&app, Method::GET, &format!("/accounts/{checking}/entries"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Initial Balance");
    assert_eq!(entries[0]["kind"], "valuation");
    assert_eq!(decimal(&entries[0]["amount"]), dec!(500));
}

#[tokio::test]
async fn posting_with_external_id_replays() {
    let (app, _rx) = app().await;
    let caller = Caller::new();
    let checking = caller.new_account(&app, "Checking", "0").await;

    let body = json!({
        "account_id": checking,
        "amount": "-18.20",
        "date": "2024-02-10",
        "name": "Bakery",
        "merchant": "Le Fournil",
        "category": "Food",
        "external_id": "manual-1",
    });
    let (status, first) = caller
        .send(&app, Method::POST, "/transactions", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["replayed"], false);

    let (status, second) = caller.send(&app, Method::POST, "/transactions", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["replayed"], true);
    assert_eq!(second["entry_id"], first["entry_id"]);

    let (_, list) = caller.send(&app, Method::GET, "/accounts", None).await;
    assert_eq!(decimal(&list["accounts"][0]["balance"]), dec!(-18.20));
}

#[tokio::test]
async fn transfer_moves_money_and_rejects_same_account() {
    let (app, _rx) = app().await;
    let caller = Caller::new();
    let checking = caller.new_account(&app, "Checking", "1000").await;
    let savings = caller.new_account(&app, "Savings", "0").await;

    let (status, created) = caller
        .send(
            &app,
            Method::POST,
            "/transfers",
            Some(json!({
                "from_account_id": checking,
                "to_account_id": savings,
                "amount": "250",
                "date": "2024-03-01",
                "name": "Monthly savings",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let (status, body) = caller
        .send(
            &app,
            Method::POST,
            "/transfers",
            Some(json!({
                "from_account_id": checking,
                "to_account_id": checking,
                "amount": "1",
                "date": "2024-03-01",
                "name": "Loop",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().is_some());

    let (_, list) = caller.send(&app, Method::GET, "/accounts", None).await;
    assert_eq!(decimal(&list["net_worth"]), dec!(1000));
}

#[tokio::test]
async fn trade_posts_signed_cash_effect() {
    let (app, _rx) = app().await;
    let caller = Caller::new();
    let brokerage = caller.new_account(&app, "Brokerage", "2000").await;

    let (status, trade) = caller
        .send(
            &app,
            Method::POST,
            "/trades",
            Some(json!({
                "account_id": brokerage,
                "ticker": "aapl",
                "qty": "10",
                "price": "150.50",
                "kind": "buy",
                "date": "2024-04-01",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{trade}");
    assert_eq!(decimal(&trade["amount"]), dec!(-1505.00));

    let (_, entries) = caller
        .send(&app, Method::GET, &format!("/accounts/{brokerage}/entries"), None)
        .await;
    assert_eq!(entries["entries"][0]["name"], "buy AAPL");
    assert_eq!(entries["entries"][0]["kind"], "trade");

    let (status, sale) = caller
        .send(
            &app,
            Method::POST,
            "/trades",
            Some(json!({
                "account_id": brokerage,
                "ticker": "AAPL",
                "qty": "4",
                "price": "160",
                "kind": "sell",
                "date": "2024-05-01",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{sale}");
    assert_eq!(decimal(&sale["amount"]), dec!(640.00));
}

#[tokio::test]
async fn other_families_cannot_see_accounts() {
    let (app, _rx) = app().await;
    let owner = Caller::new();
    let stranger = Caller::new();
    let checking = owner.new_account(&app, "Checking", "10").await;

    let (status, _) = stranger
        .send(&app, Method::GET, &format!("/accounts/{checking}/entries"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = stranger
        .send(&app, Method::POST, &format!("/accounts/{checking}/archive"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = owner
        .send(&app, Method::POST, &format!("/accounts/{checking}/archive"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn sync_request_enqueues_task() {
    let (app, mut rx) = app().await;
    let caller = Caller::new();

    let (status, source) = caller
        .send(
            &app,
            Method::POST,
            "/linked-sources",
            Some(json!({
                "item_id": "item-9",
                "access_token": "access-sandbox-secret",
                "institution_name": "First Bank",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{source}");
    assert_eq!(source["status"], "active");
    assert_eq!(source["synced"], false);
    assert!(source.get("access_token").is_none());

    let (status, queued) = caller
        .send(&app, Method::POST, "/linked-sources/item-9/sync", None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(queued["item_id"], "item-9");

    let payload = rx.recv().await.unwrap();
    let task = SyncTask::from_payload(&payload).unwrap();
    assert_eq!(task, SyncTask::new(caller.family, "item-9"));

    let (status, _) = Caller::new()
        .send(&app, Method::POST, "/linked-sources/item-9/sync", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
