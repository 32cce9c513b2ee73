#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Currency, Engine, NewAccountCmd, Principal, sync::TokenCipher};
use migration::MigratorTrait;
use uuid::Uuid;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .cipher(TokenCipher::new([7u8; 32]))
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn engine_with_file_db() -> (Engine, DatabaseConnection, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .cipher(TokenCipher::new([7u8; 32]))
        .build()
        .await
        .unwrap();

    (engine, db, path)
}

pub fn principal() -> Principal {
    Principal::user(Uuid::new_v4(), Uuid::new_v4())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn new_account(engine: &Engine, principal: &Principal, name: &str) -> Uuid {
    engine
        .create_account(principal, NewAccountCmd::new(name, Currency::Usd))
        .await
        .unwrap()
}

pub async fn linked_account(
    engine: &Engine,
    principal: &Principal,
    name: &str,
    external_account_id: &str,
) -> Uuid {
    engine
        .create_account(
            principal,
            NewAccountCmd::new(name, Currency::Usd)
                .subtype("checking")
                .external_account_id(external_account_id),
        )
        .await
        .unwrap()
}

pub async fn balance(engine: &Engine, principal: &Principal, account_id: Uuid) -> Decimal {
    engine.account(principal, account_id).await.unwrap().balance
}

/// Asserts the cached balance equals the sum of the account's entries.
pub async fn assert_balanced(engine: &Engine, principal: &Principal, account_id: Uuid) {
    let balance = balance(engine, principal, account_id).await;
    let sum = engine.ledger_sum(principal, account_id).await.unwrap();
    assert_eq!(balance, sum, "balance of {account_id} drifted from its entries");
}

pub async fn count_rows(db: &DatabaseConnection, table: &str) -> i64 {
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}
