mod common;

use rust_decimal_macros::dec;

use common::{count_rows, date, engine_with_db, new_account, principal};
use engine::{
    AccountStatus, Classification, Currency, EngineError, Entryable, INITIAL_BALANCE,
    NewAccountCmd, NewLinkedSourceCmd, SourceStatus,
};

#[tokio::test]
async fn zero_opening_balance_posts_nothing() {
    let (engine, db) = engine_with_db().await;
    let family = principal();

    let account_id = engine
        .create_account(&family, NewAccountCmd::new("Wallet", Currency::Usd))
        .await
        .unwrap();

    let account = engine.account(&family, account_id).await.unwrap();
    assert_eq!(account.balance, dec!(0));
    assert_eq!(account.status, AccountStatus::Active);
    assert!(engine.list_entries(&family, account_id).await.unwrap().is_empty());
    assert_eq!(count_rows(&db, "valuations").await, 0);
}

#[tokio::test]
async fn opening_balance_becomes_initial_valuation_entry() {
    let (engine, db) = engine_with_db().await;
    let family = principal();

    let account_id = engine
        .create_account(
            &family,
            NewAccountCmd::new("Checking", Currency::Usd)
                .subtype("checking")
                .opening_balance(dec!(500))
                .opening_date(date(2024, 1, 1)),
        )
        .await
        .unwrap();

    let entries = engine.list_entries(&family, account_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    let opening = &entries[0];
    assert_eq!(opening.name, INITIAL_BALANCE);
    assert_eq!(opening.amount, dec!(500));
    assert_eq!(opening.date, date(2024, 1, 1));
    assert!(matches!(opening.entryable, Entryable::Valuation(_)));
    assert_eq!(count_rows(&db, "valuations").await, 1);

    let account = engine.account(&family, account_id).await.unwrap();
    assert_eq!(account.balance, dec!(500));
    assert_eq!(account.classification, Classification::Asset);
}

#[tokio::test]
async fn liability_subtypes_are_classified_as_liabilities() {
    let (engine, _db) = engine_with_db().await;
    let family = principal();

    let card = engine
        .create_account(
            &family,
            NewAccountCmd::new("Visa", Currency::Usd).subtype("credit_card"),
        )
        .await
        .unwrap();
    let forced = engine
        .create_account(
            &family,
            NewAccountCmd::new("IOU", Currency::Usd).classification(Classification::Liability),
        )
        .await
        .unwrap();

    for id in [card, forced] {
        let account = engine.account(&family, id).await.unwrap();
        assert_eq!(account.classification, Classification::Liability);
    }
}

#[tokio::test]
async fn net_worth_subtracts_liabilities_from_assets() {
    let (engine, _db) = engine_with_db().await;
    let family = principal();

    for (name, subtype, opening) in [
        ("Checking", "checking", dec!(10000)),
        ("Savings", "savings", dec!(5000)),
        ("House", "property", dec!(250000)),
        ("Mortgage", "mortgage", dec!(150000)),
        ("Card", "credit_card", dec!(-500)),
    ] {
        engine
            .create_account(
                &family,
                NewAccountCmd::new(name, Currency::Usd)
                    .subtype(subtype)
                    .opening_balance(opening),
            )
            .await
            .unwrap();
    }

    assert_eq!(engine.net_worth(&family).await.unwrap(), dec!(115500));
    assert_eq!(engine.net_worth(&principal()).await.unwrap(), dec!(0));
}

#[tokio::test]
async fn archived_accounts_leave_the_active_list() {
    let (engine, _db) = engine_with_db().await;
    let family = principal();

    let kept = new_account(&engine, &family, "Checking").await;
    let closed = engine
        .create_account(
            &family,
            NewAccountCmd::new("Old savings", Currency::Usd).opening_balance(dec!(100)),
        )
        .await
        .unwrap();
    engine.archive_account(&family, closed).await.unwrap();

    let active = engine.list_active_accounts(&family).await.unwrap();
    assert_eq!(active.iter().map(|a| a.id).collect::<Vec<_>>(), vec![kept]);
    assert_eq!(engine.net_worth(&family).await.unwrap(), dec!(0));

    let archived = engine.account(&family, closed).await.unwrap();
    assert_eq!(archived.status, AccountStatus::Archived);
    assert_eq!(archived.balance, dec!(100));
}

#[tokio::test]
async fn accounts_are_scoped_to_their_family() {
    let (engine, _db) = engine_with_db().await;
    let owner = principal();
    let stranger = principal();
    let account_id = new_account(&engine, &owner, "Checking").await;

    assert!(matches!(
        engine.account(&stranger, account_id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.archive_account(&stranger, account_id).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(engine.list_active_accounts(&stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_account_validates_input() {
    let (engine, _db) = engine_with_db().await;
    let family = principal();

    let blank = engine
        .create_account(&family, NewAccountCmd::new("  ", Currency::Usd))
        .await;
    assert!(matches!(blank, Err(EngineError::Validation(_))));

    let fractional_yen = engine
        .create_account(
            &family,
            NewAccountCmd::new("Tokyo", Currency::Jpy).opening_balance(dec!(10.5)),
        )
        .await;
    assert!(matches!(fractional_yen, Err(EngineError::Validation(_))));
    assert!(engine.list_active_accounts(&family).await.unwrap().is_empty());
}

#[tokio::test]
async fn external_account_id_is_unique_per_family() {
    let (engine, _db) = engine_with_db().await;
    let family = principal();

    let linked = engine
        .create_account(
            &family,
            NewAccountCmd::new("Checking", Currency::Usd).external_account_id("acc-1"),
        )
        .await
        .unwrap();
    let duplicate = engine
        .create_account(
            &family,
            NewAccountCmd::new("Checking again", Currency::Usd).external_account_id("acc-1"),
        )
        .await;
    assert!(matches!(duplicate, Err(EngineError::Conflict(_))));

    let found = engine
        .account_by_external_id(&family, "acc-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, linked);
    assert!(engine
        .account_by_external_id(&principal(), "acc-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn linked_source_keeps_token_sealed_and_cursor_guarded() {
    let (engine, db) = engine_with_db().await;
    let family = principal();

    let source = engine
        .save_linked_source(
            &family,
            NewLinkedSourceCmd::new("item-1", "access-secret").institution("ins_1", "First Bank"),
        )
        .await
        .unwrap();
    assert_ne!(source.access_token, "access-secret");
    assert_eq!(source.status, SourceStatus::Active);
    assert_eq!(source.sync_cursor, None);
    assert_eq!(count_rows(&db, "linked_sources").await, 1);

    engine
        .advance_cursor(&family, "item-1", None, "c1")
        .await
        .unwrap();
    let stale = engine.advance_cursor(&family, "item-1", None, "c2").await;
    assert!(matches!(stale, Err(EngineError::Conflict(_))));
    engine
        .advance_cursor(&family, "item-1", Some("c1"), "c2")
        .await
        .unwrap();

    engine.mark_requires_relink(&family, "item-1").await.unwrap();
    let relinked = engine
        .save_linked_source(&family, NewLinkedSourceCmd::new("item-1", "fresh-secret"))
        .await
        .unwrap();
    assert_eq!(relinked.status, SourceStatus::Active);
    assert_eq!(relinked.sync_cursor.as_deref(), Some("c2"));
    assert_eq!(engine.linked_sources(&family).await.unwrap().len(), 1);

    let stolen = engine
        .save_linked_source(&principal(), NewLinkedSourceCmd::new("item-1", "other"))
        .await;
    assert!(matches!(stolen, Err(EngineError::Conflict(_))));

    let missing = engine.advance_cursor(&family, "item-404", None, "c1").await;
    assert!(matches!(missing, Err(EngineError::NotFound(_))));
}
