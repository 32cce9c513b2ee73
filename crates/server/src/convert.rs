//! Mapping between engine types and wire types.

use api_types::{
    Currency as ApiCurrency,
    account::{AccountView, Classification as ApiClassification, EntryKind, EntryView},
    linked_source::{LinkedSourceView, SourceStatus as ApiStatus},
    trade::TradeKind as ApiTradeKind,
};

pub fn map_currency(currency: engine::Currency) -> ApiCurrency {
    match currency {
        engine::Currency::Usd => ApiCurrency::Usd,
        engine::Currency::Eur => ApiCurrency::Eur,
        engine::Currency::Gbp => ApiCurrency::Gbp,
        engine::Currency::Cad => ApiCurrency::Cad,
        engine::Currency::Aud => ApiCurrency::Aud,
        engine::Currency::Jpy => ApiCurrency::Jpy,
    }
}

pub fn currency_from_api(currency: ApiCurrency) -> engine::Currency {
    match currency {
        ApiCurrency::Usd => engine::Currency::Usd,
        ApiCurrency::Eur => engine::Currency::Eur,
        ApiCurrency::Gbp => engine::Currency::Gbp,
        ApiCurrency::Cad => engine::Currency::Cad,
        ApiCurrency::Aud => engine::Currency::Aud,
        ApiCurrency::Jpy => engine::Currency::Jpy,
    }
}

pub fn classification_from_api(classification: ApiClassification) -> engine::Classification {
    match classification {
        ApiClassification::Asset => engine::Classification::Asset,
        ApiClassification::Liability => engine::Classification::Liability,
    }
}

pub fn trade_kind_from_api(kind: ApiTradeKind) -> engine::TradeKind {
    match kind {
        ApiTradeKind::Buy => engine::TradeKind::Buy,
        ApiTradeKind::Sell => engine::TradeKind::Sell,
    }
}

pub fn account_view(account: engine::Account) -> AccountView {
    AccountView {
        id: account.id,
        name: account.name,
        subtype: account.subtype,
        classification: match account.classification {
            engine::Classification::Asset => ApiClassification::Asset,
            engine::Classification::Liability => ApiClassification::Liability,
        },
        balance: account.balance,
        currency: map_currency(account.currency),
        external_account_id: account.external_account_id,
    }
}

pub fn entry_view(entry: engine::Entry) -> EntryView {
    let kind = match entry.entryable.kind() {
        engine::EntryableKind::Transaction => EntryKind::Transaction,
        engine::EntryableKind::Trade => EntryKind::Trade,
        engine::EntryableKind::Valuation => EntryKind::Valuation,
    };
    EntryView {
        id: entry.id,
        amount: entry.amount,
        currency: map_currency(entry.currency),
        date: entry.date,
        name: entry.name,
        kind,
        detail_id: entry.entryable.id(),
        external_id: entry.external_id,
    }
}

pub fn linked_source_view(source: engine::LinkedSource) -> LinkedSourceView {
    LinkedSourceView {
        synced: source.sync_cursor.is_some(),
        item_id: source.item_id,
        institution_id: source.institution_id,
        institution_name: source.institution_name,
        status: match source.status {
            engine::SourceStatus::Active => ApiStatus::Active,
            engine::SourceStatus::RequiresRelink => ApiStatus::RequiresRelink,
        },
    }
}
