//! Command structs for engine operations.
//!
//! These types group parameters for write operations (entries, details,
//! accounts, linked sources), keeping call sites readable and avoiding long
//! argument lists.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Classification, Currency, ResultEngine, Trade, TradeKind, TransactionKind};

/// The entry half of a posting.
#[derive(Clone, Debug)]
pub struct EntryDraft {
    /// Assigned when absent.
    pub id: Option<Uuid>,
    pub account_id: Uuid,
    pub amount: Decimal,
    /// Defaults to the account currency; a different currency is rejected.
    pub currency: Option<Currency>,
    pub date: NaiveDate,
    pub name: String,
    pub external_id: Option<String>,
}

impl EntryDraft {
    #[must_use]
    pub fn new(account_id: Uuid, amount: Decimal, date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            id: None,
            account_id,
            amount,
            currency: None,
            date,
            name: name.into(),
            external_id: None,
        }
    }

    /// Entry matching a trade: named `"<kind> <TICKER>"`, carrying the
    /// trade's signed cash effect.
    pub fn for_trade(
        account_id: Uuid,
        trade: &TradeDraft,
        ticker: &str,
        currency: Currency,
        date: NaiveDate,
    ) -> ResultEngine<Self> {
        let amount = Trade::new(trade.security_id, trade.qty, trade.price, trade.kind)?
            .signed_amount(currency)?;
        let name = format!("{} {}", trade.kind.as_str(), ticker.trim().to_ascii_uppercase());
        Ok(Self::new(account_id, amount.to_decimal(), date, name).currency(currency))
    }

    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// The detail half of a standard or transfer posting.
#[derive(Clone, Debug, Default)]
pub struct TransactionDraft {
    pub id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub merchant_id: Option<Uuid>,
    pub kind: TransactionKind,
}

impl TransactionDraft {
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn merchant_id(mut self, merchant_id: Uuid) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        self
    }
}

#[derive(Clone, Debug)]
pub struct TradeDraft {
    pub id: Option<Uuid>,
    pub security_id: Uuid,
    pub qty: Decimal,
    pub price: Decimal,
    pub kind: TradeKind,
}

impl TradeDraft {
    #[must_use]
    pub fn new(security_id: Uuid, qty: Decimal, price: Decimal, kind: TradeKind) -> Self {
        Self {
            id: None,
            security_id,
            qty,
            price,
            kind,
        }
    }

    #[must_use]
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
}

/// Create an account, optionally with an opening balance.
#[derive(Clone, Debug)]
pub struct NewAccountCmd {
    pub name: String,
    pub subtype: Option<String>,
    /// Inferred from `subtype` when absent.
    pub classification: Option<Classification>,
    pub currency: Currency,
    pub opening_balance: Decimal,
    /// Date of the "Initial Balance" entry; today when absent.
    pub opening_date: Option<NaiveDate>,
    pub external_account_id: Option<String>,
}

impl NewAccountCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            subtype: None,
            classification: None,
            currency,
            opening_balance: Decimal::ZERO,
            opening_date: None,
            external_account_id: None,
        }
    }

    #[must_use]
    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    #[must_use]
    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    #[must_use]
    pub fn opening_balance(mut self, balance: Decimal) -> Self {
        self.opening_balance = balance;
        self
    }

    #[must_use]
    pub fn opening_date(mut self, date: NaiveDate) -> Self {
        self.opening_date = Some(date);
        self
    }

    #[must_use]
    pub fn external_account_id(mut self, external_account_id: impl Into<String>) -> Self {
        self.external_account_id = Some(external_account_id.into());
        self
    }
}

/// Link (or re-link) an external item to a family.
#[derive(Clone, Debug)]
pub struct NewLinkedSourceCmd {
    pub item_id: String,
    /// Plaintext access token; encrypted before it is stored.
    pub access_token: String,
    pub institution_id: Option<String>,
    pub institution_name: Option<String>,
}

impl NewLinkedSourceCmd {
    #[must_use]
    pub fn new(item_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            access_token: access_token.into(),
            institution_id: None,
            institution_name: None,
        }
    }

    #[must_use]
    pub fn institution(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.institution_id = Some(id.into());
        self.institution_name = Some(name.into());
        self
    }
}
