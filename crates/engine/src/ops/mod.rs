use std::future::Future;

use sea_orm::{DatabaseConnection, DbErr, SqlErr};
use tokio_util::sync::CancellationToken;

use crate::{EngineError, ResultEngine, sync::TokenCipher};

mod access;
mod accounts;
mod ledger;
mod linked_sources;
mod resolvers;

pub use accounts::INITIAL_BALANCE;
pub use ledger::{PostedTrade, PostedTransaction, PostedTransfer};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Ledger posting engine.
///
/// Every public operation is one atomic unit against the database. A unit
/// that is dropped before it commits (error, cancellation, timeout) rolls
/// back in full.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    cipher: Option<TokenCipher>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub(crate) fn cipher(&self) -> ResultEngine<&TokenCipher> {
        self.cipher
            .as_ref()
            .ok_or_else(|| EngineError::Credential("no encryption key configured".to_string()))
    }

    /// Races `operation` against `token`.
    ///
    /// On cancellation the operation future is dropped, which rolls back any
    /// open unit, and `EngineError::Cancelled` is returned. An operation that
    /// already committed is unaffected.
    pub async fn cancellable<T, F>(token: &CancellationToken, operation: F) -> ResultEngine<T>
    where
        F: Future<Output = ResultEngine<T>>,
    {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(EngineError::Cancelled),
            result = operation => result,
        }
    }
}

pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    cipher: Option<TokenCipher>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Cipher for linked-source credentials.
    pub fn cipher(mut self, cipher: TokenCipher) -> EngineBuilder {
        self.cipher = Some(cipher);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            cipher: self.cipher,
        })
    }
}
