//! Transaction classification.

use crate::domain::{Transaction, TransactionKind};

/// Derive the semantic kind of a transaction from its populated fields.
///
/// Exactly one of `sender`/`recipient`/`article` set means a transfer or a
/// purchase; none set means a recharge. Direction follows the account owner:
/// a populated `sender` means money arrived, a populated `recipient` means
/// money left. Anything outside those four shapes is `Unclassified`; the
/// caller logs it and skips notification rather than guessing.
pub fn classify(t: &Transaction) -> TransactionKind {
    match (&t.sender, &t.recipient, &t.article) {
        (None, None, None) => TransactionKind::Recharge,
        (None, None, Some(_)) => TransactionKind::PurchaseArticle,
        (Some(_), None, None) => TransactionKind::ReceiveMoney,
        (None, Some(_), None) => TransactionKind::SendMoney,
        _ => TransactionKind::Unclassified,
    }
}
