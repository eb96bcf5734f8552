// Wallet ledger
//
// Every credit that moves in the system moves through here: one typed entry
// per mutation, balance_after chained, the debt floor enforced on debits.
// The repository applies the balance update and the append as one step, so
// a ledger replay always matches the live balance.

use chrono::{DateTime, Utc};

use crate::errors::MarketError;
use crate::models::{EntryKind, LedgerEntry};
use crate::store::Repository;

/// Debt-floor predicate: may `amount` leave `balance` without crossing
/// -max_debt?
pub fn validate(balance: i64, amount: i64, max_debt: i64) -> bool {
    balance - amount >= -max_debt
}

/// Debit `amount` (> 0) from the user under the given entry kind.
pub fn debit<R: Repository>(
    repo: &mut R,
    now: DateTime<Utc>,
    username: &str,
    amount: i64,
    max_debt: i64,
    kind: EntryKind,
) -> Result<LedgerEntry, MarketError> {
    if amount <= 0 {
        return Err(MarketError::InvalidAmount(format!(
            "debit amount must be positive, got {}",
            amount
        )));
    }
    let user = repo
        .get_user(username)
        .ok_or_else(|| MarketError::UserNotFound(username.to_string()))?;
    if !validate(user.account_balance, amount, max_debt) {
        return Err(MarketError::InsufficientBalance {
            username: username.to_string(),
            required: amount,
            available: user.account_balance + max_debt,
        });
    }
    let entry = repo.apply_wallet_entry(LedgerEntry {
        id: 0,
        username: username.to_string(),
        amount: -amount,
        kind,
        balance_after: user.account_balance - amount,
        created_at: now,
    })?;
    tracing::debug!(
        user = %username,
        amount,
        kind = ?kind,
        balance = entry.balance_after,
        "wallet debit"
    );
    Ok(entry)
}

/// Credit `amount` (> 0) to the user. Credits have no floor to check.
pub fn credit<R: Repository>(
    repo: &mut R,
    now: DateTime<Utc>,
    username: &str,
    amount: i64,
    kind: EntryKind,
) -> Result<LedgerEntry, MarketError> {
    if amount <= 0 {
        return Err(MarketError::InvalidAmount(format!(
            "credit amount must be positive, got {}",
            amount
        )));
    }
    let user = repo
        .get_user(username)
        .ok_or_else(|| MarketError::UserNotFound(username.to_string()))?;
    let entry = repo.apply_wallet_entry(LedgerEntry {
        id: 0,
        username: username.to_string(),
        amount,
        kind,
        balance_after: user.account_balance + amount,
        created_at: now,
    })?;
    tracing::debug!(
        user = %username,
        amount,
        kind = ?kind,
        balance = entry.balance_after,
        "wallet credit"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .insert_user(User {
                username: "alice".to_string(),
                account_balance: 0,
                created_at: t0(),
            })
            .unwrap();
        store
    }

    #[test]
    fn validate_is_exact_at_the_floor() {
        assert!(validate(0, 500, 500));
        assert!(!validate(0, 501, 500));
        assert!(validate(-499, 1, 500));
        assert!(!validate(-500, 1, 500));
    }

    #[test]
    fn debit_to_the_floor_then_one_more_fails() {
        let mut repo = store();
        debit(&mut repo, t0(), "alice", 500, 500, EntryKind::Buy).unwrap();
        assert_eq!(repo.get_user("alice").unwrap().account_balance, -500);

        let err = debit(&mut repo, t0(), "alice", 1, 500, EntryKind::Buy).unwrap_err();
        assert_eq!(
            err,
            MarketError::InsufficientBalance {
                username: "alice".to_string(),
                required: 1,
                available: 0,
            }
        );
        // nothing landed in the ledger for the refused debit
        assert_eq!(repo.ledger_for_user("alice").len(), 1);
    }

    #[test]
    fn entries_chain_balance_after() {
        let mut repo = store();
        debit(&mut repo, t0(), "alice", 30, 500, EntryKind::Buy).unwrap();
        credit(&mut repo, t0(), "alice", 45, EntryKind::Sale).unwrap();
        debit(&mut repo, t0(), "alice", 5, 500, EntryKind::Fee).unwrap();

        let entries = repo.ledger_for_user("alice");
        let after: Vec<i64> = entries.iter().map(|e| e.balance_after).collect();
        assert_eq!(after, vec![-30, 15, 10]);

        let replayed: i64 = entries.iter().map(|e| e.amount).sum();
        assert_eq!(replayed, repo.get_user("alice").unwrap().account_balance);
    }

    #[test]
    fn credit_has_no_floor() {
        let mut repo = store();
        // deep in debt, credits still land
        debit(&mut repo, t0(), "alice", 500, 500, EntryKind::Buy).unwrap();
        credit(&mut repo, t0(), "alice", 2, EntryKind::Win).unwrap();
        assert_eq!(repo.get_user("alice").unwrap().account_balance, -498);
    }

    #[test]
    fn unknown_user_is_reported_before_any_write() {
        let mut repo = store();
        let err = debit(&mut repo, t0(), "ghost", 1, 500, EntryKind::Buy).unwrap_err();
        assert_eq!(err, MarketError::UserNotFound("ghost".to_string()));
        assert!(repo.list_ledger_entries().is_empty());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut repo = store();
        assert!(debit(&mut repo, t0(), "alice", 0, 500, EntryKind::Buy).is_err());
        assert!(credit(&mut repo, t0(), "alice", -5, EntryKind::Sale).is_err());
    }
}
