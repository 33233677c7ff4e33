//! Account rotation by minute of the hour
//!
//! The hour is split into equal-width slices, one per account, in list
//! order. With two accounts minutes 0-29 belong to the first and 30-59 to
//! the second.

use crate::types::AccountId;

/// Upper bound on rotating accounts; beyond this some would own no minute
pub const MAX_ACCOUNTS: usize = 60;

/// Pick the account that owns `minute_of_hour`.
///
/// Minutes above 59 are clamped. Returns `None` only for an empty list.
pub fn select_account(minute_of_hour: u32, accounts: &[AccountId]) -> Option<&AccountId> {
    if accounts.is_empty() {
        return None;
    }
    accounts.get(slot_for(minute_of_hour, accounts.len()))
}

/// Index of the slot that owns `minute_of_hour` when the hour is divided
/// into `count` slices.
pub fn slot_for(minute_of_hour: u32, count: usize) -> usize {
    let minute = minute_of_hour.min(59) as usize;
    (minute * count / 60).min(count.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts(n: usize) -> Vec<AccountId> {
        (1..=n).map(|i| AccountId::new(format!("account{}", i))).collect()
    }

    #[test]
    fn test_two_accounts_split_on_half_hour() {
        let list = accounts(2);
        for minute in 0..30 {
            assert_eq!(select_account(minute, &list).unwrap().as_str(), "account1");
        }
        for minute in 30..60 {
            assert_eq!(select_account(minute, &list).unwrap().as_str(), "account2");
        }
    }

    #[test]
    fn test_selection_is_idempotent() {
        let list = accounts(2);
        let first = select_account(17, &list).cloned();
        for _ in 0..10 {
            assert_eq!(select_account(17, &list).cloned(), first);
        }
    }

    #[test]
    fn test_empty_list() {
        assert!(select_account(10, &[]).is_none());
    }

    #[test]
    fn test_single_account_owns_whole_hour() {
        let list = accounts(1);
        assert!((0..60).all(|m| select_account(m, &list) == Some(&list[0])));
    }

    #[test]
    fn test_three_accounts_equal_slices() {
        let list = accounts(3);
        assert_eq!(select_account(0, &list).unwrap().as_str(), "account1");
        assert_eq!(select_account(19, &list).unwrap().as_str(), "account1");
        assert_eq!(select_account(20, &list).unwrap().as_str(), "account2");
        assert_eq!(select_account(39, &list).unwrap().as_str(), "account2");
        assert_eq!(select_account(40, &list).unwrap().as_str(), "account3");
        assert_eq!(select_account(59, &list).unwrap().as_str(), "account3");
    }

    #[test]
    fn test_out_of_range_minute_is_clamped() {
        let list = accounts(2);
        assert_eq!(select_account(75, &list).unwrap().as_str(), "account2");
    }

    #[test]
    fn test_every_account_owns_a_minute_up_to_max() {
        for n in 1..=MAX_ACCOUNTS {
            let mut owned = vec![false; n];
            for minute in 0..60 {
                owned[slot_for(minute, n)] = true;
            }
            assert!(owned.iter().all(|o| *o), "{} accounts", n);
        }
    }
}
