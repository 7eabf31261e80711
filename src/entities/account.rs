// 💳 Account Entities - checking accounts and loans
//
// Both kinds carry the same data: id, starting balance, owner and the
// transaction amounts in posting-date order. They differ only in how the
// transactions fold into a final balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// OWNER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub first_name: String,
    pub last_name: String,
}

impl Owner {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Owner {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// SHARED ACCOUNT DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountData {
    id: String,
    starting_balance: Decimal,
    owner: Owner,
    /// Signed amounts, posting date ascending
    transactions: Vec<Decimal>,
}

impl AccountData {
    pub fn new(id: impl Into<String>, starting_balance: Decimal, owner: Owner) -> Self {
        AccountData {
            id: id.into(),
            starting_balance,
            owner,
            transactions: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn transactions(&self) -> &[Decimal] {
        &self.transactions
    }

    /// Append the next transaction (callers push in posting-date order)
    pub fn push_transaction(&mut self, amount: Decimal) {
        self.transactions.push(amount);
    }

    fn transaction_sum(&self) -> Decimal {
        self.transactions.iter().copied().sum()
    }
}

/// Capability shared by both account kinds
pub trait FinalBalance {
    fn data(&self) -> &AccountData;

    /// Starting balance folded with every transaction by the kind's rule
    fn final_balance(&self) -> Decimal;

    fn id(&self) -> &str {
        self.data().id()
    }

    fn owner(&self) -> &Owner {
        self.data().owner()
    }
}

// ============================================================================
// CHECKING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckingAccount {
    #[serde(flatten)]
    data: AccountData,
}

impl CheckingAccount {
    pub fn new(id: impl Into<String>, starting_balance: Decimal, owner: Owner) -> Self {
        Self::from_data(AccountData::new(id, starting_balance, owner))
    }

    pub fn from_data(data: AccountData) -> Self {
        CheckingAccount { data }
    }

    pub fn with_transactions(mut self, amounts: impl IntoIterator<Item = Decimal>) -> Self {
        for amount in amounts {
            self.data.push_transaction(amount);
        }
        self
    }

    pub fn push_transaction(&mut self, amount: Decimal) {
        self.data.push_transaction(amount);
    }
}

impl FinalBalance for CheckingAccount {
    fn data(&self) -> &AccountData {
        &self.data
    }

    /// starting + Σ transactions
    fn final_balance(&self) -> Decimal {
        self.data.starting_balance + self.data.transaction_sum()
    }
}

// ============================================================================
// LOAN
// ============================================================================

/// How loan transactions move the outstanding debt.
///
/// The source data does not say; positive amounts are assumed to be
/// payments. Kept explicit so the assumption can be flipped per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanConvention {
    /// final = starting debt − Σ transactions
    #[default]
    PaymentsReduceDebt,
    /// final = starting debt + Σ transactions
    PaymentsIncreaseDebt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanAccount {
    #[serde(flatten)]
    data: AccountData,
    convention: LoanConvention,
}

impl LoanAccount {
    pub fn new(
        id: impl Into<String>,
        starting_debt: Decimal,
        owner: Owner,
        convention: LoanConvention,
    ) -> Self {
        Self::from_data(AccountData::new(id, starting_debt, owner), convention)
    }

    pub fn from_data(data: AccountData, convention: LoanConvention) -> Self {
        LoanAccount { data, convention }
    }

    pub fn with_transactions(mut self, amounts: impl IntoIterator<Item = Decimal>) -> Self {
        for amount in amounts {
            self.data.push_transaction(amount);
        }
        self
    }

    pub fn push_transaction(&mut self, amount: Decimal) {
        self.data.push_transaction(amount);
    }

    pub fn convention(&self) -> LoanConvention {
        self.convention
    }
}

impl FinalBalance for LoanAccount {
    fn data(&self) -> &AccountData {
        &self.data
    }

    fn final_balance(&self) -> Decimal {
        match self.convention {
            LoanConvention::PaymentsReduceDebt => {
                self.data.starting_balance - self.data.transaction_sum()
            }
            LoanConvention::PaymentsIncreaseDebt => {
                self.data.starting_balance + self.data.transaction_sum()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_checking_final_balance() {
        let account = CheckingAccount::new("c-1", dec("100"), Owner::new("Ada", "Lovelace"))
            .with_transactions(vec![dec("-150"), dec("20.25"), dec("0.10")]);

        assert_eq!(account.final_balance(), dec("-29.65"));
        assert_eq!(account.data().starting_balance(), dec("100"));
        assert_eq!(account.data().transactions().len(), 3);
    }

    #[test]
    fn test_checking_without_transactions() {
        let account = CheckingAccount::new("c-2", dec("42.00"), Owner::new("A", "B"));

        assert_eq!(account.final_balance(), dec("42.00"));
    }

    #[test]
    fn test_loan_payments_reduce_debt() {
        let loan = LoanAccount::new(
            "l-1",
            dec("200"),
            Owner::new("Grace", "Hopper"),
            LoanConvention::default(),
        )
        .with_transactions(vec![dec("250")]);

        assert_eq!(loan.final_balance(), dec("-50"));
        assert_eq!(loan.owner().to_string(), "Grace Hopper");
        assert_eq!(loan.id(), "l-1");
    }

    #[test]
    fn test_loan_payments_increase_debt() {
        let loan = LoanAccount::new(
            "l-2",
            dec("200"),
            Owner::new("A", "B"),
            LoanConvention::PaymentsIncreaseDebt,
        )
        .with_transactions(vec![dec("-250")]);

        assert_eq!(loan.final_balance(), dec("-50"));
    }

    #[test]
    fn test_exact_decimal_arithmetic() {
        let account = CheckingAccount::new("c-3", dec("0.1"), Owner::new("A", "B"))
            .with_transactions(vec![dec("0.2")]);

        assert_eq!(account.final_balance(), dec("0.3"));
    }
}
