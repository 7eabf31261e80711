// ⚖️ Balance Analyzer - total asset size from checking accounts and loans
//
// Both account kinds share one fold: compute each final balance, flag the
// negative ones, add each account's contribution to a running total.
//   checking: overdrawn balance is owed to the institution → adds |balance|
//   loan:     overpaid balance is owed by the institution → adds balance as-is

use rust_decimal::Decimal;
use serde::Serialize;

use crate::entities::{CheckingAccount, FinalBalance, LoanAccount};
use crate::report::{ReportEvent, ReportSink};

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckingTotals {
    pub total: Decimal,
    /// Accounts with a negative final balance, input order
    pub overdrawn: Vec<CheckingAccount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanTotals {
    pub total: Decimal,
    /// Loans with a negative final balance, input order
    pub overpaid: Vec<LoanAccount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetReport {
    pub checking: CheckingTotals,
    pub loans: LoanTotals,
    pub total_asset_size: Decimal,
}

// ============================================================================
// SHARED FOLD
// ============================================================================

/// Sum contributions, collecting accounts whose final balance is negative
fn fold_balances<A, F>(accounts: &[A], contribution: F) -> (Decimal, Vec<A>)
where
    A: FinalBalance + Clone,
    F: Fn(Decimal) -> Decimal,
{
    let mut total = Decimal::ZERO;
    let mut negative = Vec::new();

    for account in accounts {
        let balance = account.final_balance();
        total += contribution(balance);

        if balance < Decimal::ZERO {
            negative.push(account.clone());
        }
    }

    (total, negative)
}

pub fn compute_checking_totals(accounts: &[CheckingAccount]) -> CheckingTotals {
    let (total, overdrawn) = fold_balances(accounts, |balance| balance.abs());
    CheckingTotals { total, overdrawn }
}

pub fn compute_loan_totals(loans: &[LoanAccount]) -> LoanTotals {
    let (total, overpaid) = fold_balances(loans, |balance| balance);
    LoanTotals { total, overpaid }
}

pub fn total_asset_size(checking: &CheckingTotals, loans: &LoanTotals) -> Decimal {
    checking.total + loans.total
}

pub fn analyze(checking: &[CheckingAccount], loans: &[LoanAccount]) -> AssetReport {
    let checking = compute_checking_totals(checking);
    let loans = compute_loan_totals(loans);
    let total = total_asset_size(&checking, &loans);

    AssetReport {
        checking,
        loans,
        total_asset_size: total,
    }
}

/// Emit overdrawn accounts, overpaid loans, then the total
pub fn report_analysis<R: ReportSink + ?Sized>(report: &AssetReport, sink: &mut R) {
    for account in &report.checking.overdrawn {
        sink.emit(ReportEvent::OverdrawnAccount {
            id: account.id().to_string(),
            owner: account.owner().to_string(),
            balance: account.final_balance(),
        });
    }

    for loan in &report.loans.overpaid {
        sink.emit(ReportEvent::OverpaidLoan {
            id: loan.id().to_string(),
            owner: loan.owner().to_string(),
            balance: loan.final_balance(),
        });
    }

    sink.emit(ReportEvent::TotalAssetSize {
        value: report.total_asset_size,
    });
}
