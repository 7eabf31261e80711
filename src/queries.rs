// 🔎 Account Queries - loaded tables → CheckingAccount / LoanAccount
//
// CHECKING and LOANS are joined with TRANSACTIONS (left join, so accounts
// without activity still appear), ACCOUNTS and MEMBERS, ordered by account
// id then posting date. Rows fold into one account per id.

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::db::{quote_ident, Database, SqlRow, SqlValue};
use crate::entities::{AccountData, CheckingAccount, LoanAccount, LoanConvention, Owner};

/// Which account table to read and which column holds its opening amount
struct AccountSource {
    table: &'static str,
    balance_column: &'static str,
}

const CHECKING: AccountSource = AccountSource {
    table: "CHECKING",
    balance_column: "STARTING_BALANCE",
};

const LOANS: AccountSource = AccountSource {
    table: "LOANS",
    balance_column: "STARTING_DEBT",
};

fn account_query(schema: &str, source: &AccountSource) -> String {
    let s = quote_ident(schema);
    format!(
        "SELECT
            x.\"ACCOUNT_GUID\" AS account_guid,
            x.\"{balance}\" AS starting_balance,
            t.\"TRANSACTION_AMOUNT\" AS transaction_amount,
            t.\"POST_DATE\" AS post_date,
            m.\"FIRST_NAME\" AS first_name,
            m.\"LAST_NAME\" AS last_name
         FROM {s}.\"{table}\" x
         LEFT JOIN {s}.\"TRANSACTIONS\" t ON x.\"ACCOUNT_GUID\" = t.\"ACCOUNT_GUID\"
         JOIN {s}.\"ACCOUNTS\" a ON x.\"ACCOUNT_GUID\" = a.\"ACCOUNT_GUID\"
         JOIN {s}.\"MEMBERS\" m ON a.\"MEMBER_GUID\" = m.\"MEMBER_GUID\"
         ORDER BY x.\"ACCOUNT_GUID\", t.\"POST_DATE\"",
        balance = source.balance_column,
        table = source.table,
        s = s,
    )
}

/// Exact decimal from whatever storage class the driver returned
pub fn decode_decimal(value: &SqlValue) -> Result<Option<Decimal>> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Integer(i) => Ok(Some(Decimal::from(*i))),
        SqlValue::Real(f) => Decimal::try_from(*f)
            .map(Some)
            .map_err(|e| anyhow!("cannot represent {} as a decimal: {}", f, e)),
        SqlValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .map(Some)
                .map_err(|e| anyhow!("cannot parse {:?} as a decimal: {}", s, e))
        }
    }
}

fn text(row: &SqlRow, column: &str) -> String {
    row.get(column)
        .and_then(SqlValue::as_text)
        .unwrap_or_default()
}

fn fetch_accounts<D: Database + ?Sized>(
    db: &mut D,
    schema: &str,
    source: &AccountSource,
) -> Result<Vec<AccountData>> {
    let sql = account_query(schema, source);
    debug!("{}", sql);

    let rows = db
        .query(&sql, &[])
        .with_context(|| format!("Failed to query {}.{}", schema, source.table))?;

    let mut accounts: Vec<AccountData> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in &rows {
        let id = text(row, "account_guid");

        let idx = match index.get(&id) {
            Some(&i) => i,
            None => {
                let starting = row
                    .get("starting_balance")
                    .map(decode_decimal)
                    .transpose()
                    .with_context(|| format!("Bad {} for account {}", source.balance_column, id))?
                    .flatten()
                    .unwrap_or_else(|| {
                        warn!("account {} has no {}; using 0", id, source.balance_column);
                        Decimal::ZERO
                    });

                let owner = Owner::new(text(row, "first_name"), text(row, "last_name"));
                accounts.push(AccountData::new(id.clone(), starting, owner));
                index.insert(id.clone(), accounts.len() - 1);
                accounts.len() - 1
            }
        };

        let amount = row
            .get("transaction_amount")
            .map(decode_decimal)
            .transpose()
            .with_context(|| format!("Bad TRANSACTION_AMOUNT for account {}", id))?
            .flatten();

        if let Some(amount) = amount {
            accounts[idx].push_transaction(amount);
        }
    }

    debug!("{} {} account(s) from {} row(s)", accounts.len(), source.table, rows.len());
    Ok(accounts)
}

pub fn fetch_checking_accounts<D: Database + ?Sized>(
    db: &mut D,
    schema: &str,
) -> Result<Vec<CheckingAccount>> {
    Ok(fetch_accounts(db, schema, &CHECKING)?
        .into_iter()
        .map(CheckingAccount::from_data)
        .collect())
}

pub fn fetch_loan_accounts<D: Database + ?Sized>(
    db: &mut D,
    schema: &str,
    convention: LoanConvention,
) -> Result<Vec<LoanAccount>> {
    Ok(fetch_accounts(db, schema, &LOANS)?
        .into_iter()
        .map(|data| LoanAccount::from_data(data, convention))
        .collect())
}
