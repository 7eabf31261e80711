// Entity Models
// Accounts built fresh per analysis run from query results; never written back.

pub mod account;

pub use account::{
    AccountData, CheckingAccount, FinalBalance, LoanAccount, LoanConvention, Owner,
};
