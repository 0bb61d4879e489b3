//! Finance Backend API
//!
//! REST client for the endpoints that sit beside the insight stream:
//! recording expenses and income, listing expenses, and the monthly
//! summary. These calls are independent of any insight session.
//!
//! - `POST /expenses`, `POST /income` - record a transaction
//! - `GET /expenses/{user_id}` - list recorded expenses
//! - `GET /summary/{user_id}` - totals, savings and financial score
//! - `GET /` - health check

mod client;
mod types;

pub use client::FinanceApi;
pub use types::{financial_score, Expense, HealthStatus, NewExpense, NewIncome, Summary};
