//! Request and response bodies for the finance backend

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Expense to record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    /// Amount in rupees
    pub amount: f64,
    /// Category label ("Food", "Rent", ...)
    pub category: String,
    /// Day the money was spent
    pub date: NaiveDate,
    /// Owning user
    pub user_id: u64,
}

/// Income to record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewIncome {
    /// Amount in rupees
    pub amount: f64,
    /// Where it came from ("Salary", ...)
    pub source: String,
    /// Day it was received
    pub date: NaiveDate,
    /// Owning user
    pub user_id: u64,
}

/// A recorded expense as returned by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Row id
    pub id: u64,
    /// Amount in rupees
    pub amount: f64,
    /// Category label
    pub category: String,
    /// Day spent, when the backend recorded one
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Owning user
    #[serde(default)]
    pub user_id: Option<u64>,
}

/// Monthly totals for one user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Sum of recorded income
    pub total_income: f64,
    /// Sum of recorded expenses
    pub total_expense: f64,
    /// Income minus expenses
    pub savings: f64,
    /// Savings as a percentage of income
    pub savings_percent: f64,
    /// 0-100 health score
    #[serde(default)]
    pub financial_score: u32,
}

impl Summary {
    /// Derive savings and score from the two totals
    #[must_use]
    pub fn from_totals(total_income: f64, total_expense: f64) -> Self {
        let savings = total_income - total_expense;
        let savings_percent = if total_income > 0.0 {
            savings / total_income * 100.0
        } else {
            0.0
        };

        Self {
            total_income,
            total_expense,
            savings,
            savings_percent,
            financial_score: financial_score(savings_percent, total_income, total_expense),
        }
    }
}

/// Score a month: base 50, a bonus by savings band, a penalty for overspending
#[must_use]
pub fn financial_score(savings_percent: f64, total_income: f64, total_expense: f64) -> u32 {
    let mut score: i32 = 50;

    if savings_percent >= 30.0 {
        score += 30;
    } else if savings_percent >= 20.0 {
        score += 20;
    } else if savings_percent >= 10.0 {
        score += 10;
    }

    if total_expense > total_income {
        score -= 20;
    }

    score.clamp(0, 100).unsigned_abs()
}

/// Health check response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Banner returned by the backend
    pub message: String,
}
