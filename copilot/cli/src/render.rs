//! Terminal rendering for insight snapshots and finance data

use std::io::{self, Write};

use copilot_core::{Expense, SessionSnapshot, SessionStatus, Summary};

/// Writes newly revealed insight text as snapshots arrive
///
/// Each call to [`TypewriterRenderer::render`] prints only the characters
/// that became visible since the previous call, so the terminal shows the
/// same typewriter effect the session produces.
pub struct TypewriterRenderer<W: Write> {
    out: W,
    /// Characters already written
    printed: usize,
    /// Set once the closing line has been written
    closed: bool,
}

impl<W: Write> TypewriterRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            closed: false,
        }
    }

    /// Print the delta of `snapshot`, and the outcome once it settles
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }

        let fresh: String = snapshot.visible_text.chars().skip(self.printed).collect();
        if !fresh.is_empty() {
            self.printed += fresh.chars().count();
            self.out.write_all(fresh.as_bytes())?;
        }

        if snapshot.is_settled() {
            self.closed = true;
            match (&snapshot.error_message, snapshot.status) {
                (Some(message), SessionStatus::Error) => {
                    if self.printed > 0 {
                        writeln!(self.out)?;
                        writeln!(self.out)?;
                    }
                    writeln!(self.out, "⚠ {message}")?;
                }
                _ if snapshot.cancelled => writeln!(self.out, "\n[cancelled]")?,
                _ => writeln!(self.out)?,
            }
        }

        self.out.flush()
    }

    /// Whether the outcome line has been written
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Format an amount as rupees with Indian digit grouping (₹1,23,456.50)
pub fn format_rupees(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let paise = (amount.abs() * 100.0).round() as u64;
    let rupees = (paise / 100).to_string();
    let fraction = paise % 100;

    let grouped = if rupees.len() <= 3 {
        rupees
    } else {
        let (head, tail) = rupees.split_at(rupees.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut rest = head;
        while rest.len() > 2 {
            let (front, pair) = rest.split_at(rest.len() - 2);
            groups.push(pair);
            rest = front;
        }
        groups.push(rest);
        groups.reverse();
        format!("{},{tail}", groups.join(","))
    };

    format!("{sign}₹{grouped}.{fraction:02}")
}

/// Multi-line summary block
pub fn format_summary(summary: &Summary) -> String {
    format!(
        "Income:    {}\nExpenses:  {}\nSavings:   {} ({:.1}%)\nScore:     {}/100\n",
        format_rupees(summary.total_income),
        format_rupees(summary.total_expense),
        format_rupees(summary.savings),
        summary.savings_percent,
        summary.financial_score,
    )
}

/// One line per expense, newest first as returned by the backend
pub fn format_expenses(expenses: &[Expense]) -> String {
    if expenses.is_empty() {
        return "No expenses recorded.\n".to_string();
    }

    let mut out = String::new();
    for expense in expenses {
        let date = expense
            .date
            .map_or_else(|| "----------".to_string(), |d| d.to_string());
        out.push_str(&format!(
            "{date}  {:<14} {:>14}\n",
            expense.category,
            format_rupees(expense.amount)
        ));
    }
    out
}
