//! Command implementations.

pub mod cart;
pub mod checkout;
pub mod shipping;

use std::io::{BufRead, Write};

/// Yes/no prompt on the terminal. Returns `false` on EOF or any answer
/// other than `y`/`yes`.
pub(crate) fn confirm(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
