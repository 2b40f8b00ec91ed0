use lazy_static::lazy_static;
use regex::Regex;

/// Symbols the password policy accepts; at least one is required.
const PASSWORD_SYMBOLS: &str = "@$!%*?&.";

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Password policy: at least 8 characters, one lower-case, one upper-case,
/// one digit and one symbol from the fixed set, with no characters outside
/// letters, digits and that set.
pub fn is_valid_password(password: &str) -> bool {
    if password.len() < 8 {
        return false;
    }
    let mut has_lower = false;
    let mut has_upper = false;
    let mut has_digit = false;
    let mut has_symbol = false;
    for c in password.chars() {
        match c {
            'a'..='z' => has_lower = true,
            'A'..='Z' => has_upper = true,
            '0'..='9' => has_digit = true,
            c if PASSWORD_SYMBOLS.contains(c) => has_symbol = true,
            _ => return false,
        }
    }
    has_lower && has_upper && has_digit && has_symbol
}
