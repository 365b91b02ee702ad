//! Display and conversion helpers for addresses, balances and signatures.

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Shortens an address to `chars` leading and trailing characters.
///
/// Addresses short enough to show in full are returned unchanged.
pub fn format_address(address: &str, chars: usize) -> String {
    let len = address.chars().count();
    if len <= chars * 2 + 3 {
        return address.to_string();
    }
    let head: String = address.chars().take(chars).collect();
    let tail: String = address.chars().skip(len - chars).collect();
    format!("{}...{}", head, tail)
}

/// Formats a SOL amount with thousands separators and two to four decimals.
pub fn format_balance(sol: f64) -> String {
    if !sol.is_finite() {
        return "0.00".to_string();
    }

    let scaled = (sol.abs() * 10_000.0).round() as u128;
    let whole = scaled / 10_000;
    let mut fraction = format!("{:04}", scaled % 10_000);
    while fraction.len() > 2 && fraction.ends_with('0') {
        fraction.pop();
    }

    let sign = if sol < 0.0 && scaled > 0 { "-" } else { "" };
    format!("{}{}.{}", sign, group_thousands(whole), fraction)
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Explorer link for a transaction on `network`.
pub fn explorer_url(base: &str, signature: &str, network: &str) -> String {
    format!(
        "{}/tx/{}?cluster={}",
        base.trim_end_matches('/'),
        signature,
        network
    )
}

/// Converts SOL to lamports, rounding to the nearest lamport.
///
/// Returns `None` for negative, non-finite or out-of-range amounts.
pub fn sol_to_lamports(sol: f64) -> Option<u64> {
    if !sol.is_finite() || sol < 0.0 {
        return None;
    }
    let lamports = (sol * LAMPORTS_PER_SOL as f64).round();
    if lamports > u64::MAX as f64 {
        return None;
    }
    Some(lamports as u64)
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Loose check for a base58 account address.
pub fn is_valid_address(address: &str) -> bool {
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}
