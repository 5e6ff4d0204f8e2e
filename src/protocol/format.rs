//! Size-bounded text rendering of upstream results.

use serde_json::Value;

/// Render a result for `method` and bound it to `max_chars` characters.
pub fn format_result(method: &str, result: &Value, max_chars: usize) -> String {
    let text = match (method, result) {
        (_, Value::Null) => format!("No result returned for {method}"),
        ("eth_blockNumber", Value::String(hex)) => match parse_quantity(hex) {
            Some(n) => format!("Block number: {n} ({hex})"),
            None => pretty(result),
        },
        ("eth_gasPrice", Value::String(hex)) => match parse_quantity(hex) {
            Some(wei) => format!("Gas price: {wei} wei ({} gwei)", scale(wei, 9)),
            None => pretty(result),
        },
        ("eth_getBalance", Value::String(hex)) => match parse_quantity(hex) {
            Some(wei) => format!("Balance: {wei} wei ({} ETH)", scale(wei, 18)),
            None => pretty(result),
        },
        _ => pretty(result),
    };
    truncate(text, max_chars)
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn parse_quantity(hex: &str) -> Option<u128> {
    let digits = hex.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    u128::from_str_radix(digits, 16).ok()
}

/// `value / 10^decimals` as a decimal string without trailing zeros.
fn scale(value: u128, decimals: u32) -> String {
    let unit = 10u128.pow(decimals);
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Cut `text` to `max_chars` characters on a char boundary.
pub fn truncate(text: String, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    format!(
        "{}\n... [truncated {} more characters]",
        &text[..cut],
        total - max_chars
    )
}
