//! Fixed-pattern checks on tool arguments.

/// Method prefixes that sign, send or administer. Never relayed.
const BLOCKED_PREFIXES: &[&str] = &[
    "eth_send",
    "eth_sign",
    "eth_submit",
    "personal_",
    "admin_",
    "debug_",
    "miner_",
    "txpool_",
];

const BLOCK_TAGS: &[&str] = &["latest", "earliest", "pending", "safe", "finalized"];

fn is_hex_of_len(value: &str, hex_len: usize) -> bool {
    value
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == hex_len && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// `0x` followed by 40 hex digits.
pub fn validate_address(value: &str) -> Result<(), String> {
    if is_hex_of_len(value, 40) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a 0x-prefixed 20-byte hex address"))
    }
}

/// `0x` followed by 64 hex digits.
pub fn validate_tx_hash(value: &str) -> Result<(), String> {
    if is_hex_of_len(value, 64) {
        Ok(())
    } else {
        Err(format!("'{value}' is not a 0x-prefixed 32-byte transaction hash"))
    }
}

/// A named block tag or a hex block number.
pub fn validate_block(value: &str) -> Result<(), String> {
    if BLOCK_TAGS.contains(&value) {
        return Ok(());
    }
    let is_quantity = value
        .strip_prefix("0x")
        .is_some_and(|hex| !hex.is_empty() && hex.len() <= 16 && hex.bytes().all(|b| b.is_ascii_hexdigit()));
    if is_quantity {
        Ok(())
    } else {
        Err(format!(
            "'{value}' is not a block tag ({}) or hex block number",
            BLOCK_TAGS.join(", ")
        ))
    }
}

/// `namespace_method` shape, read-only namespaces only.
pub fn validate_method_name(value: &str) -> Result<(), String> {
    let well_formed = value
        .split_once('_')
        .is_some_and(|(namespace, name)| {
            !namespace.is_empty()
                && !name.is_empty()
                && namespace.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        });
    if !well_formed {
        return Err(format!("'{value}' is not a JSON-RPC method name like 'eth_blockNumber'"));
    }
    if BLOCKED_PREFIXES.iter().any(|prefix| value.starts_with(prefix)) {
        return Err(format!("'{value}' is not allowed: only read-only methods are relayed"));
    }
    Ok(())
}
