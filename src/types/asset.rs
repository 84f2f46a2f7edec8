use serde::{Deserialize, Serialize};

/// Selects which upstream API prices a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    #[default]
    Crypto,
    Stock,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "crypto",
            AssetClass::Stock => "stock",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "crypto" => Some(AssetClass::Crypto),
            "stock" => Some(AssetClass::Stock),
            _ => None,
        }
    }
}

/// Trim and uppercase a user-supplied symbol. Returns `None` for blank input
/// or characters outside `[A-Z0-9.-^=]`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || symbol.len() > 20 {
        return None;
    }
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    valid.then_some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_symbol_uppercases_and_trims() {
        assert_eq!(normalize_symbol("  btc "), Some("BTC".to_string()));
        assert_eq!(normalize_symbol("brk-b"), Some("BRK-B".to_string()));
        assert_eq!(normalize_symbol("^gspc"), Some("^GSPC".to_string()));
    }

    #[test]
    fn normalize_symbol_rejects_blank_and_garbage() {
        assert_eq!(normalize_symbol("   "), None);
        assert_eq!(normalize_symbol("BTC/USDT"), None);
        assert_eq!(normalize_symbol("a b"), None);
    }
}
