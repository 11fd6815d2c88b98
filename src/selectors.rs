// src/selectors.rs

/// `transfer(address,uint256)`
pub const TRANSFER: &str = "0xa9059cbb";
/// `approve(address,uint256)`
pub const APPROVE: &str = "0x095ea7b3";
/// `transferFrom(address,address,uint256)`
pub const TRANSFER_FROM: &str = "0x23b872dd";

/// Function selectors this service can name, keyed by lowercase `0x` selector.
const KNOWN_SELECTORS: &[(&str, &str)] = &[
    // ERC-20
    (TRANSFER, "transfer(address,uint256)"),
    (TRANSFER_FROM, "transferFrom(address,address,uint256)"),
    (APPROVE, "approve(address,uint256)"),
    ("0x70a08231", "balanceOf(address)"),
    ("0x18160ddd", "totalSupply()"),
    ("0x313ce567", "decimals()"),
    ("0x95d89b41", "symbol()"),
    ("0x06fdde03", "name()"),
    ("0xdd62ed3e", "allowance(address,address)"),
    // Uniswap router
    (
        "0x38ed1739",
        "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)",
    ),
    (
        "0x8803dbee",
        "swapTokensForExactTokens(uint256,uint256,address[],address,uint256)",
    ),
    (
        "0x7ff36ab5",
        "swapExactETHForTokens(uint256,address[],address,uint256)",
    ),
    (
        "0x02751cec",
        "removeLiquidity(address,address,uint256,uint256,uint256,address,uint256)",
    ),
    // mint / burn / wrap
    ("0x3ccfd60b", "withdraw()"),
    ("0xa0712d68", "mint(uint256)"),
    ("0x42842e0e", "safeTransferFrom(address,address,uint256)"),
    ("0x2e1a7d4d", "withdraw(uint256)"),
    ("0xd0e30db0", "deposit()"),
    ("0x40c10f19", "mint(address,uint256)"),
    ("0x9dc29fac", "burn(address,uint256)"),
    ("0xa457c2d7", "decreaseAllowance(address,uint256)"),
    ("0x39509351", "increaseAllowance(address,uint256)"),
];

/// Look up the canonical signature for a `0x`-prefixed selector (any case).
pub fn lookup(selector: &str) -> Option<&'static str> {
    KNOWN_SELECTORS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(selector))
        .map(|(_, signature)| *signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    fn selector_of(signature: &str) -> String {
        format!("0x{}", hex::encode(&keccak256(signature.as_bytes())[..4]))
    }

    #[test]
    fn erc20_selectors_match_their_signature_hash() {
        for selector in [TRANSFER, APPROVE, TRANSFER_FROM] {
            let signature = lookup(selector).unwrap();
            assert_eq!(selector_of(signature), selector, "{signature}");
        }
        for signature in ["balanceOf(address)", "totalSupply()", "decimals()", "deposit()"] {
            assert_eq!(lookup(&selector_of(signature)), Some(signature));
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("0xA9059CBB"), Some("transfer(address,uint256)"));
    }

    #[test]
    fn unknown_selector_is_none() {
        assert_eq!(lookup("0xdeadbeef"), None);
    }

    #[test]
    fn table_has_no_duplicate_selectors() {
        for (i, (a, _)) in KNOWN_SELECTORS.iter().enumerate() {
            for (b, _) in &KNOWN_SELECTORS[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
