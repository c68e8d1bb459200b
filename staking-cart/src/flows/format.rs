//! Human-readable amounts for labels and descriptions

use ethers::types::{Address, U256};
use ethers::utils;

/// Default token decimals
pub const TOKEN_DECIMALS: u32 = 18;

/// Format a base-unit amount with `decimals`, trimming trailing zeros and
/// grouping thousands. `1_500_000_000_000_000_000` with 18 decimals → `"1.5"`.
pub fn format_units(amount: U256, decimals: u32) -> String {
    let formatted = match utils::format_units(amount, decimals) {
        Ok(s) => s,
        Err(e) => {
            log::debug!("[Flows] Cannot scale {} by {} decimals: {}", amount, decimals, e);
            return group_thousands(&amount.to_string());
        }
    };

    let (whole, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        group_thousands(whole)
    } else {
        format!("{}.{}", group_thousands(whole), frac)
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `0x1234…abcd`
pub fn short_address(address: &Address) -> String {
    let full = format!("{:?}", address);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}
