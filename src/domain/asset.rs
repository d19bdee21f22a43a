//! Asset registry: symbol precision and on-chain coin type normalization.

use crate::domain::Symbol;
use std::collections::BTreeMap;

/// Registry of the assets the fund touches: smallest-unit precision per
/// symbol plus the mapping from fully-qualified on-chain coin types to
/// display symbols.
#[derive(Debug, Clone)]
pub struct AssetBook {
    decimals: BTreeMap<Symbol, u32>,
    coin_types: Vec<(String, Symbol)>,
}

impl AssetBook {
    pub fn new() -> Self {
        Self {
            decimals: BTreeMap::new(),
            coin_types: Vec::new(),
        }
    }

    /// The assets the fund's strategy touches on mainnet.
    pub fn mainnet() -> Self {
        Self::new()
            .with_asset("SUI", 9, &["::sui::SUI"])
            .with_asset("USDC", 6, &["::usdc::USDC"])
            .with_asset("DEEP", 6, &["::deep::DEEP"])
            .with_asset("AT1000I", 9, &["::AT1000i_ALPHA::AT1000I_ALPHA"])
    }

    /// Register an asset with its precision and coin-type suffixes.
    pub fn with_asset(mut self, symbol: &str, decimals: u32, type_suffixes: &[&str]) -> Self {
        let sym = Symbol::new(symbol.to_string());
        self.decimals.insert(sym.clone(), decimals);
        for suffix in type_suffixes {
            self.coin_types.push((suffix.to_string(), sym.clone()));
        }
        self
    }

    /// Precision (number of decimal places) for a symbol.
    pub fn decimals(&self, symbol: &Symbol) -> Option<u32> {
        self.decimals.get(symbol).copied()
    }

    /// Normalize a fully-qualified coin type (e.g.
    /// `0xdba3...::usdc::USDC`) to a symbol. Unknown types fall back to
    /// their trailing type name so they still group consistently.
    pub fn symbol_for_coin_type(&self, coin_type: &str) -> Symbol {
        for (suffix, symbol) in &self.coin_types {
            if coin_type.ends_with(suffix.as_str()) || coin_type.contains(suffix.as_str()) {
                return symbol.clone();
            }
        }
        let trailing = coin_type.rsplit("::").next().unwrap_or(coin_type);
        if trailing.is_empty() {
            Symbol::new("TOKEN".to_string())
        } else {
            Symbol::new(trailing.to_string())
        }
    }
}

impl Default for AssetBook {
    fn default() -> Self {
        Self::mainnet()
    }
}
