//! Feed registry: symbol <-> upstream feed id

use std::collections::HashMap;

use crate::shared::errors::FeedError;
use crate::shared::types::{FeedId, FeedSymbol};

/// Upstream feed ids shipped with the crate
pub const BUILTIN_FEEDS: &[(&str, &str)] = &[
    // Major cryptocurrencies
    ("BTC/USD", "0xe62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43"),
    ("ETH/USD", "0xff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace"),
    ("SOL/USD", "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d"),
    ("BNB/USD", "0x2f95862b045670cd22bee3114c39763a4a08beeb663b145d283c31d7d1101c4f"),
    ("ADA/USD", "0x2a01deaec9e51a579277b34b122399984d0bbf57e2458a7e42fecd2829867a0d"),
    ("AVAX/USD", "0x93da3352f9f1d105fdfe4971cfa80e9dd777bfc5d0f683ebb6e1294b92137bb7"),
    ("MATIC/USD", "0x5de33a9112c2b700b8d30b8a3402c103578ccfa2765696471cc672bd5cf6ac52"),
    ("DOT/USD", "0xca3eed9b267293f6595901c734c7525ce8ef49adafe8284606ceb307afa2ca5b"),
    // DeFi
    ("UNI/USD", "0x78d185a741d07edb3412b09008b7c5cfb9bbbd7d568bf00ba737b456ba171501"),
    ("LINK/USD", "0x8ac0c70fff57e9aefdf5edf44b51d62c2d433653cbb2cf5cc06bb115af04d221"),
    ("AAVE/USD", "0x2b9ab1e972a281585084148ba1389800799bd4be63b957507db82dc7c9c0e702"),
    ("CRV/USD", "0xa19d04ac696c7a6616d291c7e5d1377cc8be437c327b75adb5dc1bad745fcae8"),
    // Stablecoins
    ("USDC/USD", "0xeaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a"),
    ("USDT/USD", "0x2b89b9dc8fdf9f34709a5b106b472f0f39bb6ca9ce04b0fd7f2e971688e2e53b"),
    ("DAI/USD", "0xb0948a5e5313200c632b51bb5ca32f6de0d36e9950a942d19751e833f70dabfd"),
    // Traditional assets
    ("GOLD/USD", "0x765d2ba906dbc32ca17cc11f5310a89e9ee1f6420508c63861f2f8ba4ee34bb2"),
    ("EUR/USD", "0xa995d00bb36a63cef7fd2c287dc105fc8f3d93779f062f09551b0af3e81ec30b"),
    ("GBP/USD", "0x84c2dde9633d93d1bcad84e7dc41c9d56578b7ec52fabedc1f335d673df0a7c1"),
];

/// Immutable symbol <-> feed id table.
///
/// Both directions are indexed at construction, so reverse lookups during
/// batch normalization stay O(1).
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    forward: HashMap<FeedSymbol, FeedId>,
    reverse: HashMap<FeedId, FeedSymbol>,
}

impl FeedRegistry {
    pub fn new<I>(entries: I) -> Result<Self, FeedError>
    where
        I: IntoIterator<Item = (FeedSymbol, FeedId)>,
    {
        let mut registry = Self::default();
        for (symbol, feed_id) in entries {
            registry.insert(symbol, feed_id)?;
        }
        Ok(registry)
    }

    /// Build from string pairs, e.g. a test fixture or config table
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Result<Self, FeedError> {
        let entries = pairs
            .iter()
            .map(|(symbol, id)| Ok((FeedSymbol::parse(symbol)?, FeedId::parse(id)?)))
            .collect::<Result<Vec<_>, FeedError>>()?;
        Self::new(entries)
    }

    /// Registry with the built-in feed table
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        for (symbol, id) in BUILTIN_FEEDS {
            if let (Ok(symbol), Ok(feed_id)) = (FeedSymbol::parse(symbol), FeedId::parse(id)) {
                // The table is checked by tests; a bad row is skipped rather than fatal.
                let _ = registry.insert(symbol, feed_id);
            }
        }
        registry
    }

    /// Replace or add entries on top of this registry
    pub fn with_overrides<I>(mut self, overrides: I) -> Result<Self, FeedError>
    where
        I: IntoIterator<Item = (FeedSymbol, FeedId)>,
    {
        for (symbol, feed_id) in overrides {
            if let Some(previous) = self.forward.remove(&symbol) {
                self.reverse.remove(&previous);
            }
            self.insert(symbol, feed_id)?;
        }
        Ok(self)
    }

    fn insert(&mut self, symbol: FeedSymbol, feed_id: FeedId) -> Result<(), FeedError> {
        if let Some(existing) = self.reverse.get(&feed_id) {
            if existing != &symbol {
                return Err(FeedError::DuplicateFeed {
                    feed_id: feed_id.to_string(),
                    symbol: existing.to_string(),
                });
            }
        }
        if let Some(previous) = self.forward.insert(symbol.clone(), feed_id) {
            self.reverse.remove(&previous);
        }
        self.reverse.insert(feed_id, symbol);
        Ok(())
    }

    /// Symbol -> feed id. Accepts loose input such as `btc-usd`.
    pub fn resolve(&self, symbol: &str) -> Result<FeedId, FeedError> {
        let symbol = FeedSymbol::parse(symbol)?;
        self.forward
            .get(&symbol)
            .copied()
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))
    }

    /// Feed id as sent by the upstream (with or without `0x`, any case) -> symbol
    pub fn reverse(&self, feed_id: &str) -> Result<FeedSymbol, FeedError> {
        let id = FeedId::parse(feed_id)?;
        self.reverse_id(&id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownSymbol(feed_id.to_string()))
    }

    pub fn reverse_id(&self, feed_id: &FeedId) -> Option<&FeedSymbol> {
        self.reverse.get(feed_id)
    }

    pub fn feed_id(&self, symbol: &FeedSymbol) -> Option<FeedId> {
        self.forward.get(symbol).copied()
    }

    pub fn contains(&self, symbol: &FeedSymbol) -> bool {
        self.forward.contains_key(symbol)
    }

    /// All registered symbols, sorted
    pub fn symbols(&self) -> Vec<FeedSymbol> {
        let mut symbols: Vec<FeedSymbol> = self.forward.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}
