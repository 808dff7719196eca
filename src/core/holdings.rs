//! Turns configured holdings into priced positions and allocator input.
use crate::core::allocator::AssetState;
use crate::core::config::Holding;
use crate::core::price::{PriceProvider, PriceQuote};
use crate::core::targets::TargetConfig;
use anyhow::{Result, bail};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A holding with its unit price and current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionValue {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub units: f64,
    pub price: f64,
    pub value: f64,
}

/// Prices every holding, fetching quotes for those without a configured
/// price. All prices must be in `currency`; there is no conversion.
pub async fn value_holdings(
    holdings: &[Holding],
    currency: &str,
    provider: &(dyn PriceProvider + Send + Sync),
    update_callback: &(dyn Fn()),
) -> Result<Vec<PositionValue>> {
    let symbols_to_fetch: HashSet<&str> = holdings
        .iter()
        .filter(|h| h.price.is_none())
        .map(|h| h.symbol.as_str())
        .collect();

    let quote_futures = symbols_to_fetch.into_iter().map(|symbol| async move {
        let res = provider.fetch_quote(symbol).await;
        update_callback();
        (symbol, res)
    });
    let quotes: HashMap<&str, Result<PriceQuote>> =
        join_all(quote_futures).await.into_iter().collect();

    let mut positions = Vec::with_capacity(holdings.len());
    for holding in holdings {
        if !holding.units.is_finite() || holding.units < 0.0 {
            bail!("Holding {} has invalid units: {}", holding.symbol, holding.units);
        }

        let (price, quoted_name) = match holding.price {
            Some(price) => (price, None),
            None => {
                let quote = match quotes.get(holding.symbol.as_str()) {
                    Some(Ok(quote)) => quote.clone(),
                    Some(Err(e)) => bail!("Failed to price {}: {}", holding.symbol, e),
                    None => bail!("No quote available for {}", holding.symbol),
                };
                if quote.currency != currency {
                    bail!(
                        "{} is quoted in {}, portfolio currency is {}",
                        holding.symbol,
                        quote.currency,
                        currency
                    );
                }
                (quote.price, quote.short_name)
            }
        };

        if !price.is_finite() || price <= 0.0 {
            bail!("Holding {} has invalid price: {}", holding.symbol, price);
        }

        let name = holding
            .name
            .clone()
            .or(quoted_name)
            .unwrap_or_else(|| holding.symbol.clone());
        let value = holding.units * price;
        debug!(symbol = %holding.symbol, price, value, "Valued holding");

        positions.push(PositionValue {
            id: holding.id().to_string(),
            symbol: holding.symbol.clone(),
            name,
            units: holding.units,
            price,
            value,
        });
    }

    Ok(positions)
}

/// Allocator input for the priced positions.
///
/// Targets are looked up by symbol. A position without a target is kept at
/// target 0 and never bought; targets for symbols not held are ignored.
pub fn to_asset_states(positions: &[PositionValue], targets: &TargetConfig) -> Vec<AssetState> {
    for symbol in targets.target_shares().keys() {
        if !positions.iter().any(|p| &p.symbol == symbol) {
            warn!(%symbol, "Target is set for a symbol that is not held, skipping");
        }
    }

    positions
        .iter()
        .map(|p| match targets.target_for(&p.symbol) {
            Some(target) => AssetState {
                id: p.id.clone(),
                value: p.value,
                step_size: p.price,
                target,
            },
            None => {
                warn!(symbol = %p.symbol, "No target share for holding, it will not be bought");
                AssetState {
                    id: p.id.clone(),
                    value: p.value,
                    step_size: 0.0,
                    target: 0.0,
                }
            }
        })
        .collect()
}

/// Id to display name, for plan summaries.
pub fn display_names(positions: &[PositionValue]) -> HashMap<String, String> {
    positions
        .iter()
        .map(|p| (p.id.clone(), p.name.clone()))
        .collect()
}
