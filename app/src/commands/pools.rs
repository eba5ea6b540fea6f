use serde::Serialize;
use whirlpool::PoolDiscovery;
use whirlroute_core::PoolState;

use super::mint;
use crate::AppContext;

#[derive(Debug, Serialize)]
pub struct PoolSummary {
    pub address: String,
    pub token_mint_a: String,
    pub token_mint_b: String,
    pub tick_spacing: u16,
    pub fee_rate: u16,
    pub liquidity: String,
    pub sqrt_price: String,
    pub tick_current_index: i32,
    pub initialized_ticks: usize,
}

impl From<&PoolState> for PoolSummary {
    fn from(pool: &PoolState) -> Self {
        Self {
            address: pool.address.to_string(),
            token_mint_a: pool.token_mint_a.to_string(),
            token_mint_b: pool.token_mint_b.to_string(),
            tick_spacing: pool.tick_spacing,
            fee_rate: pool.fee_rate,
            liquidity: pool.liquidity.to_string(),
            sqrt_price: pool.sqrt_price.to_string(),
            tick_current_index: pool.tick_current_index,
            initialized_ticks: pool.ticks.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PoolsResponse {
    pub pools: Vec<PoolSummary>,
    pub count: usize,
}

pub async fn list_pools(ctx: &AppContext, mint_a: &str, mint_b: &str) -> anyhow::Result<PoolsResponse> {
    let mint_a = mint("mint_a", mint_a)?;
    let mint_b = mint("mint_b", mint_b)?;

    let discovery = PoolDiscovery::new(ctx.deriver, ctx.source.clone());
    let pools = discovery.find_pools(&mint_a, &mint_b).await?;

    let pools: Vec<PoolSummary> = pools.iter().map(Into::into).collect();
    let count = pools.len();
    Ok(PoolsResponse { pools, count })
}
