use serde::Serialize;
use whirlpool::{
    slippage_from_bps, PoolDiscovery, Route, RouteOutcome, RouteService, RoutingOptions,
    SelectionOptions, TradeSpec,
};
use whirlroute_core::Token;

use super::{mint, specified_amount, tokens};
use crate::cli::{AmountArgs, RoutingArgs};
use crate::AppContext;

#[derive(Debug, Serialize)]
pub struct LegSummary {
    pub percent: u8,
    pub pools: Vec<String>,
    pub amount_in: String,
    pub amount_out: String,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub found: bool,
    pub amount_in: Option<String>,
    pub amount_out: Option<String>,
    pub threshold: Option<String>,
    pub legs: Vec<LegSummary>,
    pub outcome: RouteOutcome,
}

impl RouteResponse {
    pub fn new(outcome: RouteOutcome, token_in: &Token, token_out: &Token) -> Self {
        match outcome.route() {
            Some(route) => Self {
                found: true,
                amount_in: Some(token_in.format_ui_amount(route.total_amount_in)),
                amount_out: Some(token_out.format_ui_amount(route.total_amount_out)),
                threshold: Some(threshold(route, token_in, token_out)),
                legs: legs(route, token_in, token_out),
                outcome,
            },
            None => Self {
                found: false,
                amount_in: None,
                amount_out: None,
                threshold: None,
                legs: Vec::new(),
                outcome,
            },
        }
    }
}

fn threshold(route: &Route, token_in: &Token, token_out: &Token) -> String {
    if route.amount_specified_is_input {
        token_out.format_ui_amount(route.other_amount_threshold)
    } else {
        token_in.format_ui_amount(route.other_amount_threshold)
    }
}

fn legs(route: &Route, token_in: &Token, token_out: &Token) -> Vec<LegSummary> {
    route
        .sub_routes
        .iter()
        .map(|sub| LegSummary {
            percent: sub.split_percent,
            pools: sub.path.iter().map(|edge| edge.pool.to_string()).collect(),
            amount_in: token_in.format_ui_amount(sub.amount_in),
            amount_out: token_out.format_ui_amount(sub.amount_out),
        })
        .collect()
}

impl From<&RoutingArgs> for RoutingOptions {
    fn from(args: &RoutingArgs) -> Self {
        Self {
            max_splits: args.max_splits,
            max_hops: args.max_hops,
            percent_increment: args.percent_increment,
            max_pools_per_pair: args.max_pools_per_pair,
            ..Default::default()
        }
    }
}

pub async fn route(
    ctx: &AppContext,
    mint_in: &str,
    mint_out: &str,
    args: &AmountArgs,
    routing: &RoutingArgs,
    pair_only: bool,
) -> anyhow::Result<RouteResponse> {
    let (token_in, token_out) = tokens(mint("mint_in", mint_in)?, mint("mint_out", mint_out)?, args);
    let amount = specified_amount(&token_in, &token_out, args)?;
    let slippage = slippage_from_bps(args.slippage_bps)?;

    let trade = if args.exact_out {
        TradeSpec::exact_out(token_in.mint, token_out.mint, amount, slippage)
    } else {
        TradeSpec::exact_in(token_in.mint, token_out.mint, amount, slippage)
    };
    let options = RoutingOptions::from(routing);
    let selection = SelectionOptions {
        max_supported_transaction_version: routing.tx_version.into(),
        available_ata_accounts: None,
        max_accounts: routing.max_accounts,
    };

    let service = RouteService::new(
        PoolDiscovery::new(ctx.deriver, ctx.source.clone()),
        ctx.source.clone(),
    );
    let outcome = if pair_only {
        service.find_best_route_for_pair(&trade, &options, &selection).await?
    } else {
        service.find_best_route(&trade, &options, &selection).await?
    };
    Ok(RouteResponse::new(outcome, &token_in, &token_out))
}
