use serde::Serialize;
use whirlpool::{slippage_from_bps, Fill, Quote, QuoteService, TradeSpec};
use whirlroute_core::Token;

use super::{mint, specified_amount, tokens};
use crate::cli::AmountArgs;
use crate::AppContext;

/// Single-pool quote with UI-formatted amounts
#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub pool: String,
    pub amount_in: String,
    pub amount_out: String,
    /// Minimum out for exact input, maximum in for exact output
    pub threshold: String,
    pub fee: String,
    pub complete: bool,
    pub quote: Quote,
}

impl QuoteResponse {
    pub fn new(quote: Quote, token_in: &Token, token_out: &Token) -> Self {
        let threshold_token = if quote.amount_specified_is_input {
            token_out
        } else {
            token_in
        };
        Self {
            pool: quote.pool.to_string(),
            amount_in: token_in.format_ui_amount(quote.estimated_amount_in),
            amount_out: token_out.format_ui_amount(quote.estimated_amount_out),
            threshold: threshold_token.format_ui_amount(quote.other_amount_threshold),
            fee: token_in.format_ui_amount(quote.estimated_fee_amount),
            complete: quote.fill == Fill::Complete,
            quote,
        }
    }
}

pub async fn quote(
    ctx: &AppContext,
    mint_in: &str,
    mint_out: &str,
    args: &AmountArgs,
    tick_spacing: u16,
) -> anyhow::Result<QuoteResponse> {
    let (token_in, token_out) = tokens(mint("mint_in", mint_in)?, mint("mint_out", mint_out)?, args);
    let amount = specified_amount(&token_in, &token_out, args)?;
    let slippage = slippage_from_bps(args.slippage_bps)?;

    let trade = if args.exact_out {
        TradeSpec::exact_out(token_in.mint, token_out.mint, amount, slippage)
    } else {
        TradeSpec::exact_in(token_in.mint, token_out.mint, amount, slippage)
    };
    let pool = ctx.deriver.derive(token_in.mint, token_out.mint, tick_spacing)?.address();

    let quote = QuoteService::new(ctx.source.clone())
        .quote_by_address(&pool, &trade)
        .await?;
    Ok(QuoteResponse::new(quote, &token_in, &token_out))
}
