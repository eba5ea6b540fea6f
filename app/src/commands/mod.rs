//! Subcommand handlers and their response types

pub mod pools;
pub mod quote;
pub mod route;

use anyhow::Context;
use whirlroute_core::{parse_pubkey, Pubkey, Token};

use crate::cli::AmountArgs;

pub(crate) fn mint(field: &str, value: &str) -> anyhow::Result<Pubkey> {
    parse_pubkey(field, value).with_context(|| format!("invalid {}", field))
}

/// Input and output tokens with their decimals
pub(crate) fn tokens(mint_in: Pubkey, mint_out: Pubkey, args: &AmountArgs) -> (Token, Token) {
    (
        Token::new(mint_in, args.decimals_in),
        Token::new(mint_out, args.decimals_out),
    )
}

/// Base units of the specified side of the trade
pub(crate) fn specified_amount(token_in: &Token, token_out: &Token, args: &AmountArgs) -> anyhow::Result<u64> {
    let token = if args.exact_out { token_out } else { token_in };
    Ok(token.parse_ui_amount(&args.amount)?)
}
