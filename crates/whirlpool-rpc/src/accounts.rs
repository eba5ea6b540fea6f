//! Whirlpool and TickArray account decoding
//!
//! Reads only the fields the quote engine needs, straight from the
//! fixed-offset Anchor layout.

use whirlpool::constants::fees::MAX_FEE_RATE;
use whirlpool::constants::layout;
use whirlpool::constants::tick_array::TICK_ARRAY_SIZE;
use whirlroute_core::{Pubkey, ReaderError, TickEntry, TickWindow, PoolState};

pub const WHIRLPOOL_DISCRIMINATOR: [u8; 8] = [63, 149, 209, 12, 225, 128, 99, 9];
pub const TICK_ARRAY_DISCRIMINATOR: [u8; 8] = [69, 97, 189, 190, 110, 7, 66, 187];

type Result<T> = std::result::Result<T, ReaderError>;

/// Swap-relevant fields of an on-chain Whirlpool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhirlpoolAccount {
    pub whirlpools_config: Pubkey,
    pub tick_spacing: u16,
    pub fee_rate: u16,
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
}

impl WhirlpoolAccount {
    pub fn into_pool_state(self, address: Pubkey, ticks: Vec<TickEntry>, tick_window: TickWindow) -> PoolState {
        PoolState {
            address,
            whirlpools_config: self.whirlpools_config,
            token_mint_a: self.token_mint_a,
            token_mint_b: self.token_mint_b,
            tick_spacing: self.tick_spacing,
            fee_rate: self.fee_rate,
            liquidity: self.liquidity,
            sqrt_price: self.sqrt_price,
            tick_current_index: self.tick_current_index,
            ticks,
            tick_window,
        }
    }
}

/// Initialized ticks of one tick array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickArrayAccount {
    pub whirlpool: Pubkey,
    pub start_tick_index: i32,
    /// Ascending by index
    pub ticks: Vec<TickEntry>,
}

pub fn decode_whirlpool(address: &Pubkey, data: &[u8]) -> Result<WhirlpoolAccount> {
    use layout::whirlpool::*;

    let reader = Bytes::new(address, data);
    reader.expect_header(ACCOUNT_LEN, &WHIRLPOOL_DISCRIMINATOR)?;

    let fee_rate = u16::from_le_bytes(reader.array(FEE_RATE)?);
    if fee_rate > MAX_FEE_RATE {
        return Err(reader.error(format!("fee rate {} above {}", fee_rate, MAX_FEE_RATE)));
    }

    Ok(WhirlpoolAccount {
        whirlpools_config: reader.pubkey(WHIRLPOOLS_CONFIG)?,
        tick_spacing: u16::from_le_bytes(reader.array(TICK_SPACING)?),
        fee_rate,
        liquidity: u128::from_le_bytes(reader.array(LIQUIDITY)?),
        sqrt_price: u128::from_le_bytes(reader.array(SQRT_PRICE)?),
        tick_current_index: i32::from_le_bytes(reader.array(TICK_CURRENT_INDEX)?),
        token_mint_a: reader.pubkey(TOKEN_MINT_A)?,
        token_mint_b: reader.pubkey(TOKEN_MINT_B)?,
    })
}

/// Decode a tick array, keeping initialized ticks only.
pub fn decode_tick_array(address: &Pubkey, data: &[u8], tick_spacing: u16) -> Result<TickArrayAccount> {
    use layout::tick_array::*;

    let reader = Bytes::new(address, data);
    reader.expect_header(ACCOUNT_LEN, &TICK_ARRAY_DISCRIMINATOR)?;

    let start_tick_index = i32::from_le_bytes(reader.array(START_TICK_INDEX)?);
    let mut ticks = Vec::new();
    for i in 0..TICK_ARRAY_SIZE as usize {
        let base = TICKS + i * TICK_LEN;
        if reader.byte(base + TICK_INITIALIZED)? == 0 {
            continue;
        }
        ticks.push(TickEntry {
            index: start_tick_index + i as i32 * tick_spacing as i32,
            liquidity_net: i128::from_le_bytes(reader.array(base + TICK_LIQUIDITY_NET)?),
        });
    }

    Ok(TickArrayAccount {
        whirlpool: reader.pubkey(WHIRLPOOL)?,
        start_tick_index,
        ticks,
    })
}

struct Bytes<'a> {
    address: &'a Pubkey,
    data: &'a [u8],
}

impl<'a> Bytes<'a> {
    fn new(address: &'a Pubkey, data: &'a [u8]) -> Self {
        Self { address, data }
    }

    fn error(&self, message: String) -> ReaderError {
        ReaderError::Decode {
            address: self.address.to_string(),
            message,
        }
    }

    fn expect_header(&self, min_len: usize, discriminator: &[u8; 8]) -> Result<()> {
        if self.data.len() < min_len {
            return Err(self.error(format!(
                "account is {} bytes, expected at least {}",
                self.data.len(),
                min_len
            )));
        }
        if &self.data[..8] != discriminator {
            return Err(self.error("unexpected account discriminator".to_string()));
        }
        Ok(())
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        self.data
            .get(offset..offset + N)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| self.error(format!("{} bytes at offset {} out of bounds", N, offset)))
    }

    fn byte(&self, offset: usize) -> Result<u8> {
        self.array::<1>(offset).map(|[b]| b)
    }

    fn pubkey(&self, offset: usize) -> Result<Pubkey> {
        self.array::<32>(offset).map(Pubkey::new_from_array)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn whirlpool_bytes(account: &WhirlpoolAccount) -> Vec<u8> {
        use layout::whirlpool::*;

        let mut data = vec![0u8; ACCOUNT_LEN];
        data[..8].copy_from_slice(&WHIRLPOOL_DISCRIMINATOR);
        data[WHIRLPOOLS_CONFIG..WHIRLPOOLS_CONFIG + 32].copy_from_slice(account.whirlpools_config.as_ref());
        data[TICK_SPACING..TICK_SPACING + 2].copy_from_slice(&account.tick_spacing.to_le_bytes());
        data[FEE_RATE..FEE_RATE + 2].copy_from_slice(&account.fee_rate.to_le_bytes());
        data[LIQUIDITY..LIQUIDITY + 16].copy_from_slice(&account.liquidity.to_le_bytes());
        data[SQRT_PRICE..SQRT_PRICE + 16].copy_from_slice(&account.sqrt_price.to_le_bytes());
        data[TICK_CURRENT_INDEX..TICK_CURRENT_INDEX + 4]
            .copy_from_slice(&account.tick_current_index.to_le_bytes());
        data[TOKEN_MINT_A..TOKEN_MINT_A + 32].copy_from_slice(account.token_mint_a.as_ref());
        data[TOKEN_MINT_B..TOKEN_MINT_B + 32].copy_from_slice(account.token_mint_b.as_ref());
        data
    }

    /// `initialized` holds (slot, liquidity_net) pairs
    pub(crate) fn tick_array_bytes(whirlpool: &Pubkey, start: i32, initialized: &[(usize, i128)]) -> Vec<u8> {
        use layout::tick_array::*;

        let mut data = vec![0u8; ACCOUNT_LEN];
        data[..8].copy_from_slice(&TICK_ARRAY_DISCRIMINATOR);
        data[START_TICK_INDEX..START_TICK_INDEX + 4].copy_from_slice(&start.to_le_bytes());
        for (slot, net) in initialized {
            let base = TICKS + slot * TICK_LEN;
            data[base + TICK_INITIALIZED] = 1;
            data[base + TICK_LIQUIDITY_NET..base + TICK_LIQUIDITY_NET + 16].copy_from_slice(&net.to_le_bytes());
        }
        data[WHIRLPOOL..WHIRLPOOL + 32].copy_from_slice(whirlpool.as_ref());
        data
    }

    pub(crate) fn sample_account() -> WhirlpoolAccount {
        WhirlpoolAccount {
            whirlpools_config: Pubkey::new_from_array([101; 32]),
            tick_spacing: 64,
            fee_rate: 3_000,
            liquidity: 123_456_789_012,
            sqrt_price: 1u128 << 64,
            tick_current_index: -5,
            token_mint_a: Pubkey::new_from_array([10; 32]),
            token_mint_b: Pubkey::new_from_array([11; 32]),
        }
    }

    #[test]
    fn test_decode_whirlpool() {
        let account = sample_account();
        let address = Pubkey::new_unique();
        let decoded = decode_whirlpool(&address, &whirlpool_bytes(&account)).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn test_decode_whirlpool_rejects_short_or_foreign_data() {
        let address = Pubkey::new_unique();
        let mut data = whirlpool_bytes(&sample_account());

        assert!(matches!(
            decode_whirlpool(&address, &data[..600]),
            Err(ReaderError::Decode { .. })
        ));

        data[0] ^= 0xff;
        assert!(matches!(
            decode_whirlpool(&address, &data),
            Err(ReaderError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_whirlpool_rejects_fee_above_cap() {
        let address = Pubkey::new_unique();
        let mut account = sample_account();

        account.fee_rate = MAX_FEE_RATE;
        assert!(decode_whirlpool(&address, &whirlpool_bytes(&account)).is_ok());

        account.fee_rate = MAX_FEE_RATE + 1;
        assert!(matches!(
            decode_whirlpool(&address, &whirlpool_bytes(&account)),
            Err(ReaderError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_tick_array() {
        let whirlpool = Pubkey::new_unique();
        let start = -5_632; // -88 * 64
        let data = tick_array_bytes(&whirlpool, start, &[(0, 500), (10, -200), (87, -300)]);

        let decoded = decode_tick_array(&Pubkey::new_unique(), &data, 64).unwrap();
        assert_eq!(decoded.whirlpool, whirlpool);
        assert_eq!(decoded.start_tick_index, start);
        assert_eq!(
            decoded.ticks,
            vec![
                TickEntry { index: -5_632, liquidity_net: 500 },
                TickEntry { index: -5_632 + 640, liquidity_net: -200 },
                TickEntry { index: -5_632 + 87 * 64, liquidity_net: -300 },
            ]
        );
    }
}
