//! Whirlpool Constants
//!
//! PDA seeds, fixed-point bounds, fee parameters, and account layouts for
//! Orca Whirlpools.

/// PDA seeds
pub mod seeds {
    pub const WHIRLPOOL: &[u8] = b"whirlpool";
    pub const TICK_ARRAY: &[u8] = b"tick_array";
}

/// Q64.64 sqrt-price bounds
pub mod sqrt_price {
    /// sqrt price at `MIN_TICK_INDEX`
    pub const MIN_SQRT_PRICE_X64: u128 = 4_295_048_016;
    /// sqrt price at `MAX_TICK_INDEX`
    pub const MAX_SQRT_PRICE_X64: u128 = 79_226_673_515_401_279_992_447_579_055;
    /// Number of fractional bits
    pub const RESOLUTION: u32 = 64;
}

/// Fee constants
pub mod fees {
    /// Fee rates are expressed in hundredths of a basis point
    pub const FEE_RATE_DENOMINATOR: u128 = 1_000_000;
    /// Upper bound enforced by the program (6%)
    pub const MAX_FEE_RATE: u16 = 60_000;
}

/// Tick array layout
pub mod tick_array {
    /// Ticks stored per tick array account
    pub const TICK_ARRAY_SIZE: i32 = 88;
    /// Tick arrays loaded on each side of the current one
    pub const NEIGHBOR_ARRAYS: i32 = 2;
}

/// Account sizes and byte offsets
pub mod layout {
    /// Whirlpool account
    pub mod whirlpool {
        pub const ACCOUNT_LEN: usize = 653;
        pub const WHIRLPOOLS_CONFIG: usize = 8;
        pub const TICK_SPACING: usize = 41;
        pub const FEE_RATE: usize = 45;
        pub const LIQUIDITY: usize = 49;
        pub const SQRT_PRICE: usize = 65;
        pub const TICK_CURRENT_INDEX: usize = 81;
        pub const TOKEN_MINT_A: usize = 101;
        pub const TOKEN_MINT_B: usize = 181;
    }

    /// TickArray account
    pub mod tick_array {
        pub const ACCOUNT_LEN: usize = 9988;
        pub const START_TICK_INDEX: usize = 8;
        pub const TICKS: usize = 12;
        pub const TICK_LEN: usize = 113;
        pub const WHIRLPOOL: usize = 9956;
        /// Offsets inside a single tick record
        pub const TICK_INITIALIZED: usize = 0;
        pub const TICK_LIQUIDITY_NET: usize = 1;
    }
}

/// Accounts touched by one swap hop, used for transaction-size estimates
pub mod tx_shape {
    /// whirlpool, vault A, vault B, three tick arrays, oracle
    pub const ACCOUNTS_PER_POOL: usize = 7;
    /// token program, signer, swap program
    pub const SHARED_ACCOUNTS: usize = 3;
    /// system program and associated-token program, once per transaction
    pub const ATA_CREATION_SHARED_ACCOUNTS: usize = 2;
    pub const LEGACY_MAX_ACCOUNTS: usize = 32;
    pub const V0_MAX_ACCOUNTS: usize = 64;
}
