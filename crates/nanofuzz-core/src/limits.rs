//! Compile-time configuration knobs shared by the lexer, linker and VM.
//!
//! Collected here as typed `pub const` items instead of preprocessor macros,
//! so every crate in the workspace draws its structural limits from one
//! place.

/// Longest label a `<$NAME>`/`<@NAME>`/`<%NAME>`/`<#...:NAME>` may use.
pub const MAX_LABEL_LEN: usize = 8;

/// Deepest a subsequence may nest before the parser rejects the pattern.
pub const MAX_NESTING_DEPTH: usize = 5;

/// Widest a `[...]` range set may be, counted in `lo..=hi` subranges.
pub const MAX_RANGE_SUBRANGES: usize = 16;

/// Most arms an `a|b|c|...` alternation may carry.
pub const MAX_ALTERNATION_ARMS: usize = 32;

/// Most `<$NAME>` sub-factories a single pattern may declare.
pub const MAX_SUB_FACTORIES: usize = 32;

/// Most fragments an `ErrorTrace` will retain before it starts discarding.
pub const MAX_ERROR_FRAGMENTS: usize = 16;

/// Longest message text a single `ErrorFragment` keeps, in bytes.
pub const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// Longest pattern source text accepted, in bytes.
pub const MAX_PATTERN_LEN: usize = 1 << 24;

/// Hard ceiling on a factory's `max_output_size`, matching the `[u8]` length
/// a single generation can ever produce.
pub const MAX_OUTPUT_SIZE: u64 = u32::MAX as u64;

/// One mebibyte, the unit the buffer multiplier tiers scale.
pub const MIB: usize = 1024 * 1024;

/// Prefetch buffer size tiers, each a multiple of [`MIB`].
pub const BUFFER_MULTIPLIER_TIERS: [u64; 5] = [1, 4, 16, 128, 1024];

/// Smallest buffer tier, used when a caller requests `tiny` pooling.
pub const BUFFER_TIER_TINY: u64 = BUFFER_MULTIPLIER_TIERS[0] * MIB as u64;
/// `small` buffer tier.
pub const BUFFER_TIER_SMALL: u64 = BUFFER_MULTIPLIER_TIERS[1] * MIB as u64;
/// `normal` buffer tier, the default.
pub const BUFFER_TIER_NORMAL: u64 = BUFFER_MULTIPLIER_TIERS[2] * MIB as u64;
/// `large` buffer tier.
pub const BUFFER_TIER_LARGE: u64 = BUFFER_MULTIPLIER_TIERS[3] * MIB as u64;
/// `extreme` buffer tier.
pub const BUFFER_TIER_EXTREME: u64 = BUFFER_MULTIPLIER_TIERS[4] * MIB as u64;
