//! System-wide constants for the carbonsettle orchestrator.

/// Symbol the default routing rule pivots through.
pub const DEFAULT_STABLECOIN_SYMBOL: &str = "USDC";

/// Symbol of the wrapped native currency used as the source hop of native workflows.
pub const DEFAULT_WRAPPED_NATIVE_SYMBOL: &str = "WMATIC";

/// Symbols whose registered tokens are accepted as exchange inputs.
pub const DEFAULT_SWAPPABLE_SYMBOLS: [&str; 3] = ["USDC", "WETH", "WMATIC"];

/// Symbols whose registered tokens are pool certificate tokens.
pub const DEFAULT_REDEEMABLE_SYMBOLS: [&str; 2] = ["BCT", "NCT"];

/// Seconds added to the invocation time to form the router deadline.
/// Zero reproduces the "deadline = now" behavior.
pub const DEFAULT_DEADLINE_GRACE_SECS: u64 = 0;

/// Shortest valid path: `[source, destination]`.
pub const MIN_PATH_LEN: usize = 2;

/// Longest valid path: `[source, intermediary, destination]`.
pub const MAX_PATH_LEN: usize = 3;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "carbonsettle";
