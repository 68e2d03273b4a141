//! Fixed limits and defaults shared across the workspace.

use std::time::Duration;

/// Lower bound for a single external command's time budget.
pub const MIN_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a single external command's time budget.
pub const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time budget for a single external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = MAX_COMMAND_TIMEOUT;

/// Name of the RGB protocol command-line engine.
pub const RGB_PROGRAM: &str = "rgb";

/// Container orchestration wrapper used to reach the bitcoin node.
pub const COMPOSE_PROGRAM: &str = "docker";

/// Default compose project hosting the node.
pub const DEFAULT_COMPOSE_PROJECT: &str = "bitlight-local-env";

/// Default compose service running `bitcoin-cli`.
pub const DEFAULT_COMPOSE_SERVICE: &str = "bitcoin-core";

/// Default esplora endpoint the RGB engine syncs against.
pub const DEFAULT_ESPLORA_URL: &str = "http://localhost:3002";

/// Default contract interface used for state queries.
pub const DEFAULT_INTERFACE: &str = "RGB20Fixed";

/// Transaction id reported when the node rejected a correctly signed
/// transaction for a benign reason (fee policy, already in mempool).
pub const TXID_PENDING: &str = "pending";

/// Transaction id reported when the submit call itself did not resolve.
pub const TXID_UNKNOWN: &str = "unknown";

/// Placeholder contract id shipped in example configuration files.
pub const PLACEHOLDER_CONTRACT_ID: &str = "YOUR_CONTRACT_ID_HERE";

/// Clamp a requested command timeout into the supported window.
pub fn clamp_timeout(requested: Duration) -> Duration {
    requested.clamp(MIN_COMMAND_TIMEOUT, MAX_COMMAND_TIMEOUT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_below_window() {
        assert_eq!(clamp_timeout(Duration::from_secs(1)), MIN_COMMAND_TIMEOUT);
    }

    #[test]
    fn clamp_above_window() {
        assert_eq!(clamp_timeout(Duration::from_secs(600)), MAX_COMMAND_TIMEOUT);
    }

    #[test]
    fn clamp_inside_window_is_identity() {
        let t = Duration::from_secs(45);
        assert_eq!(clamp_timeout(t), t);
    }
}
