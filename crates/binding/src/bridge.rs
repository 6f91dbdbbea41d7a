//! Bridge contract bindings.
//!
//! - Source chain: the lock contract that emits `TokensLocked`
//! - Destination chain: the mint contract exposing `mintTokens`

use alloy_sol_types::sol;

sol! {
    /// Lock side of the bridge, deployed on the source chain
    interface ISourceBridge {
        /// Emitted when a user locks tokens for bridging. The bridge handles
        /// a single token, so the event does not name it.
        event TokensLocked(
            address indexed sender,
            address recipient,
            uint256 amount,
            uint256 indexed destinationChainId
        );
    }

    /// Mint side of the bridge, deployed on the destination chain
    interface IDestinationBridge {
        /// Mint wrapped tokens for a deposit observed on the source chain.
        ///
        /// `sourceTxHash` ties the mint to the originating lock transaction.
        function mintTokens(
            address recipient,
            uint256 amount,
            bytes32 sourceTxHash
        ) external;
    }
}
