use crate::MintInstruction;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_network::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use binding::IDestinationBridge;
use config::MintParams;
use deposit::{DepositEvent, DepositId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("deposit {0} has a zero recipient")]
    ZeroRecipient(DepositId),

    #[error("deposit {0} has a zero amount")]
    ZeroAmount(DepositId),

    #[error("signing failed: {0}")]
    Signing(#[from] alloy_signer::Error),
}

/// Something that turns a deposit into a signed mint instruction.
///
/// The caller supplies the nonce; builders never track nonces themselves.
pub trait InstructionBuilder: Send + Sync {
    fn build(&self, event: &DepositEvent, nonce: u64) -> Result<MintInstruction, BuildError>;
}

/// Builds `mintTokens` transactions against one destination bridge.
#[derive(Debug, Clone)]
pub struct MintBuilder {
    signer: PrivateKeySigner,
    bridge: Address,
    params: MintParams,
}

impl MintBuilder {
    pub const fn new(signer: PrivateKeySigner, bridge: Address, params: MintParams) -> Self {
        Self {
            signer,
            bridge,
            params,
        }
    }

    /// Address of the relayer account.
    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl InstructionBuilder for MintBuilder {
    fn build(&self, event: &DepositEvent, nonce: u64) -> Result<MintInstruction, BuildError> {
        build_mint_instruction(event, &self.signer, nonce, self.bridge, &self.params)
    }
}

/// Encode, sign and package the mint for `event`.
///
/// Deterministic: the same inputs always yield the same instruction (ECDSA
/// nonces are derived per RFC 6979).
pub fn build_mint_instruction(
    event: &DepositEvent,
    signer: &PrivateKeySigner,
    nonce: u64,
    bridge: Address,
    params: &MintParams,
) -> Result<MintInstruction, BuildError> {
    if event.recipient == Address::ZERO {
        return Err(BuildError::ZeroRecipient(event.deposit_id));
    }
    if event.amount == U256::ZERO {
        return Err(BuildError::ZeroAmount(event.deposit_id));
    }

    let data: Bytes = IDestinationBridge::mintTokensCall {
        recipient: event.recipient,
        amount: event.amount,
        sourceTxHash: event.tx_hash,
    }
    .abi_encode()
    .into();

    let tx = TxEip1559 {
        chain_id: params.chain_id,
        nonce,
        gas_limit: params.gas_limit,
        max_fee_per_gas: params.max_fee_per_gas,
        max_priority_fee_per_gas: params.max_priority_fee_per_gas,
        to: TxKind::Call(bridge),
        value: U256::ZERO,
        access_list: Default::default(),
        input: data.clone(),
    };

    let signature = signer.sign_hash_sync(&tx.signature_hash())?;
    let signed = tx.into_signed(signature);
    let tx_hash = *signed.hash();
    let raw_transaction: Bytes = TxEnvelope::from(signed).encoded_2718().into();

    Ok(MintInstruction {
        to: bridge,
        from: signer.address(),
        nonce,
        data,
        signature: Bytes::copy_from_slice(&signature.as_bytes()),
        raw_transaction,
        tx_hash,
    })
}
