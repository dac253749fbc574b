//! Signed transfer submission for the treasury account.

use std::str::FromStr;

use async_trait::async_trait;
use subxt::config::polkadot::PolkadotExtrinsicParamsBuilder;
use subxt::dynamic::Value;
use subxt::ext::scale_value::Composite;
use subxt::tx::TxStatus;
use subxt::{OnlineClient, PolkadotConfig};
use subxt_signer::SecretUri;
use subxt_signer::sr25519::Keypair;
use tracing::{debug, instrument, trace};

use furnace_core::error::{ChainError, ChainResult};
use furnace_core::models::{AccountId, BlockHash};
use furnace_core::ports::{TransactionSubmitter, TxInclusion};

/// Submits `Balances.transfer_keep_alive` signed by a sr25519 key.
pub struct SubstrateSubmitter {
    client: OnlineClient<PolkadotConfig>,
    signer: Keypair,
}

impl SubstrateSubmitter {
    /// Build a submitter from a secret URI (mnemonic, hex seed or `//Dev`
    /// derivation path).
    pub fn from_seed(client: OnlineClient<PolkadotConfig>, secret: &str) -> ChainResult<Self> {
        let signer = keypair_from_seed(secret)?;
        Ok(Self { client, signer })
    }
}

fn keypair_from_seed(secret: &str) -> ChainResult<Keypair> {
    let uri = SecretUri::from_str(secret.trim())
        .map_err(|e| ChainError::SignerError(format!("invalid secret uri: {}", e)))?;
    Keypair::from_uri(&uri).map_err(|e| ChainError::SignerError(e.to_string()))
}

#[async_trait]
impl TransactionSubmitter for SubstrateSubmitter {
    fn signer_account(&self) -> AccountId {
        AccountId(self.signer.public_key().0)
    }

    #[instrument(skip(self), fields(dest = %dest))]
    async fn submit_transfer(
        &self,
        dest: &AccountId,
        amount: u128,
        tip: u128,
    ) -> ChainResult<TxInclusion> {
        let call = subxt::dynamic::tx(
            "Balances",
            "transfer_keep_alive",
            Composite::named([
                ("dest", Value::unnamed_variant("Id", [Value::from_bytes(dest.0)])),
                ("value", Value::u128(amount)),
            ]),
        );
        let params = PolkadotExtrinsicParamsBuilder::<PolkadotConfig>::new()
            .tip(tip)
            .build();

        let mut progress = self
            .client
            .tx()
            .sign_and_submit_then_watch(&call, &self.signer, params)
            .await
            .map_err(|e| ChainError::SubmissionFailed(e.to_string()))?;

        debug!(tip, "Transaction submitted");

        while let Some(status) = progress.next().await {
            match status.map_err(|e| ChainError::SubmissionFailed(e.to_string()))? {
                TxStatus::InBestBlock(in_block) | TxStatus::InFinalizedBlock(in_block) => {
                    in_block
                        .wait_for_success()
                        .await
                        .map_err(|e| ChainError::SubmissionFailed(e.to_string()))?;

                    return Ok(TxInclusion {
                        block_hash: BlockHash(in_block.block_hash().0),
                    });
                }
                TxStatus::Error { message }
                | TxStatus::Invalid { message }
                | TxStatus::Dropped { message } => {
                    return Err(ChainError::SubmissionFailed(message));
                }
                other => trace!(status = ?other, "Transaction progress"),
            }
        }

        Err(ChainError::SubmissionFailed(
            "transaction status stream ended before inclusion".to_string(),
        ))
    }
}
