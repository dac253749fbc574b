//! Substrate RPC client with dynamic metadata decoding.

use async_trait::async_trait;
use futures::StreamExt;
use subxt::backend::legacy::LegacyRpcMethods;
use subxt::backend::rpc::RpcClient;
use subxt::dynamic::Value;
use subxt::utils::H256;
use subxt::{OnlineClient, PolkadotConfig};
use tracing::{debug, instrument, trace};

use furnace_core::error::{ChainError, ChainResult};
use furnace_core::metrics::record_decode_error;
use furnace_core::models::{AccountId, BlockHash};
use furnace_core::ports::{BlockSource, ChainHead, HeadStream, RawBlock, RawEvent, RawExtrinsic};

use crate::decode::{
    composite_to_json, free_balance, signer_from_address, token_decimals,
    undecodable_call_is_fatal, value_to_bytes,
};

/// Configuration for the Substrate client.
#[derive(Debug, Clone)]
pub struct SubstrateClientConfig {
    /// WebSocket URL (e.g., "ws://localhost:9944").
    pub ws_url: String,
    /// Overrides the decimals reported by `system_properties`.
    pub token_decimals: Option<u8>,
}

impl Default for SubstrateClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:9944".to_string(),
            token_decimals: None,
        }
    }
}

/// Substrate client adapter implementing the BlockSource port.
///
/// Uses the legacy RPC backend: catching up needs bodies and state of
/// arbitrary historical blocks, which the chainHead API only serves for
/// pinned recent blocks.
pub struct SubstrateClient {
    client: OnlineClient<PolkadotConfig>,
    rpc: LegacyRpcMethods<PolkadotConfig>,
    token_decimals: Option<u8>,
}

impl SubstrateClient {
    /// Connect to a Substrate node.
    #[instrument(skip_all, fields(url = %config.ws_url))]
    pub async fn connect(config: SubstrateClientConfig) -> ChainResult<Self> {
        debug!("Connecting to node");

        let rpc_client = RpcClient::from_url(&config.ws_url)
            .await
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        let client = OnlineClient::<PolkadotConfig>::from_rpc_client(rpc_client.clone())
            .await
            .map_err(|e| ChainError::ConnectionFailed(e.to_string()))?;
        let rpc = LegacyRpcMethods::<PolkadotConfig>::new(rpc_client);

        debug!("Connected successfully");

        Ok(Self {
            client,
            rpc,
            token_decimals: config.token_decimals,
        })
    }

    /// Underlying subxt client, shared with the transaction submitter.
    pub fn online_client(&self) -> &OnlineClient<PolkadotConfig> {
        &self.client
    }

    /// Fetch and decode a storage entry at block `at`.
    async fn fetch_storage(
        &self,
        at: H256,
        pallet: &str,
        entry: &str,
        keys: Vec<Value>,
    ) -> ChainResult<Option<Value<u32>>> {
        let storage = self.client.storage().at(at);
        let address = subxt::dynamic::storage(pallet, entry, keys);
        let thunk = storage
            .fetch(&address)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        thunk
            .map(|t| {
                t.to_value()
                    .map_err(|e| ChainError::MetadataError(e.to_string()))
            })
            .transpose()
    }

    /// Header number for `hash`, as a chain head.
    async fn head_at(&self, hash: H256) -> ChainResult<ChainHead> {
        let header = self
            .rpc
            .chain_get_header(Some(hash))
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?
            .ok_or_else(|| ChainError::BlockFetchError {
                hash: format!("0x{}", hex::encode(hash.0)),
                message: "header not found".to_string(),
            })?;

        Ok(ChainHead {
            number: header.number as u64,
            hash: BlockHash(hash.0),
        })
    }

    /// Fetch a `u128`-like storage value that must exist at `hash`.
    async fn required_u128(
        &self,
        hash: &BlockHash,
        pallet: &str,
        entry: &str,
    ) -> ChainResult<u128> {
        self.fetch_storage(H256(hash.0), pallet, entry, vec![])
            .await?
            .and_then(|v| v.as_u128())
            .ok_or_else(|| ChainError::MissingStorage {
                item: format!("{}.{}", pallet, entry),
                hash: hash.to_hex(),
            })
    }
}

#[async_trait]
impl BlockSource for SubstrateClient {
    async fn genesis_hash(&self) -> ChainResult<BlockHash> {
        let hash = self.client.genesis_hash();
        Ok(BlockHash(hash.0))
    }

    async fn finalized_head(&self) -> ChainResult<ChainHead> {
        let hash = self
            .rpc
            .chain_get_finalized_head()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        self.head_at(hash).await
    }

    async fn best_head(&self) -> ChainResult<ChainHead> {
        let hash = self
            .rpc
            .chain_get_block_hash(None)
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?
            .ok_or_else(|| ChainError::RpcError("node reported no best block".to_string()))?;

        self.head_at(hash).await
    }

    async fn subscribe_new_heads(&self) -> ChainResult<HeadStream> {
        let subscription = self
            .client
            .blocks()
            .subscribe_best()
            .await
            .map_err(|e| ChainError::SubscriptionError(e.to_string()))?;

        let stream = subscription.map(|result| {
            result
                .map(|block| ChainHead {
                    number: block.number() as u64,
                    hash: BlockHash(block.hash().0),
                })
                .map_err(|e| ChainError::SubscriptionError(e.to_string()))
        });

        Ok(Box::pin(stream))
    }

    async fn block_hash(&self, number: u64) -> ChainResult<BlockHash> {
        let hash = self
            .rpc
            .chain_get_block_hash(Some(number.into()))
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?
            .ok_or(ChainError::BlockNotFound(number))?;

        Ok(BlockHash(hash.0))
    }

    #[instrument(skip(self), fields(hash = %hash))]
    async fn block(&self, hash: &BlockHash) -> ChainResult<RawBlock> {
        let fetch_error = |e: subxt::Error| ChainError::BlockFetchError {
            hash: hash.to_hex(),
            message: e.to_string(),
        };

        let block = self
            .client
            .blocks()
            .at(H256(hash.0))
            .await
            .map_err(fetch_error)?;
        let extrinsics = block.extrinsics().await.map_err(fetch_error)?;

        let mut raw_extrinsics = Vec::new();

        for (index, ext) in extrinsics.iter().enumerate() {
            // An unknown call could be a transfer into the treasury
            let pallet = match ext.pallet_name() {
                Ok(p) => p.to_string(),
                Err(e) => {
                    record_decode_error("extrinsic", "unknown");
                    return Err(ChainError::BlockFetchError {
                        hash: hash.to_hex(),
                        message: format!("extrinsic {} could not be decoded: {}", index, e),
                    });
                }
            };
            let undecodable = |part: &str, e: String| {
                record_decode_error("extrinsic", &pallet);
                if undecodable_call_is_fatal(&pallet) {
                    return Err(ChainError::BlockFetchError {
                        hash: hash.to_hex(),
                        message: format!(
                            "{} extrinsic {} {} could not be decoded: {}",
                            pallet, index, part, e
                        ),
                    });
                }
                trace!(index, pallet = %pallet, part, error = %e, "Undecodable call");
                Ok(())
            };

            let call = match ext.variant_name() {
                Ok(name) => name.to_string(),
                Err(e) => {
                    undecodable("call", e.to_string())?;
                    "unknown".to_string()
                }
            };

            let signer = ext.address_bytes().and_then(|bytes| {
                let signer = signer_from_address(bytes);
                if signer.is_none() {
                    trace!(index, len = bytes.len(), "Unsupported signer address");
                }
                signer
            });

            let args = match ext.field_values() {
                Ok(composite) => composite_to_json(&composite),
                Err(e) => {
                    undecodable("args", e.to_string())?;
                    serde_json::Value::Null
                }
            };

            let tip = ext.signed_extensions().and_then(|extensions| extensions.tip());

            raw_extrinsics.push(RawExtrinsic {
                index: index as u32,
                pallet,
                call,
                signer,
                args,
                tip,
            });
        }

        Ok(RawBlock {
            number: block.number() as u64,
            hash: BlockHash(block.hash().0),
            extrinsics: raw_extrinsics,
        })
    }

    async fn events_at(&self, hash: &BlockHash) -> ChainResult<Vec<RawEvent>> {
        let events = self
            .client
            .events()
            .at(H256(hash.0))
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        let mut raw_events = Vec::new();

        for (index, event) in events.iter().enumerate() {
            match event {
                Ok(ev) => {
                    let data = ev
                        .field_values()
                        .map(|composite| composite_to_json(&composite))
                        .unwrap_or(serde_json::Value::Null);

                    let extrinsic_index = match ev.phase() {
                        subxt::events::Phase::ApplyExtrinsic(idx) => Some(idx),
                        _ => None,
                    };

                    raw_events.push(RawEvent {
                        index: index as u32,
                        extrinsic_index,
                        pallet: ev.pallet_name().to_string(),
                        name: ev.variant_name().to_string(),
                        data,
                    });
                }
                // An undecodable event could be the success marker of a
                // transfer; guessing would risk a wrong ledger entry.
                Err(e) => {
                    record_decode_error("event", "unknown");
                    return Err(ChainError::BlockFetchError {
                        hash: hash.to_hex(),
                        message: format!("event {} could not be decoded: {}", index, e),
                    });
                }
            }
        }

        Ok(raw_events)
    }

    async fn timestamp_at(&self, hash: &BlockHash) -> ChainResult<u64> {
        let now = self.required_u128(hash, "Timestamp", "Now").await?;
        u64::try_from(now)
            .map_err(|_| ChainError::MetadataError(format!("timestamp {} out of range", now)))
    }

    async fn total_issuance_at(&self, hash: &BlockHash) -> ChainResult<u128> {
        self.required_u128(hash, "Balances", "TotalIssuance").await
    }

    async fn free_balance_at(&self, hash: &BlockHash, account: &AccountId) -> ChainResult<u128> {
        let info = self
            .fetch_storage(
                H256(hash.0),
                "System",
                "Account",
                vec![Value::from_bytes(account.0)],
            )
            .await?;

        // Accounts that were never funded have no entry
        let Some(info) = info else {
            return Ok(0);
        };

        free_balance(&info)
            .ok_or_else(|| ChainError::MetadataError("unexpected System.Account layout".into()))
    }

    async fn memo_at(&self, hash: &BlockHash, account: &AccountId) -> ChainResult<String> {
        if self.client.metadata().pallet_by_name("Memo").is_none() {
            return Ok(String::new());
        }

        let memo = self
            .fetch_storage(
                H256(hash.0),
                "Memo",
                "Memo",
                vec![Value::from_bytes(account.0)],
            )
            .await?;

        let Some(memo) = memo else {
            return Ok(String::new());
        };

        let bytes = value_to_bytes(&memo)
            .ok_or_else(|| ChainError::MetadataError("unexpected Memo.Memo layout".into()))?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn token_decimals(&self) -> ChainResult<u8> {
        if let Some(decimals) = self.token_decimals {
            return Ok(decimals);
        }

        let properties = self
            .rpc
            .system_properties()
            .await
            .map_err(|e| ChainError::RpcError(e.to_string()))?;

        token_decimals(&properties).ok_or_else(|| {
            ChainError::MetadataError("tokenDecimals missing from system properties".into())
        })
    }
}
