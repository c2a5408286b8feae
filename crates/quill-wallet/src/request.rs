//! JSON transaction requests.
//!
//! ```json
//! {"inputs":  [{"id": "<txid hex>", "index": 0, "value": 600000}],
//!  "outputs": [{"addr": "<address>", "value": 1000000}],
//!  "change":  "<address>"}
//! ```
//!
//! Fields are kept as text until [`TxRequest::into_builder`] so that a bad
//! txid or address is reported as such rather than as a JSON error.

use serde::{Deserialize, Serialize};

use quill_core::address::Address;
use quill_core::types::{Hash256, TxInput, TxOutput, UtxoRef};
use tracing::debug;

use crate::builder::TransactionBuilder;
use crate::coin_selection::{CoinSelector, SelectionStrategy};
use crate::error::WalletError;
use crate::fee::FeePolicy;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInput {
    pub id: String,
    pub index: u32,
    pub value: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutput {
    pub addr: String,
    pub value: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub inputs: Vec<RequestInput>,
    pub outputs: Vec<RequestOutput>,
    #[serde(default)]
    pub change: Option<String>,
}

impl TxRequest {
    pub fn from_json(text: &str) -> Result<Self, WalletError> {
        serde_json::from_str(text).map_err(|e| WalletError::InvalidRequest(e.to_string()))
    }

    /// Load the request into a fresh builder, in request order.
    pub fn into_builder(self) -> Result<TransactionBuilder, WalletError> {
        self.apply(TransactionBuilder::new())
    }

    /// Like [`into_builder`](Self::into_builder) but onto a configured builder.
    pub fn apply(self, mut builder: TransactionBuilder) -> Result<TransactionBuilder, WalletError> {
        let (inputs, outputs, change) = self.parse()?;
        for input in inputs {
            builder.add_input(input.utxo, input.value)?;
        }
        for output in outputs {
            builder.add_output(output)?;
        }
        if let Some(change) = change {
            builder.set_change_address(change);
        }
        Ok(builder)
    }

    /// Treat the request inputs as a pool and load only the ones coin
    /// selection picks under `strategy`. Needs a change address.
    pub fn select<P: FeePolicy + ?Sized>(
        self,
        mut builder: TransactionBuilder,
        policy: &P,
        strategy: SelectionStrategy,
    ) -> Result<TransactionBuilder, WalletError> {
        let (available, outputs, change) = self.parse()?;
        let change = change.ok_or_else(|| {
            WalletError::InvalidRequest("coin selection needs a change address".to_string())
        })?;

        let selection = CoinSelector::select(&available, &outputs, &change, policy, strategy)?;
        debug!(
            ?strategy,
            available = available.len(),
            selected = selection.selected.len(),
            "request: inputs selected"
        );
        for input in &selection.selected {
            builder.add_input(input.utxo, input.value)?;
        }
        for output in outputs {
            builder.add_output(output)?;
        }
        builder.set_change_address(change);
        Ok(builder)
    }

    fn parse(self) -> Result<(Vec<TxInput>, Vec<TxOutput>, Option<Address>), WalletError> {
        let inputs = self
            .inputs
            .into_iter()
            .map(|input| -> Result<TxInput, WalletError> {
                let txid = Hash256::from_hex(&input.id)
                    .map_err(|_| WalletError::InvalidTxId(input.id.clone()))?;
                Ok(TxInput {
                    utxo: UtxoRef::new(txid, input.index),
                    value: input.value,
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;
        let outputs = self
            .outputs
            .into_iter()
            .map(|output| -> Result<TxOutput, WalletError> {
                Ok(TxOutput {
                    address: parse_address(&output.addr)?,
                    value: output.value,
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;
        let change = self.change.as_deref().map(parse_address).transpose()?;
        Ok((inputs, outputs, change))
    }
}

fn parse_address(text: &str) -> Result<Address, WalletError> {
    Address::decode(text).map_err(|e| WalletError::InvalidAddress(format!("{text}: {e}")))
}
