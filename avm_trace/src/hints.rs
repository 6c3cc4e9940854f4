//! Execution hints: values the trace builder cannot compute on its own, such
//! as tree membership results, storage values and the outcome of nested
//! calls. They are produced by whoever simulated the execution beforehand.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::errors::ExecutionError;
use crate::util::{ff_serde, ff_vec_serde, FF};

/// Value hinted for the side effect with a given counter: the result of an
/// existence check, or the value returned by a storage read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectHint {
    pub side_effect_counter: u32,
    #[serde(with = "ff_serde")]
    pub value: FF,
}

/// Membership of a leaf index in the note hash or L1-to-L2 message trees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafIndexHint {
    #[serde(with = "ff_serde")]
    pub leaf_index: FF,
    pub exists: bool,
}

/// Outcome of a nested call, which is not executed by this builder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalCallHint {
    pub success: bool,
    #[serde(with = "ff_vec_serde")]
    pub return_data: Vec<FF>,
    pub l2_gas_used: u32,
    pub da_gas_used: u32,
    /// Side effect counter of the caller once the nested call returns.
    pub end_side_effect_counter: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractInstanceHint {
    #[serde(with = "ff_serde")]
    pub address: FF,
    pub exists: bool,
    #[serde(with = "ff_serde")]
    pub deployer_addr: FF,
    #[serde(with = "ff_serde")]
    pub contract_class_id: FF,
    #[serde(with = "ff_serde")]
    pub initialisation_hash: FF,
}

/// Hints of one execution, as deserialized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionHints {
    pub side_effect_hints: Vec<SideEffectHint>,
    pub leaf_index_hints: Vec<LeafIndexHint>,
    /// Consumed in order, one per CALL or STATICCALL.
    pub external_call_hints: Vec<ExternalCallHint>,
    pub contract_instance_hints: Vec<ContractInstanceHint>,
}

impl ExecutionHints {
    pub fn with_side_effect_hints(mut self, hints: impl IntoIterator<Item = (u32, FF)>) -> Self {
        self.side_effect_hints.extend(
            hints
                .into_iter()
                .map(|(side_effect_counter, value)| SideEffectHint {
                    side_effect_counter,
                    value,
                }),
        );
        self
    }

    pub fn with_leaf_index_hints(mut self, hints: impl IntoIterator<Item = (FF, bool)>) -> Self {
        self.leaf_index_hints.extend(
            hints
                .into_iter()
                .map(|(leaf_index, exists)| LeafIndexHint { leaf_index, exists }),
        );
        self
    }

    pub fn with_external_call_hints(
        mut self,
        hints: impl IntoIterator<Item = ExternalCallHint>,
    ) -> Self {
        self.external_call_hints.extend(hints);
        self
    }

    pub fn with_contract_instance_hints(
        mut self,
        hints: impl IntoIterator<Item = ContractInstanceHint>,
    ) -> Self {
        self.contract_instance_hints.extend(hints);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Hints indexed for lookup during execution.
#[derive(Clone, Debug, Default)]
pub struct HintIndex {
    side_effects: HashMap<u32, FF>,
    leaf_indices: HashMap<FF, bool>,
    external_calls: Vec<ExternalCallHint>,
    contract_instances: HashMap<FF, ContractInstanceHint>,
}

impl From<ExecutionHints> for HintIndex {
    fn from(hints: ExecutionHints) -> Self {
        Self {
            side_effects: hints
                .side_effect_hints
                .into_iter()
                .map(|h| (h.side_effect_counter, h.value))
                .collect(),
            leaf_indices: hints
                .leaf_index_hints
                .into_iter()
                .map(|h| (h.leaf_index, h.exists))
                .collect(),
            external_calls: hints.external_call_hints,
            contract_instances: hints
                .contract_instance_hints
                .into_iter()
                .map(|h| (h.address, h))
                .collect(),
        }
    }
}

impl HintIndex {
    pub fn side_effect(&self, side_effect_counter: u32) -> Result<FF, ExecutionError> {
        self.side_effects
            .get(&side_effect_counter)
            .copied()
            .ok_or_else(|| ExecutionError::MissingHint {
                kind: "side effect",
                key: side_effect_counter.to_string(),
            })
    }

    pub fn leaf_index(&self, leaf_index: FF) -> Result<bool, ExecutionError> {
        self.leaf_indices
            .get(&leaf_index)
            .copied()
            .ok_or_else(|| ExecutionError::MissingHint {
                kind: "leaf index",
                key: leaf_index.to_string(),
            })
    }

    pub fn external_call(
        &self,
        external_call_counter: u32,
    ) -> Result<&ExternalCallHint, ExecutionError> {
        self.external_calls
            .get(external_call_counter as usize)
            .ok_or_else(|| ExecutionError::MissingHint {
                kind: "external call",
                key: external_call_counter.to_string(),
            })
    }

    /// Instance deployed at `address`. Addresses without a hint are reported
    /// as not deployed.
    pub fn contract_instance(&self, address: FF) -> ContractInstanceHint {
        self.contract_instances
            .get(&address)
            .copied()
            .unwrap_or(ContractInstanceHint {
                address,
                ..Default::default()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_and_index() {
        let json = r#"{
            "side_effect_hints": [{ "side_effect_counter": 3, "value": "0x2a" }],
            "leaf_index_hints": [{ "leaf_index": "7", "exists": true }],
            "external_call_hints": [
                { "success": true, "return_data": ["0x1", "2"], "l2_gas_used": 100 }
            ],
            "contract_instance_hints": [
                { "address": "0xabc", "exists": true, "deployer_addr": "0x1" }
            ]
        }"#;
        let hints = HintIndex::from(ExecutionHints::from_json(json).unwrap());
        assert_eq!(hints.side_effect(3).unwrap(), FF::from(42u64));
        assert!(hints.leaf_index(FF::from(7u64)).unwrap());
        let call = hints.external_call(0).unwrap();
        assert_eq!(call.return_data, vec![FF::from(1u64), FF::from(2u64)]);
        assert_eq!(call.da_gas_used, 0);
        assert!(hints.contract_instance(FF::from(0xabcu64)).exists);
        assert!(!hints.contract_instance(FF::from(1u64)).exists);
    }

    #[test]
    fn missing_hints_are_reported() {
        let hints = HintIndex::from(ExecutionHints::default());
        assert!(matches!(
            hints.side_effect(0),
            Err(ExecutionError::MissingHint { kind: "side effect", .. })
        ));
        assert!(hints.external_call(0).is_err());
    }

    #[test]
    fn builders_append() {
        let hints = ExecutionHints::default()
            .with_side_effect_hints([(0, FF::from(1u64)), (1, FF::from(0u64))])
            .with_leaf_index_hints([(FF::from(5u64), false)]);
        assert_eq!(hints.side_effect_hints.len(), 2);
        assert_eq!(hints.leaf_index_hints.len(), 1);
    }
}
