//! Wire payload types delivered by the node.
//!
//! These mirror the JSON the node sends with new-block notifications. The
//! synchronization pipeline persists and forwards them without interpreting
//! their contents, so every field is `#[serde(default)]`: a partial or
//! evolved payload never aborts ingestion, it just leaves fields empty.
//!
//! Hash-valued fields stay as the hex strings the node sent; only the header
//! hash itself (the store key) is parsed, in [`crate::hash`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A block as announced by the node: header fields plus the extrinsic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Block {
    pub header: Header,
    pub extrinsic: Extrinsic,
}

impl Block {
    /// All work reports carried by this block's guarantees.
    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.extrinsic.guarantees.iter().map(|g| &g.report)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub parent: String,
    pub parent_state_root: String,
    pub extrinsic_hash: String,
    pub slot: u64,
    pub author_index: u32,
    pub entropy_source: String,
    pub seal: String,
}

/// The extrinsic section of a block. Only guarantees are modeled in depth
/// (they carry the work reports the explorer lists); the other sections are
/// kept as raw JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extrinsic {
    pub tickets: Vec<Value>,
    pub preimages: Vec<Value>,
    pub guarantees: Vec<Guarantee>,
    pub assurances: Vec<Value>,
    pub disputes: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guarantee {
    pub report: Report,
    pub slot: u64,
    pub signatures: Vec<Value>,
}

/// A validation work report.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub auth_output: String,
    pub authorizer_hash: String,
    pub core_index: u32,
    pub context: ReportContext,
    pub package_spec: PackageSpec,
    pub results: Vec<ReportResult>,
    pub segment_root_lookup: Vec<SegmentRootLookup>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportContext {
    pub anchor: String,
    pub state_root: String,
    pub beefy_root: String,
    pub lookup_anchor: String,
    pub lookup_anchor_slot: u64,
    pub prerequisites: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSpec {
    pub hash: String,
    pub length: u64,
    pub erasure_root: String,
    pub exports_root: String,
    pub exports_count: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportResult {
    pub service_id: u64,
    pub code_hash: String,
    pub payload_hash: String,
    pub accumulate_gas: u64,
    pub result: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentRootLookup {
    pub segment_tree_root: String,
    pub work_package_hash: String,
}
