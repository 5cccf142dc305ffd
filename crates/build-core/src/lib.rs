#![deny(warnings)]

//! Core domain models and invariants for Sigilwright character builds.
//!
//! This crate defines the serializable selection snapshot consumed by the
//! economy engine, the pricing configuration it is evaluated against, and
//! validation helpers that guard basic invariants of both.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

pub mod pricing;

pub use pricing::*;

/// One of the three build-point pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Power and trait unlocks, written `BP`.
    Primary,
    /// Worldly and social choices, written `FP`.
    Secondary,
    /// Only exists once its unlocking pact is active, written `KP`.
    Tertiary,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Primary, Currency::Secondary, Currency::Tertiary];

    /// Unit code used by cost descriptors.
    pub fn unit(self) -> &'static str {
        match self {
            Currency::Primary => "BP",
            Currency::Secondary => "FP",
            Currency::Tertiary => "KP",
        }
    }

    /// Inverse of [`Currency::unit`].
    pub fn from_unit(unit: &str) -> Option<Self> {
        Currency::ALL.into_iter().find(|c| c.unit() == unit)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit())
    }
}

/// A value per currency, serialized as a plain `{primary, secondary, tertiary}` map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct CurrencyTable<T> {
    pub primary: T,
    pub secondary: T,
    pub tertiary: T,
}

impl<T> CurrencyTable<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Currency, &T)> {
        Currency::ALL.into_iter().map(move |c| (c, &self[c]))
    }
}

impl<T> Index<Currency> for CurrencyTable<T> {
    type Output = T;

    fn index(&self, currency: Currency) -> &T {
        match currency {
            Currency::Primary => &self.primary,
            Currency::Secondary => &self.secondary,
            Currency::Tertiary => &self.tertiary,
        }
    }
}

impl<T> IndexMut<Currency> for CurrencyTable<T> {
    fn index_mut(&mut self, currency: Currency) -> &mut T {
        match currency {
            Currency::Primary => &mut self.primary,
            Currency::Secondary => &mut self.secondary,
            Currency::Tertiary => &mut self.tertiary,
        }
    }
}

/// Signed contribution per currency: positive amounts are spent, negative are gained.
pub type Contribution = CurrencyTable<i64>;

impl Contribution {
    /// Contribution of a single currency.
    pub fn single(currency: Currency, amount: i64) -> Self {
        let mut c = Contribution::default();
        c[currency] = amount;
        c
    }

    pub fn is_zero(&self) -> bool {
        self.iter().all(|(_, v)| *v == 0)
    }
}

/// Consumable sigil ranks in ascending rarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigilTier {
    Kaarn,
    Purth,
    Juathas,
    Xuth,
    Sinthru,
    Lekolu,
}

impl SigilTier {
    pub const ALL: [SigilTier; 6] = [
        SigilTier::Kaarn,
        SigilTier::Purth,
        SigilTier::Juathas,
        SigilTier::Xuth,
        SigilTier::Sinthru,
        SigilTier::Lekolu,
    ];

    /// 1-based rank, T1 through T6.
    pub fn rank(self) -> u8 {
        match self {
            SigilTier::Kaarn => 1,
            SigilTier::Purth => 2,
            SigilTier::Juathas => 3,
            SigilTier::Xuth => 4,
            SigilTier::Sinthru => 5,
            SigilTier::Lekolu => 6,
        }
    }
}

impl fmt::Display for SigilTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigilTier::Kaarn => "Kaarn",
            SigilTier::Purth => "Purth",
            SigilTier::Juathas => "Juathas",
            SigilTier::Xuth => "Xuth",
            SigilTier::Sinthru => "Sinthru",
            SigilTier::Lekolu => "Lekolu",
        };
        f.write_str(name)
    }
}

/// A value per sigil tier, serialized with lowercase tier names as keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct TierTable<T> {
    pub kaarn: T,
    pub purth: T,
    pub juathas: T,
    pub xuth: T,
    pub sinthru: T,
    pub lekolu: T,
}

impl<T> TierTable<T> {
    pub fn iter(&self) -> impl Iterator<Item = (SigilTier, &T)> {
        SigilTier::ALL.into_iter().map(move |t| (t, &self[t]))
    }

    pub fn map<U>(&self, mut f: impl FnMut(SigilTier, &T) -> U) -> TierTable<U> {
        TierTable {
            kaarn: f(SigilTier::Kaarn, &self.kaarn),
            purth: f(SigilTier::Purth, &self.purth),
            juathas: f(SigilTier::Juathas, &self.juathas),
            xuth: f(SigilTier::Xuth, &self.xuth),
            sinthru: f(SigilTier::Sinthru, &self.sinthru),
            lekolu: f(SigilTier::Lekolu, &self.lekolu),
        }
    }
}

impl<T> Index<SigilTier> for TierTable<T> {
    type Output = T;

    fn index(&self, tier: SigilTier) -> &T {
        match tier {
            SigilTier::Kaarn => &self.kaarn,
            SigilTier::Purth => &self.purth,
            SigilTier::Juathas => &self.juathas,
            SigilTier::Xuth => &self.xuth,
            SigilTier::Sinthru => &self.sinthru,
            SigilTier::Lekolu => &self.lekolu,
        }
    }
}

impl<T> IndexMut<SigilTier> for TierTable<T> {
    fn index_mut(&mut self, tier: SigilTier) -> &mut T {
        match tier {
            SigilTier::Kaarn => &mut self.kaarn,
            SigilTier::Purth => &mut self.purth,
            SigilTier::Juathas => &mut self.juathas,
            SigilTier::Xuth => &mut self.xuth,
            SigilTier::Sinthru => &mut self.sinthru,
            SigilTier::Lekolu => &mut self.lekolu,
        }
    }
}

/// The user's chosen origin.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    #[default]
    Unaligned,
    Sylvan,
    Ashen,
    Tidal,
    Gilded,
    Hollow,
}

impl Faction {
    /// Whether a companion of origin `other` counts as same-origin for this faction.
    /// Unaligned never matches, not even itself.
    pub fn shares_origin(self, other: Faction) -> bool {
        self != Faction::Unaligned && self == other
    }
}

/// Global modifier flags that alter pricing formulas while active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pact {
    Hearthbound,
    Bloodprice,
    Tithe,
    Covenant,
    Ironvow,
    Kindred,
}

/// Named prerequisite tree, e.g. "verdant".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(pub String);

/// Node identifier, unique within its tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Fully qualified node reference. Serialized as `"tree/node"` so it can key JSON maps.
///
/// The tree part escapes `%` as `%25` and `/` as `%2F`; the first raw `/` is
/// always the separator, so node ids may contain `/` unescaped.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub tree: TreeId,
    pub node: NodeId,
}

impl NodeKey {
    pub fn new(tree: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            tree: TreeId(tree.into()),
            node: NodeId(node.into()),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", escape_tree(&self.tree.0), self.node.0)
    }
}

fn escape_tree(tree: &str) -> String {
    tree.replace('%', "%25").replace('/', "%2F")
}

fn unescape_tree(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        out.push(match rest.get(pos..pos + 3)? {
            "%25" => '%',
            "%2F" => '/',
            _ => return None,
        });
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}

impl FromStr for NodeKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValidationError::MalformedNodeKey(s.to_string());
        match s.split_once('/') {
            Some((tree, node)) if !tree.is_empty() && !node.is_empty() => {
                let tree = unescape_tree(tree).ok_or_else(malformed)?;
                Ok(NodeKey::new(tree, node))
            }
            _ => Err(malformed()),
        }
    }
}

impl Serialize for NodeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

fn one() -> u32 {
    1
}

/// A selected node in a prerequisite tree and the sigils it draws.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    /// Tier the node draws from.
    pub tier: SigilTier,
    /// Units of that tier consumed (>= 1).
    #[serde(default = "one")]
    pub units: u32,
}

impl TreeNode {
    pub fn new(id: impl Into<String>, tier: SigilTier) -> Self {
        Self {
            id: NodeId(id.into()),
            tier,
            units: 1,
        }
    }
}

/// A purchasable content item carrying a cost descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    /// Cost descriptor text, e.g. "Costs 5 FP". Absent means no contribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    /// Contribution for `Varies` items, which are excluded from descriptor parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit: Option<Contribution>,
}

impl Pick {
    pub fn new(id: impl Into<String>, cost: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cost: Some(cost.into()),
            explicit: None,
        }
    }
}

/// A classmate or colleague with a tagged origin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    pub id: String,
    #[serde(default)]
    pub origin: Faction,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Family {
    /// Headcount priced through the non-linear family table.
    pub size: u32,
    pub traits: Vec<Pick>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Housing {
    /// Headcount priced per resident.
    pub residents: u32,
    pub picks: Vec<Pick>,
}

/// A category made of catalog picks plus a roster of companions (schooling, career).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub picks: Vec<Pick>,
    pub members: Vec<Companion>,
}

/// All content-category selections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selections {
    pub family: Family,
    pub housing: Housing,
    pub schooling: Roster,
    pub blessings: Vec<Pick>,
    pub custom_spells: Vec<Pick>,
    pub career: Roster,
    pub retirement: Vec<Pick>,
}

/// Direct sigil purchases, split by paying currency.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigilPurchases {
    pub primary: TierTable<u32>,
    pub secondary: TierTable<u32>,
}

impl SigilPurchases {
    pub fn total(&self, tier: SigilTier) -> u32 {
        self.primary[tier].saturating_add(self.secondary[tier])
    }
}

/// Selections in the gated bonus tree: linear nodes plus bonus-catalog picks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatedSelections {
    /// Unlocked nodes in prerequisite order.
    pub nodes: Vec<NodeId>,
    pub picks: Vec<Pick>,
}

impl GatedSelections {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.picks.is_empty()
    }
}

/// Live and backed-up gated selections plus the last observed gating condition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatedState {
    pub live: GatedSelections,
    pub backup: GatedSelections,
    /// Condition value recorded at the previous transition check.
    pub last_condition: Option<bool>,
}

/// Global flags, passed as an immutable configuration into each recomputation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildFlags {
    pub faction: Faction,
    pub pacts: BTreeSet<Pact>,
    pub debug: bool,
}

impl BuildFlags {
    pub fn has_pact(&self, pact: Pact) -> bool {
        self.pacts.contains(&pact)
    }
}

/// Read-only snapshot of every input the economy engine consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildState {
    pub flags: BuildFlags,
    pub sigils: SigilPurchases,
    /// Active selections per prerequisite tree.
    pub trees: BTreeMap<TreeId, Vec<TreeNode>>,
    /// Consumption already aggregated by trees not enumerated node by node.
    pub extra_usage: TierTable<u32>,
    pub selections: Selections,
    /// Nodes paid with a currency other than the default.
    pub substitutions: BTreeMap<NodeKey, Currency>,
    pub gated: GatedState,
    /// External narrative condition gating the bonus tree.
    pub gate_open: bool,
}

impl Default for BuildState {
    fn default() -> Self {
        Self {
            flags: BuildFlags::default(),
            sigils: SigilPurchases::default(),
            trees: BTreeMap::new(),
            extra_usage: TierTable::default(),
            selections: Selections::default(),
            substitutions: BTreeMap::new(),
            gated: GatedState::default(),
            gate_open: true,
        }
    }
}

impl BuildState {
    /// Look up an active tree node.
    pub fn node(&self, key: &NodeKey) -> Option<&TreeNode> {
        self.trees
            .get(&key.tree)
            .and_then(|nodes| nodes.iter().find(|n| n.id == key.node))
    }

    /// Iterate every active node across all trees.
    pub fn nodes(&self) -> impl Iterator<Item = (&TreeId, &TreeNode)> {
        self.trees
            .iter()
            .flat_map(|(tree, nodes)| nodes.iter().map(move |n| (tree, n)))
    }

    /// Fold node tier tags into per-tier consumption, plus the pre-aggregated extra usage.
    pub fn tree_usage(&self) -> TierTable<u32> {
        let mut used = self.extra_usage;
        for (_, node) in self.nodes() {
            used[node.tier] = used[node.tier].saturating_add(node.units);
        }
        used
    }

    /// Select a node in a tree, replacing any node with the same id.
    pub fn select_node(&mut self, tree: impl Into<String>, node: TreeNode) {
        let nodes = self.trees.entry(TreeId(tree.into())).or_default();
        nodes.retain(|n| n.id != node.id);
        nodes.push(node);
    }

    /// Deselect a node; empty trees are dropped.
    pub fn deselect_node(&mut self, key: &NodeKey) -> bool {
        let Some(nodes) = self.trees.get_mut(&key.tree) else {
            return false;
        };
        let before = nodes.len();
        nodes.retain(|n| n.id != key.node);
        let removed = nodes.len() != before;
        if nodes.is_empty() {
            self.trees.remove(&key.tree);
        }
        removed
    }
}

/// Validation errors for build and pricing invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Node key text was not of the form `tree/node`.
    #[error("malformed node key: {0:?}")]
    MalformedNodeKey(String),
    /// The same node id appears twice in one tree.
    #[error("duplicate node {0}")]
    DuplicateNode(String),
    /// A node must consume at least one unit.
    #[error("node {0} consumes zero units")]
    ZeroUnits(String),
    /// Tier bought with FP although its pricing does not accept FP.
    #[error("{0} cannot be bought with FP")]
    SecondaryNotAccepted(SigilTier),
    /// Picks need a non-blank identifier.
    #[error("blank pick id in {0}")]
    BlankPickId(&'static str),
    /// Live and backup gated selections are both populated.
    #[error("gated selections are both live and backed up")]
    GateBothPopulated,
    /// Prices and fees must be non-negative.
    #[error("negative price in {0}")]
    NegativePrice(&'static str),
    /// The family headcount table needs at least one entry.
    #[error("family size table is empty")]
    EmptyFamilyTable,
}

/// Validate a build snapshot against the pricing it will be evaluated with.
pub fn validate_build(state: &BuildState, pricing: &PricingConfig) -> Result<(), ValidationError> {
    for (tree, nodes) in &state.trees {
        let mut seen: BTreeSet<&NodeId> = BTreeSet::new();
        for n in nodes {
            let key = || NodeKey {
                tree: tree.clone(),
                node: n.id.clone(),
            };
            if !seen.insert(&n.id) {
                return Err(ValidationError::DuplicateNode(key().to_string()));
            }
            if n.units == 0 {
                return Err(ValidationError::ZeroUnits(key().to_string()));
            }
        }
    }
    for (tier, count) in state.sigils.secondary.iter() {
        if *count > 0 && !pricing.tiers[tier].secondary {
            return Err(ValidationError::SecondaryNotAccepted(tier));
        }
    }
    let s = &state.selections;
    let categories: [(&'static str, &[Pick]); 9] = [
        ("family", &s.family.traits),
        ("housing", &s.housing.picks),
        ("schooling", &s.schooling.picks),
        ("blessings", &s.blessings),
        ("custom_spells", &s.custom_spells),
        ("career", &s.career.picks),
        ("retirement", &s.retirement),
        ("gated", &state.gated.live.picks),
        ("gated_backup", &state.gated.backup.picks),
    ];
    for (name, picks) in categories {
        if picks.iter().any(|p| p.id.trim().is_empty()) {
            return Err(ValidationError::BlankPickId(name));
        }
    }
    if !state.gated.live.is_empty() && !state.gated.backup.is_empty() {
        return Err(ValidationError::GateBothPopulated);
    }
    debug!(trees = state.trees.len(), "build validated");
    Ok(())
}
