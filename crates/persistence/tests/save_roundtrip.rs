use build_core::{
    BuildState, Companion, Currency, Faction, GatedSelections, NodeId, NodeKey, Pact, Pick,
    PricingConfig, SigilTier, TreeNode,
};
use chrono::Utc;
use persistence::{from_document, load_document, restore_session, save_to_path, to_document};
use proptest::prelude::*;

fn full_state() -> BuildState {
    let mut s = BuildState::default();
    s.flags.faction = Faction::Sylvan;
    s.flags.pacts = [Pact::Kindred, Pact::Covenant].into();
    s.sigils.primary.juathas = 3;
    s.sigils.primary.purth = 2;
    s.sigils.secondary.kaarn = 5;
    s.extra_usage.kaarn = 2;
    s.select_node("verdant", TreeNode::new("thornwall", SigilTier::Juathas));
    s.select_node("verdant", TreeNode::new("bramble", SigilTier::Purth));
    s.substitutions
        .insert(NodeKey::new("verdant", "thornwall"), Currency::Tertiary);
    s.selections.family.size = 4;
    s.selections.schooling.members.push(Companion {
        id: "ria".into(),
        origin: Faction::Sylvan,
    });
    s.selections.custom_spells.push(Pick {
        id: "hex".into(),
        cost: Some("Varies".into()),
        explicit: Some(build_core::Contribution::single(Currency::Primary, 6)),
    });
    s.gate_open = false;
    s.gated.backup = GatedSelections {
        nodes: vec![NodeId("first-light".into())],
        picks: vec![Pick::new("boon", "Free")],
    };
    s.gated.last_condition = Some(false);
    s
}

#[test]
fn document_roundtrip_is_verbatim() {
    let state = full_state();
    let doc = to_document(&state, Utc::now()).unwrap();
    assert_eq!(from_document(&doc).unwrap(), state);
}

#[test]
fn file_roundtrip_is_verbatim() {
    let dir = std::env::temp_dir().join(format!("sigilwright-save-{}", std::process::id()));
    let path = dir.join("build.json");
    let state = full_state();
    save_to_path(&path, &state).unwrap();
    let doc = load_document(&path).unwrap();
    assert_eq!(from_document(&doc).unwrap(), state);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn restore_prunes_override_for_missing_node() {
    let mut state = full_state();
    state.trees.clear();
    let doc = to_document(&state, Utc::now()).unwrap();
    let (mut session, pruned) = restore_session(&doc, PricingConfig::default()).unwrap();
    assert_eq!(pruned, vec![NodeKey::new("verdant", "thornwall")]);
    assert!(session.state().substitutions.is_empty());

    let r = session.recompute();
    assert!(r.pruned.is_empty());
    assert_eq!(r.report.balance(Currency::Tertiary), 0);
}

#[test]
fn restore_keeps_backed_selection_suspended() {
    let doc = to_document(&full_state(), Utc::now()).unwrap();
    let (mut session, pruned) = restore_session(&doc, PricingConfig::default()).unwrap();
    assert!(pruned.is_empty());
    let r = session.recompute();
    assert!(r.notices.is_empty());
    assert_eq!(session.state().gated.backup.nodes.len(), 1);

    let r2 = session.update(|st| st.gate_open = true);
    assert_eq!(r2.notices.len(), 1);
    assert_eq!(session.state().gated.live.nodes.len(), 1);
    assert!(r.report.inventory.sinthru.used < r2.report.inventory.sinthru.used);
}

#[test]
fn override_on_slashed_tree_survives_restore() {
    let mut state = BuildState::default();
    state.flags.pacts.insert(Pact::Kindred);
    state.sigils.primary.juathas = 1;
    state.select_node("school/verdant", TreeNode::new("thorn", SigilTier::Juathas));
    let key = NodeKey::new("school/verdant", "thorn");
    state.substitutions.insert(key.clone(), Currency::Tertiary);

    let doc = to_document(&state, Utc::now()).unwrap();
    let text = serde_json::to_string(&doc).unwrap();
    let doc = serde_json::from_str(&text).unwrap();
    assert_eq!(from_document(&doc).unwrap(), state);

    let (session, pruned) = restore_session(&doc, PricingConfig::default()).unwrap();
    assert!(pruned.is_empty());
    assert_eq!(session.state().substitutions.get(&key), Some(&Currency::Tertiary));
}

proptest! {
    #[test]
    fn acquired_counts_roundtrip(counts in proptest::array::uniform6(0u32..10_000)) {
        let mut state = BuildState::default();
        for (tier, n) in SigilTier::ALL.into_iter().zip(counts) {
            state.sigils.primary[tier] = n;
        }
        let doc = to_document(&state, Utc::now()).unwrap();
        let back = from_document(&doc).unwrap();
        prop_assert_eq!(back.sigils, state.sigils);
    }
}
