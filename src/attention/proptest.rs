//! Property-based tests for the attention economy.
//!
//! - Diffusion moves STI between atoms without creating or destroying any
//! - Rent brings the STI fund back to its target monotonically
//! - Focus membership does not churn on fluctuations inside the hysteresis band

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::atom::{AtomType, Handle};
    use crate::attention::{AttentionConfig, ImportanceDiffusion, RentCollector};
    use crate::store::AtomSpace;

    fn space_with_nodes(config: AttentionConfig, n: usize) -> (AtomSpace, Vec<Handle>) {
        let space = AtomSpace::with_config(config).unwrap();
        let handles = (0..n)
            .map(|i| {
                space
                    .add_node(AtomType::ConceptNode, format!("n{}", i), None)
                    .unwrap()
            })
            .collect();
        (space, handles)
    }

    // =========================================================================
    // Diffusion
    // =========================================================================

    proptest! {
        #[test]
        fn diffusion_conserves_total_sti(
            stimuli in prop::collection::vec(0i32..3_000, 2..12),
            edges in prop::collection::vec((0usize..12, 0usize..12), 0..30),
            seed in any::<u64>(),
        ) {
            let config = AttentionConfig { seed: Some(seed), ..Default::default() };
            let (space, nodes) = space_with_nodes(config, stimuli.len());
            for (a, b) in edges {
                let (a, b) = (nodes[a % nodes.len()], nodes[b % nodes.len()]);
                space.add_link(AtomType::ListLink, &[a, b], None).unwrap();
            }
            for (h, amount) in nodes.iter().zip(&stimuli) {
                space.stimulate(*h, *amount).unwrap();
            }

            let before = space.attention().summary().unwrap();
            let diffusion = ImportanceDiffusion::new(space.attention().config());
            for _ in 0..5 {
                diffusion.run(&space).unwrap();
            }
            let after = space.attention().summary().unwrap();

            prop_assert_eq!(before.total_sti, after.total_sti);
            prop_assert_eq!(before.sti_funds, after.sti_funds);
        }
    }

    // =========================================================================
    // Rent
    // =========================================================================

    proptest! {
        #[test]
        fn rent_converges_monotonically(
            stimuli in prop::collection::vec(1i32..5_000, 1..10),
            base_rate in 0.01f64..0.2,
        ) {
            let config = AttentionConfig {
                base_rent_rate: base_rate,
                max_rent_rate: 0.5,
                ..Default::default()
            };
            let target = config.target_sti_funds;
            let (space, nodes) = space_with_nodes(config, stimuli.len());
            for (h, amount) in nodes.iter().zip(&stimuli) {
                space.stimulate(*h, *amount).unwrap();
            }

            let bank = space.attention();
            let rent = RentCollector::new();
            let mut last = bank.sti_funds().unwrap();
            for _ in 0..50 {
                rent.run(bank).unwrap();
                let funds = bank.sti_funds().unwrap();
                prop_assert!(funds >= last, "fund fell from {} to {}", last, funds);
                prop_assert!(funds <= target, "fund {} overshot {}", funds, target);
                last = funds;
            }
            let summary = bank.summary().unwrap();
            prop_assert_eq!(summary.sti_funds + summary.total_sti, target);
        }
    }

    // =========================================================================
    // Focus hysteresis
    // =========================================================================

    proptest! {
        #[test]
        fn focus_stable_inside_hysteresis_band(
            ops in prop::collection::vec((0usize..6, -4i32..=4), 1..100),
        ) {
            let config = AttentionConfig {
                af_min_size: 3,
                af_max_size: 3,
                af_hysteresis: 10,
                ..Default::default()
            };
            let (space, nodes) = space_with_nodes(config, 6);
            for h in &nodes {
                space.stimulate(*h, 100).unwrap();
            }
            let bank = space.attention();
            bank.attentional_focus().unwrap();
            let settled = bank.focus_churn().unwrap();

            // Each atom drifts within [96, 104]; the incumbent bonus of 10
            // keeps every member ahead of every outsider.
            let mut offsets = [0i32; 6];
            for (i, target) in ops {
                space.stimulate(nodes[i], target - offsets[i]).unwrap();
                offsets[i] = target;
                prop_assert_eq!(bank.attentional_focus().unwrap().len(), 3);
            }
            prop_assert_eq!(bank.focus_churn().unwrap(), settled);
        }
    }
}
