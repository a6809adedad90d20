//! Property tests for id stability and compiler totality.

use std::collections::HashSet;

use glyph::CompileOptions;
use glyph::ids::resolve_block_id_collisions;
use proptest::prelude::*;

/// One Markdown block drawn from a small vocabulary, so collisions are common.
fn block() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-c]{1,3}".prop_map(|t| format!("{}\n", t)),
        "[a-c]{1,3}".prop_map(|t| format!("# {}\n", t)),
        "[a-c]{1,2}".prop_map(|t| format!("# {} {{#{}}}\n", t, t)),
        "[a-c]{1,2}".prop_map(|t| format!("[go](#glyph:{})\n", t)),
        "[a-c]{1,2}".prop_map(|t| {
            format!("```ui:tabs\ntabs:\n  - label: x\n    content: \"{}\"\n  - label: y\n    content: \"{}\"\n```\n", t, t)
        }),
        Just("```ui:chart\ntype: [\n```\n".to_string()),
        Just("---\n".to_string()),
    ]
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(block(), 0..12).prop_map(|blocks| blocks.join("\n"))
}

proptest! {
    #[test]
    fn collision_resolution_is_idempotent(ids in prop::collection::vec("[ab](-[12])?", 0..20)) {
        let once = resolve_block_id_collisions(&ids);
        let twice = resolve_block_id_collisions(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.len(), ids.len());

        let unique: HashSet<_> = once.iter().collect();
        prop_assert_eq!(unique.len(), once.len());
    }

    #[test]
    fn first_occurrences_are_kept(ids in prop::collection::vec("[abc]", 0..20)) {
        let resolved = resolve_block_id_collisions(&ids);
        let mut seen = HashSet::new();
        for (original, out) in ids.iter().zip(&resolved) {
            if seen.insert(original) {
                prop_assert_eq!(original, out);
            } else {
                let prefix = format!("{}-", original);
                prop_assert!(out.starts_with(&prefix));
            }
        }
    }

    #[test]
    fn compilation_is_deterministic(source in document()) {
        let a = glyph::compile(&source, &CompileOptions::default());
        let b = glyph::compile(&source, &CompileOptions::default());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn block_ids_are_unique(source in document()) {
        let result = glyph::compile(&source, &CompileOptions::default());
        let ids = result.ir.all_block_ids();
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn references_resolve_or_explain(source in document()) {
        let result = glyph::compile(&source, &CompileOptions::default());
        let ids: HashSet<_> = result.ir.all_block_ids().into_iter().collect();
        for reference in &result.ir.references {
            if let Some(id) = &reference.resolved_block_id {
                prop_assert!(ids.contains(id.as_str()));
            }
        }
        prop_assert_eq!(
            result.has_errors,
            result.diagnostics.iter().any(|d| d.is_error())
        );
    }

    #[test]
    fn arbitrary_text_never_panics(source in any::<String>()) {
        let result = glyph::compile(&source, &CompileOptions::default());
        prop_assert!(!result.ir.id.is_empty());
    }
}
