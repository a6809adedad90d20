//! Content-addressed identifiers.
//!
//! Ids are persisted and diffed by downstream consumers, so every function
//! here is pure. The fingerprint is SHA-256 over NUL-separated fields,
//! lowercase hex, truncated to [`DOCUMENT_HASH_LEN`] / [`BLOCK_HASH_LEN`].

use std::collections::{BTreeMap, HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::context::BlockPath;
use crate::ir::{Block, BlockData};

pub const DOCUMENT_HASH_LEN: usize = 16;
pub const BLOCK_HASH_LEN: usize = 12;

/// Derive the document id: explicit override, else frontmatter glyph-id,
/// else a fingerprint of `(file_path, content)`.
pub fn generate_document_id(
    explicit: Option<&str>,
    glyph_id: Option<&str>,
    file_path: Option<&str>,
    content: &str,
) -> String {
    if let Some(id) = explicit.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    if let Some(id) = glyph_id.filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    let digest = fingerprint(&[file_path.unwrap_or(""), content]);
    format!("doc-{}", &digest[..DOCUMENT_HASH_LEN])
}

/// Provisional id for a freshly translated block. Identical blocks in one
/// document share an id until [`resolve_block_id_collisions`] runs.
pub fn provisional_block_id(document_id: &str, kind: &str, data: &BlockData) -> String {
    // Map keys serialize sorted, so this is stable for equal data.
    let canonical = serde_json::to_string(data).unwrap_or_default();
    let digest = fingerprint(&[document_id, kind, &canonical]);
    format!("b-{}", &digest[..BLOCK_HASH_LEN])
}

fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Make `ids` unique while preserving length and order.
///
/// The first occurrence of an id is kept. Each later duplicate of `x` becomes
/// `x-N`, with `N` counting up from 1 per base id and skipping any candidate
/// that appears anywhere in the input or was already assigned. Already-unique
/// input passes through unchanged, so the function is idempotent.
pub fn resolve_block_id_collisions(ids: &[String]) -> Vec<String> {
    let reserved: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut assigned: HashSet<String> = HashSet::with_capacity(ids.len());
    let mut next_suffix: HashMap<&str, usize> = HashMap::new();
    let mut resolved = Vec::with_capacity(ids.len());

    for id in ids {
        if assigned.insert(id.clone()) {
            resolved.push(id.clone());
            continue;
        }
        let n = next_suffix.entry(id.as_str()).or_insert(1);
        loop {
            let candidate = format!("{}-{}", id, n);
            *n += 1;
            if !reserved.contains(candidate.as_str()) && !assigned.contains(&candidate) {
                tracing::trace!(from = %id, to = %candidate, "block id collision");
                assigned.insert(candidate.clone());
                resolved.push(candidate);
                break;
            }
        }
    }

    resolved
}

/// Resolve collisions across the whole block tree in place.
///
/// Returns the final id of every block keyed by its path, so references and
/// glyph-id claims recorded against paths can be rewritten.
pub fn finalize_block_ids(blocks: &mut [Block]) -> BTreeMap<BlockPath, String> {
    let mut paths = Vec::new();
    let mut provisional = Vec::new();
    collect_ids(blocks, &mut Vec::new(), &mut paths, &mut provisional);

    let resolved = resolve_block_id_collisions(&provisional);
    let mut finals = resolved.iter();
    assign_ids(blocks, &mut finals);

    paths.into_iter().zip(resolved).collect()
}

fn collect_ids(
    blocks: &[Block],
    prefix: &mut Vec<usize>,
    paths: &mut Vec<BlockPath>,
    ids: &mut Vec<String>,
) {
    for (i, block) in blocks.iter().enumerate() {
        prefix.push(i);
        paths.push(BlockPath::new(prefix.clone()));
        ids.push(block.id.clone());
        if let BlockData::Container(container) = &block.data {
            for (s, nested) in container.nested_blocks() {
                prefix.push(s);
                collect_ids(nested, prefix, paths, ids);
                prefix.pop();
            }
        }
        prefix.pop();
    }
}

fn assign_ids<'a>(blocks: &mut [Block], finals: &mut impl Iterator<Item = &'a String>) {
    for block in blocks {
        if let Some(id) = finals.next() {
            block.id.clone_from(id);
        }
        if let BlockData::Container(container) = &mut block.data {
            for (_, nested) in container.nested_blocks_mut() {
                assign_ids(nested, finals);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Inline;
    use crate::ir::ParagraphData;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn explicit_override_wins() {
        assert_eq!(
            generate_document_id(Some("forced"), Some("fm"), Some("a.md"), "x"),
            "forced"
        );
        assert_eq!(generate_document_id(None, Some("fm"), Some("a.md"), "x"), "fm");
    }

    #[test]
    fn hashed_document_id_depends_on_path_and_content() {
        let a = generate_document_id(None, None, Some("a.md"), "x");
        let b = generate_document_id(None, None, Some("b.md"), "x");
        let c = generate_document_id(None, None, Some("a.md"), "y");
        assert!(a.starts_with("doc-"));
        assert_eq!(a.len(), 4 + DOCUMENT_HASH_LEN);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, generate_document_id(None, None, Some("a.md"), "x"));
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let hashed = generate_document_id(None, None, None, "x");
        assert_eq!(generate_document_id(Some(""), Some(""), None, "x"), hashed);
    }

    #[test]
    fn block_ids_are_content_addressed() {
        let para = |text: &str| {
            BlockData::Paragraph(ParagraphData {
                children: vec![Inline::text(text)],
            })
        };
        let a = provisional_block_id("doc", "paragraph", &para("same"));
        let b = provisional_block_id("doc", "paragraph", &para("same"));
        let c = provisional_block_id("doc", "paragraph", &para("other"));
        let d = provisional_block_id("doc2", "paragraph", &para("same"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 2 + BLOCK_HASH_LEN);
    }

    #[test]
    fn duplicates_get_counting_suffixes() {
        assert_eq!(
            resolve_block_id_collisions(&ids(&["a", "b", "a", "a"])),
            ids(&["a", "b", "a-1", "a-2"])
        );
    }

    #[test]
    fn suffixes_skip_ids_present_in_input() {
        assert_eq!(
            resolve_block_id_collisions(&ids(&["a", "a", "a-1"])),
            ids(&["a", "a-2", "a-1"])
        );
    }

    #[test]
    fn unique_input_is_unchanged() {
        let input = ids(&["x", "y", "x-1"]);
        assert_eq!(resolve_block_id_collisions(&input), input);
    }

    #[test]
    fn resolution_is_idempotent() {
        let once = resolve_block_id_collisions(&ids(&["a", "a", "a-1", "a", "b", "b"]));
        assert_eq!(resolve_block_id_collisions(&once), once);
    }

    #[test]
    fn empty_input() {
        assert!(resolve_block_id_collisions(&[]).is_empty());
    }
}
