use std::collections::BTreeMap;

use crate::ast::SourceRange;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::ir::Reference;
use crate::schema::SchemaRegistry;

/// Location of a block in the tree: alternating block and section indices,
/// e.g. `[2, 0, 1]` is block 1 of section 0 of top-level block 2.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPath(Vec<usize>);

impl BlockPath {
    pub fn new(indices: Vec<usize>) -> Self {
        BlockPath(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

/// An explicit reference whose source block id is not final yet.
#[derive(Debug, Clone)]
pub struct PendingReference {
    pub source: BlockPath,
    pub reference: Reference,
}

/// State shared by one compile call and all of its nested sub-compiles.
///
/// Never reuse a context across documents.
pub struct TranslationContext<'r> {
    pub document_id: String,
    pub registry: &'r SchemaRegistry,
    pub max_depth: usize,
    pub diagnostics: Diagnostics,
    pub references: Vec<PendingReference>,
    /// glyph-id → every block that claims it.
    pub block_id_map: BTreeMap<String, Vec<BlockPath>>,
    prefix: Vec<usize>,
    depth: usize,
    anchor: Option<SourceRange>,
}

impl<'r> TranslationContext<'r> {
    pub fn new(
        document_id: String,
        registry: &'r SchemaRegistry,
        max_depth: usize,
        diagnostics: Diagnostics,
    ) -> Self {
        TranslationContext {
            document_id,
            registry,
            max_depth,
            diagnostics,
            references: Vec::new(),
            block_id_map: BTreeMap::new(),
            prefix: Vec::new(),
            depth: 0,
            anchor: None,
        }
    }

    /// Container nesting depth of the text being translated (0 = document).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Path of the block at `index` in the sequence being translated.
    pub fn path_for(&self, index: usize) -> BlockPath {
        let mut indices = Vec::with_capacity(self.prefix.len() + 1);
        indices.extend_from_slice(&self.prefix);
        indices.push(index);
        BlockPath(indices)
    }

    /// Position to record for a node. Nested text has no usable mapping back
    /// into the document, so sub-compiles report the enclosing container's range.
    pub fn position(&self, node_position: SourceRange) -> SourceRange {
        self.anchor.unwrap_or(node_position)
    }

    pub fn record_glyph_id(&mut self, glyph_id: &str, path: BlockPath) {
        self.block_id_map
            .entry(glyph_id.to_string())
            .or_default()
            .push(path);
    }

    /// Run `f` one nesting level down, inside section `section` of block `block`.
    pub fn enter_section<T>(
        &mut self,
        block: usize,
        section: usize,
        anchor: SourceRange,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved_anchor = self.anchor;
        self.prefix.push(block);
        self.prefix.push(section);
        self.depth += 1;
        self.anchor = Some(saved_anchor.unwrap_or(anchor));

        let out = f(self);

        self.anchor = saved_anchor;
        self.depth -= 1;
        self.prefix.truncate(self.prefix.len() - 2);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourcePoint;

    fn range(line: usize) -> SourceRange {
        let p = SourcePoint {
            line,
            column: 1,
            offset: 0,
        };
        SourceRange { start: p, end: p }
    }

    #[test]
    fn sections_extend_and_restore_paths() {
        let registry = SchemaRegistry::builtin();
        let mut ctx = TranslationContext::new("doc".into(), &registry, 8, Diagnostics::new());
        assert_eq!(ctx.path_for(3).indices(), &[3]);

        let inner = ctx.enter_section(3, 1, range(7), |ctx| {
            assert_eq!(ctx.depth(), 1);
            assert_eq!(ctx.position(range(1)), range(7));
            ctx.enter_section(0, 2, range(9), |ctx| {
                // The outermost container's range wins.
                assert_eq!(ctx.position(range(1)), range(7));
                ctx.path_for(4)
            })
        });
        assert_eq!(inner.indices(), &[3, 1, 0, 2, 4]);
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.position(range(1)), range(1));
        assert_eq!(ctx.path_for(0).indices(), &[0]);
    }

    #[test]
    fn glyph_claims_accumulate() {
        let registry = SchemaRegistry::builtin();
        let mut ctx = TranslationContext::new("doc".into(), &registry, 8, Diagnostics::new());
        ctx.record_glyph_id("a", BlockPath::new(vec![0]));
        ctx.record_glyph_id("a", BlockPath::new(vec![2]));
        assert_eq!(ctx.block_id_map["a"].len(), 2);
    }
}
