//! CFG analyses
//!
//! Reverse post-order, dominator tree, and natural loop detection for
//! one IR function. Functions with irreducible control flow are
//! rejected here and skipped by the pipeline.

use crate::ir::{BlockId, IrFunction};
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// A natural loop: a header plus the blocks that reach its latches
/// without passing through the header
#[derive(Clone, Debug)]
pub struct NaturalLoop {
    pub header: BlockId,
    pub latches: Vec<BlockId>,
    pub body: HashSet<BlockId>,
}

/// Control-flow facts for one function
#[derive(Debug)]
pub struct CfgInfo {
    /// Reverse post-order over reachable blocks; successor order comes
    /// from the terminator, so the order is stable
    pub rpo: Vec<BlockId>,
    pub reachable: HashSet<BlockId>,
    idom: HashMap<BlockId, BlockId>,
    back_edges: HashSet<(BlockId, BlockId)>,
    /// Loops sorted by body size, innermost first
    pub loops: Vec<NaturalLoop>,
    loop_of: HashMap<BlockId, usize>,
}

impl CfgInfo {
    /// Analyze a function's CFG
    ///
    /// Returns a diagnostic string when the graph is irreducible (a
    /// retreating edge whose target does not dominate its source).
    pub fn compute(func: &IrFunction) -> Result<Self, String> {
        let entry = func.entry_block;

        // Iterative DFS producing a post-order and the retreating edges
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut colors: HashMap<BlockId, Color> = HashMap::new();
        let mut post: Vec<BlockId> = Vec::new();
        let mut retreating: Vec<(BlockId, BlockId)> = Vec::new();
        let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();

        enum Step {
            Descend(BlockId, BlockId),
            Finish(BlockId),
        }

        colors.insert(entry, Color::Gray);
        let entry_succs = func
            .get_block(entry)
            .map(|b| b.successors())
            .unwrap_or_default();
        stack.push((entry, entry_succs, 0));

        loop {
            let step = {
                let Some((block, succs, idx)) = stack.last_mut() else {
                    break;
                };
                if *idx < succs.len() {
                    let succ = succs[*idx];
                    *idx += 1;
                    Step::Descend(*block, succ)
                } else {
                    Step::Finish(*block)
                }
            };
            match step {
                Step::Descend(block, succ) => {
                    match colors.get(&succ).copied().unwrap_or(Color::White) {
                        Color::White => {
                            if let Some(succ_block) = func.get_block(succ) {
                                colors.insert(succ, Color::Gray);
                                stack.push((succ, succ_block.successors(), 0));
                            }
                        }
                        Color::Gray => retreating.push((block, succ)),
                        Color::Black => {}
                    }
                }
                Step::Finish(block) => {
                    colors.insert(block, Color::Black);
                    post.push(block);
                    stack.pop();
                }
            }
        }

        let reachable: HashSet<BlockId> = post.iter().copied().collect();
        let mut rpo = post;
        rpo.reverse();

        // Dominator tree over the reachable subgraph
        let mut graph: DiGraph<BlockId, ()> = DiGraph::new();
        let mut node_of: HashMap<BlockId, NodeIndex> = HashMap::new();
        for &b in &rpo {
            node_of.insert(b, graph.add_node(b));
        }
        for &b in &rpo {
            for succ in func.get_block(b).unwrap().successors() {
                if let Some(&succ_idx) = node_of.get(&succ) {
                    graph.add_edge(node_of[&b], succ_idx, ());
                }
            }
        }
        let doms = simple_fast(&graph, node_of[&entry]);
        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        for &b in &rpo {
            if b == entry {
                continue;
            }
            if let Some(d) = doms.immediate_dominator(node_of[&b]) {
                idom.insert(b, graph[d]);
            }
        }

        let mut info = CfgInfo {
            rpo,
            reachable,
            idom,
            back_edges: HashSet::new(),
            loops: Vec::new(),
            loop_of: HashMap::new(),
        };

        // Retreating edges must be genuine back edges
        for (from, to) in retreating {
            if !info.dominates(to, from) {
                return Err(format!(
                    "irreducible control flow: retreating edge {} -> {}",
                    from, to
                ));
            }
            info.back_edges.insert((from, to));
        }

        info.build_loops(func);
        Ok(info)
    }

    /// True when `a` dominates `b`
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom.get(&current) {
                Some(&next) => current = next,
                None => return false,
            }
        }
    }

    pub fn is_back_edge(&self, from: BlockId, to: BlockId) -> bool {
        self.back_edges.contains(&(from, to))
    }

    fn build_loops(&mut self, func: &IrFunction) {
        // Group latches per header, headers in RPO order
        let mut latches_of: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for &(from, to) in &self.back_edges {
            latches_of.entry(to).or_default().push(from);
        }

        for &header in &self.rpo {
            let Some(mut latches) = latches_of.remove(&header) else {
                continue;
            };
            latches.sort();

            // Body: blocks reaching a latch without passing the header
            let mut body: HashSet<BlockId> = HashSet::new();
            body.insert(header);
            let mut worklist: Vec<BlockId> = latches.clone();
            while let Some(b) = worklist.pop() {
                if !body.insert(b) {
                    continue;
                }
                for &pred in &func.get_block(b).unwrap().predecessors {
                    if self.reachable.contains(&pred) && !body.contains(&pred) {
                        worklist.push(pred);
                    }
                }
            }

            self.loops.push(NaturalLoop {
                header,
                latches,
                body,
            });
        }

        // Innermost first; nesting implies strictly larger bodies
        self.loops.sort_by_key(|l| l.body.len());
        for (i, l) in self.loops.iter().enumerate() {
            for &b in &l.body {
                self.loop_of.entry(b).or_insert(i);
            }
        }
    }

    /// Innermost loop containing a block
    pub fn loop_of(&self, b: BlockId) -> Option<usize> {
        self.loop_of.get(&b).copied()
    }

    /// Innermost loop strictly containing the given loop
    pub fn parent_of(&self, l: usize) -> Option<usize> {
        let header = self.loops[l].header;
        let size = self.loops[l].body.len();
        self.loops
            .iter()
            .enumerate()
            .filter(|(i, m)| *i != l && m.body.len() > size && m.body.contains(&header))
            .min_by_key(|(_, m)| m.body.len())
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_module;

    fn analyze(src: &str) -> (crate::ir::IrFunction, CfgInfo) {
        let module = parse_module("test.ir", src).unwrap();
        let func = module.functions.into_iter().next().unwrap();
        let cfg = CfgInfo::compute(&func).unwrap();
        (func, cfg)
    }

    #[test]
    fn test_diamond_dominators() {
        let src = r#"
            fn f(%c: i1) -> i32 {
            bb0:
              cbr %c, bb1, bb2
            bb1:
              %a: i32 = const 1
              br bb3
            bb2:
              %b: i32 = const 2
              br bb3
            bb3:
              %r: i32 = phi [bb1: %a], [bb2: %b]
              ret %r
            }
        "#;
        let (_, cfg) = analyze(src);
        assert_eq!(cfg.rpo.len(), 4);
        assert_eq!(cfg.rpo[0], BlockId(0));
        // The join block is dominated by the entry but by neither arm
        assert!(cfg.dominates(BlockId(0), BlockId(3)));
        assert!(!cfg.dominates(BlockId(1), BlockId(3)));
        assert!(!cfg.dominates(BlockId(2), BlockId(3)));
        assert!(cfg.loops.is_empty());
    }

    #[test]
    fn test_natural_loop_detection() {
        let src = r#"
            fn count(%n: i32) -> i32 {
            bb0:
              %c: i32 = const 0
              br bb1
            bb1:
              %i: i32 = phi [bb0: %c], [bb2: %i2]
              %t: i1 = lt %i, %n
              cbr %t, bb2, bb3
            bb2:
              %one: i32 = const 1
              %i2: i32 = add %i, %one
              br bb1
            bb3:
              ret %i
            }
        "#;
        let (_, cfg) = analyze(src);
        assert_eq!(cfg.loops.len(), 1);
        let l = &cfg.loops[0];
        assert_eq!(l.header, BlockId(1));
        assert_eq!(l.latches, vec![BlockId(2)]);
        assert!(l.body.contains(&BlockId(1)));
        assert!(l.body.contains(&BlockId(2)));
        assert!(!l.body.contains(&BlockId(0)));
        assert!(!l.body.contains(&BlockId(3)));
        assert!(cfg.is_back_edge(BlockId(2), BlockId(1)));
    }

    #[test]
    fn test_nested_loops() {
        let src = r#"
            fn nest(%n: i32) -> void {
            bb0:
              br bb1
            bb1:
              %z: i32 = const 0
              br bb2
            bb2:
              %t: i1 = lt %z, %n
              cbr %t, bb2, bb3
            bb3:
              %u: i1 = lt %z, %n
              cbr %u, bb1, bb4
            bb4:
              ret
            }
        "#;
        let (_, cfg) = analyze(src);
        assert_eq!(cfg.loops.len(), 2);
        // Innermost first
        assert_eq!(cfg.loops[0].header, BlockId(2));
        assert_eq!(cfg.loops[1].header, BlockId(1));
        assert_eq!(cfg.loop_of(BlockId(2)), Some(0));
        assert_eq!(cfg.loop_of(BlockId(3)), Some(1));
        assert_eq!(cfg.parent_of(0), Some(1));
        assert_eq!(cfg.parent_of(1), None);
    }

    #[test]
    fn test_irreducible_graph_is_rejected() {
        // Two blocks jumping into each other's middle with two entries
        let src = r#"
            fn bad(%c: i1) -> void {
            bb0:
              cbr %c, bb1, bb2
            bb1:
              br bb2
            bb2:
              br bb1
            bb3:
              ret
            }
        "#;
        let module = parse_module("test.ir", src).unwrap();
        let func = &module.functions[0];
        assert!(CfgInfo::compute(func).is_err());
    }

    #[test]
    fn test_unreachable_blocks_are_skipped() {
        let src = r#"
            fn f() -> i32 {
            bb0:
              %a: i32 = const 1
              ret %a
            bb1:
              %b: i32 = const 2
              ret %b
            }
        "#;
        let (_, cfg) = analyze(src);
        assert_eq!(cfg.rpo, vec![BlockId(0)]);
        assert!(!cfg.reachable.contains(&BlockId(1)));
    }
}
