//! Dependency ordering of the agents within one stage.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Result of sorting one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologicalOrder {
    /// Indices of runnable nodes, dependencies first.
    pub order: Vec<usize>,
    /// Indices of nodes found on a dependency cycle, in discovery order.
    pub cyclic: Vec<usize>,
}

/// Sort `(name, dependencies)` nodes so every node follows its dependencies.
///
/// Depth-first, three-colour. Dependency names that are not nodes of this
/// set are treated as already satisfied. A back-edge to a node still being
/// visited marks every node on the path from that node to the current one as
/// cyclic; cyclic nodes are left out of `order` and listed in `cyclic`.
/// Roots are visited in declaration order, so the result is deterministic.
pub fn topological_order<'a, I>(nodes: I) -> TopologicalOrder
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let nodes: Vec<(&str, &[String])> = nodes.into_iter().collect();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, (name, _)) in nodes.iter().enumerate() {
        index.entry(*name).or_insert(i);
    }

    let mut sorter = Sorter {
        marks: vec![Mark::Unvisited; nodes.len()],
        cyclic: vec![false; nodes.len()],
        path: Vec::new(),
        order: Vec::new(),
        cyclic_order: Vec::new(),
        nodes: &nodes,
        index: &index,
    };
    for i in 0..nodes.len() {
        if sorter.marks[i] == Mark::Unvisited {
            sorter.visit(i);
        }
    }

    TopologicalOrder {
        order: sorter.order,
        cyclic: sorter.cyclic_order,
    }
}

struct Sorter<'s, 'a> {
    nodes: &'s [(&'a str, &'a [String])],
    index: &'s HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    cyclic: Vec<bool>,
    path: Vec<usize>,
    order: Vec<usize>,
    cyclic_order: Vec<usize>,
}

impl Sorter<'_, '_> {
    fn visit(&mut self, node: usize) {
        self.marks[node] = Mark::Visiting;
        self.path.push(node);

        let deps = self.nodes[node].1;
        for dep in deps {
            let Some(&dep) = self.index.get(dep.as_str()) else {
                continue;
            };
            match self.marks[dep] {
                Mark::Unvisited => self.visit(dep),
                Mark::Visiting => self.mark_cycle(dep),
                Mark::Visited => {}
            }
        }

        self.path.pop();
        self.marks[node] = Mark::Visited;
        if !self.cyclic[node] {
            self.order.push(node);
        }
    }

    /// Mark every node on the current path from `start` onwards.
    fn mark_cycle(&mut self, start: usize) {
        let Some(pos) = self.path.iter().position(|&n| n == start) else {
            return;
        };
        for &n in &self.path[pos..] {
            if !self.cyclic[n] {
                self.cyclic[n] = true;
                self.cyclic_order.push(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort(nodes: &[(&str, Vec<&str>)]) -> (Vec<String>, Vec<String>) {
        let owned: Vec<(String, Vec<String>)> = nodes
            .iter()
            .map(|(n, d)| (n.to_string(), d.iter().map(|s| s.to_string()).collect()))
            .collect();
        let result = topological_order(owned.iter().map(|(n, d)| (n.as_str(), d.as_slice())));
        let names = |idx: &[usize]| idx.iter().map(|&i| owned[i].0.clone()).collect();
        (names(&result.order), names(&result.cyclic))
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_independent_nodes_keep_declaration_order() {
        let (order, cyclic) = sort(&[("a", vec![]), ("b", vec![]), ("c", vec![])]);
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(cyclic.is_empty());
    }

    #[test]
    fn test_dependencies_run_first() {
        let (order, cyclic) = sort(&[("report", vec!["extract", "score"]), ("score", vec!["extract"]), ("extract", vec![])]);
        assert_eq!(order, vec!["extract", "score", "report"]);
        assert!(cyclic.is_empty());
    }

    #[test]
    fn test_unknown_dependency_is_satisfied() {
        let (order, _) = sort(&[("b", vec!["from_earlier_stage"]), ("a", vec![])]);
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_cycle_is_skipped_and_reported() {
        let (order, cyclic) = sort(&[
            ("x", vec!["y"]),
            ("y", vec!["x"]),
            ("free", vec![]),
            ("after_free", vec!["free"]),
        ]);

        assert_eq!(order, vec!["free", "after_free"]);
        let mut cyclic = cyclic;
        cyclic.sort();
        assert_eq!(cyclic, vec!["x", "y"]);
    }

    #[test]
    fn test_self_dependency_is_cyclic() {
        let (order, cyclic) = sort(&[("loop", vec!["loop"]), ("ok", vec![])]);
        assert_eq!(order, vec!["ok"]);
        assert_eq!(cyclic, vec!["loop"]);
    }

    #[test]
    fn test_acyclic_nodes_outside_cycle_stay_ordered() {
        let (order, cyclic) = sort(&[
            ("c", vec!["b"]),
            ("p", vec!["q"]),
            ("b", vec!["a"]),
            ("q", vec!["p"]),
            ("a", vec![]),
        ]);

        assert_eq!(cyclic.len(), 2);
        assert_eq!(order.len(), 3);
        assert!(position(&order, "a") < position(&order, "b"));
        assert!(position(&order, "b") < position(&order, "c"));
    }
}
