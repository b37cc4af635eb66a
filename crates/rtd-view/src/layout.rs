//! Column/row layout for chain step DAGs.
//!
//! Every dependency edge points from a lower column to a higher column:
//! roots sit in column 0 and each step lands one column right of its
//! furthest dependency. Computed with Kahn's algorithm over a name-keyed
//! adjacency map, so a cycle surfaces as an error instead of unbounded
//! recursion.

use rtd_core::Step;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Position {
    pub column: usize,
    pub row: usize,
}

/// A `depends_on` reference to a step name that does not exist in the
/// same chain. Layout proceeds without the edge; the reference is
/// reported so callers can surface the data-integrity problem.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DanglingRef {
    pub step: String,
    pub missing: String,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub positions: HashMap<String, Position>,
    pub columns: usize,
    pub dangling: Vec<DanglingRef>,
}

impl Layout {
    pub fn position(&self, step: &str) -> Option<Position> {
        self.positions.get(step).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("cyclic dependency involving step '{step}'")]
    CyclicDependency { step: String },
}

/// Assigns each step a deterministic (column, row). Rows within a
/// column follow the input's stable order; ties are never reordered.
pub fn layout_steps(steps: &[Step]) -> Result<Layout, LayoutError> {
    let count = steps.len();
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(count);
    for (i, step) in steps.iter().enumerate() {
        index.entry(step.name.as_str()).or_insert(i);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut in_degree = vec![0usize; count];
    let mut dangling = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        for dep in &step.depends_on {
            match index.get(dep.as_str()) {
                Some(&d) => {
                    dependents[d].push(i);
                    in_degree[i] += 1;
                }
                None => dangling.push(DanglingRef {
                    step: step.name.clone(),
                    missing: dep.clone(),
                }),
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut column = vec![0usize; count];
    let mut processed = 0usize;
    while let Some(i) = queue.pop_front() {
        processed += 1;
        for &child in &dependents[i] {
            column[child] = column[child].max(column[i] + 1);
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if processed < count {
        // Deterministic: the first step in input order still waiting on
        // a dependency is part of (or downstream of) the cycle.
        let step = steps
            .iter()
            .enumerate()
            .find(|(i, _)| in_degree[*i] > 0)
            .map(|(_, s)| s.name.clone())
            .unwrap_or_default();
        return Err(LayoutError::CyclicDependency { step });
    }

    let mut rows: HashMap<usize, usize> = HashMap::new();
    let mut positions = HashMap::with_capacity(count);
    let mut columns = 0usize;
    for (i, step) in steps.iter().enumerate() {
        let col = column[i];
        let row = rows.entry(col).or_insert(0);
        positions.insert(
            step.name.clone(),
            Position {
                column: col,
                row: *row,
            },
        );
        *row += 1;
        columns = columns.max(col + 1);
    }

    Ok(Layout {
        positions,
        columns,
        dangling,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtd_core::Step;

    fn steps(spec: &[(&str, &[&str])]) -> Vec<Step> {
        spec.iter()
            .map(|(name, deps)| Step::named(name).with_deps(deps))
            .collect()
    }

    #[test]
    fn roots_sit_in_column_zero() {
        let layout = layout_steps(&steps(&[("a", &[]), ("b", &[])])).expect("layout");
        assert_eq!(layout.position("a"), Some(Position { column: 0, row: 0 }));
        assert_eq!(layout.position("b"), Some(Position { column: 0, row: 1 }));
        assert_eq!(layout.columns, 1);
    }

    #[test]
    fn every_edge_points_strictly_left_to_right() {
        let input = steps(&[
            ("fetch", &[]),
            ("scan", &["fetch"]),
            ("lint", &["fetch"]),
            ("summarize", &["scan", "lint"]),
            ("publish", &["summarize", "fetch"]),
        ]);
        let layout = layout_steps(&input).expect("layout");
        for step in &input {
            let pos = layout.position(&step.name).expect("positioned");
            for dep in &step.depends_on {
                let dep_pos = layout.position(dep).expect("dep positioned");
                assert!(
                    dep_pos.column < pos.column,
                    "{} (col {}) must be left of {} (col {})",
                    dep,
                    dep_pos.column,
                    step.name,
                    pos.column
                );
            }
        }
        // Longest dependency path wins the column.
        assert_eq!(layout.position("publish").map(|p| p.column), Some(3));
    }

    #[test]
    fn rows_follow_input_order_within_a_column() {
        let layout = layout_steps(&steps(&[
            ("root", &[]),
            ("z-first", &["root"]),
            ("a-second", &["root"]),
        ]))
        .expect("layout");
        assert_eq!(layout.position("z-first").map(|p| p.row), Some(0));
        assert_eq!(layout.position("a-second").map(|p| p.row), Some(1));
    }

    #[test]
    fn layout_is_deterministic_across_runs() {
        let input = steps(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
        ]);
        let first = layout_steps(&input).expect("layout");
        for _ in 0..10 {
            let again = layout_steps(&input).expect("layout");
            assert_eq!(first.positions, again.positions);
        }
    }

    #[test]
    fn two_step_cycle_is_an_error_not_a_hang() {
        let err = layout_steps(&steps(&[("a", &["b"]), ("b", &["a"])]))
            .expect_err("cycle must fail");
        assert_eq!(
            err,
            LayoutError::CyclicDependency {
                step: "a".to_string()
            }
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = layout_steps(&steps(&[("solo", &["solo"])])).expect_err("self-cycle");
        assert_eq!(
            err,
            LayoutError::CyclicDependency {
                step: "solo".to_string()
            }
        );
    }

    #[test]
    fn cycle_error_names_a_waiting_step_even_downstream() {
        // "tail" depends on the cycle but is not part of it.
        let err = layout_steps(&steps(&[
            ("tail", &["a"]),
            ("a", &["b"]),
            ("b", &["a"]),
        ]))
        .expect_err("cycle must fail");
        assert_eq!(
            err,
            LayoutError::CyclicDependency {
                step: "tail".to_string()
            }
        );
    }

    #[test]
    fn dangling_reference_is_skipped_but_reported() {
        let layout =
            layout_steps(&steps(&[("a", &[]), ("b", &["a", "ghost"])])).expect("layout");
        assert_eq!(layout.position("b").map(|p| p.column), Some(1));
        assert_eq!(
            layout.dangling,
            vec![DanglingRef {
                step: "b".to_string(),
                missing: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn empty_input_yields_empty_layout() {
        let layout = layout_steps(&[]).expect("layout");
        assert!(layout.positions.is_empty());
        assert_eq!(layout.columns, 0);
    }
}
