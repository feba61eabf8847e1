// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::atomic::Atomic;
use crate::error::AlgorithmError;
use pib_values::OpKind;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
struct Catalog {
    operations: Vec<Atomic>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    Unresolved,
    InVisit,
    Resolved,
}

/// A parsed formula catalog with its derived sets and execution schedule.
pub struct Algorithm {
    /// Declaration order, synthesized required-input leaves appended.
    atomics: Vec<Atomic>,
    index: HashMap<String, usize>,
    /// Input names referenced by some `var` but defined by no atomic.
    pub required: BTreeSet<String>,
    /// Names of the atomics flagged as KPIs, in declaration order.
    pub kpis: Vec<String>,
    /// Every non-KPI name, required inputs included.
    pub non_kpis: HashSet<String>,
    schedule: Vec<usize>,
}

impl Algorithm {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AlgorithmError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_str(&raw)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, AlgorithmError> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;

        let mut atomics = Vec::with_capacity(catalog.operations.len());
        let mut index = HashMap::new();
        for atomic in catalog.operations {
            atomic.validate()?;
            if index.contains_key(&atomic.name) {
                return Err(AlgorithmError::DuplicateName(atomic.name));
            }
            index.insert(atomic.name.clone(), atomics.len());
            atomics.push(atomic);
        }

        let mut algorithm = Algorithm {
            atomics,
            index,
            required: BTreeSet::new(),
            kpis: Vec::new(),
            non_kpis: HashSet::new(),
            schedule: Vec::new(),
        };
        algorithm.derive_required_inputs();
        algorithm.topological_sort()?;

        debug!(
            atomics = algorithm.atomics.len(),
            kpis = algorithm.kpis.len(),
            required = algorithm.required.len(),
            scheduled = algorithm.schedule.len(),
            "parsed algorithm catalog"
        );
        Ok(algorithm)
    }

    /// Partition KPIs from intermediates and materialize a synthetic leaf
    /// atomic for every input reference the catalog does not define.
    fn derive_required_inputs(&mut self) {
        for atomic in &self.atomics {
            if atomic.is_kpi {
                self.kpis.push(atomic.name.clone());
            } else {
                self.non_kpis.insert(atomic.name.clone());
            }
        }

        let referenced: Vec<String> = self
            .atomics
            .iter()
            .flat_map(|a| a.var.iter().cloned())
            .collect();
        for name in referenced {
            if !self.index.contains_key(&name) {
                let leaf = Atomic::required_input(&name);
                self.index.insert(name.clone(), self.atomics.len());
                self.atomics.push(leaf);
                self.non_kpis.insert(name.clone());
                self.required.insert(name);
            }
        }
    }

    /// Depth-first tricolor topological sort; the post-order is the
    /// execution schedule with the synthetic leaves filtered out.
    /// Visiting roots in declaration order keeps independent siblings
    /// stable under catalog reordering.
    fn topological_sort(&mut self) -> Result<(), AlgorithmError> {
        let mut colors = vec![Color::Unresolved; self.atomics.len()];
        let mut order = Vec::with_capacity(self.atomics.len());
        for idx in 0..self.atomics.len() {
            if colors[idx] == Color::Unresolved {
                self.visit(idx, &mut colors, &mut order)?;
            }
        }
        self.schedule = order
            .into_iter()
            .filter(|&idx| !self.required.contains(&self.atomics[idx].name))
            .collect();
        Ok(())
    }

    fn visit(
        &self,
        idx: usize,
        colors: &mut [Color],
        order: &mut Vec<usize>,
    ) -> Result<(), AlgorithmError> {
        colors[idx] = Color::InVisit;
        for child_name in &self.atomics[idx].var {
            let child = self.index[child_name];
            match colors[child] {
                Color::InVisit => {
                    return Err(AlgorithmError::Cycle(child_name.clone()));
                }
                Color::Unresolved => self.visit(child, colors, order)?,
                Color::Resolved => {}
            }
        }
        colors[idx] = Color::Resolved;
        order.push(idx);
        Ok(())
    }

    pub fn atomic(&self, name: &str) -> Option<&Atomic> {
        self.index.get(name).map(|&idx| &self.atomics[idx])
    }

    /// The execution schedule: every atomic after all of its inputs.
    pub fn schedule(&self) -> impl Iterator<Item = &Atomic> {
        self.schedule.iter().map(|&idx| &self.atomics[idx])
    }

    pub fn schedule_len(&self) -> usize {
        self.schedule.len()
    }

    /// Longest run of multiplications above each atomic, for chain-budget
    /// diagnostics. Operations that leave the ciphertext domain anyway
    /// reset the count to zero.
    pub fn multiplicative_depths(&self) -> HashMap<String, usize> {
        let mut memo: HashMap<usize, usize> = HashMap::new();
        for idx in 0..self.atomics.len() {
            self.depth_of(idx, &mut memo);
        }
        memo.into_iter()
            .map(|(idx, depth)| (self.atomics[idx].name.clone(), depth))
            .collect()
    }

    fn depth_of(&self, idx: usize, memo: &mut HashMap<usize, usize>) -> usize {
        if let Some(&d) = memo.get(&idx) {
            return d;
        }
        let atomic = &self.atomics[idx];
        let mut deepest = 0;
        for child_name in &atomic.var {
            let child = self.index[child_name];
            let mut child_depth = self.depth_of(child, memo);
            if is_chain_barrier(self.atomics[child].op) {
                child_depth = 0;
            }
            deepest = deepest.max(child_depth);
        }
        let depth = match atomic.op {
            OpKind::Multiplication | OpKind::MultiplicationConst => deepest + 1,
            _ => deepest,
        };
        memo.insert(idx, depth);
        depth
    }
}

/// Operations that are offloaded under encryption and therefore restart
/// the multiplicative budget.
fn is_chain_barrier(op: OpKind) -> bool {
    matches!(
        op,
        OpKind::Division
            | OpKind::DivisionConstVar
            | OpKind::Power
            | OpKind::PowerBaseConst
            | OpKind::Squareroot
            | OpKind::Absolute
            | OpKind::Minima
            | OpKind::Maxima
            | OpKind::MinimaOverN
            | OpKind::MaximaOverN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
operations:
  - name: revenue_sum
    op: AdditionOverN
    var: [revenue]
    is_kpi: false
  - name: cost_sum
    op: AdditionOverN
    var: [cost]
    is_kpi: false
  - name: margin
    op: Subtraction
    var: [revenue_sum, cost_sum]
    is_kpi: true
  - name: margin_pct
    op: Division
    var: [margin, revenue_sum]
    is_kpi: true
"#;

    #[test]
    fn test_parse_and_derive_required() {
        let algorithm = Algorithm::from_str(SAMPLE).unwrap();
        let required: Vec<&String> = algorithm.required.iter().collect();
        assert_eq!(required, vec!["cost", "revenue"]);
        assert_eq!(algorithm.kpis, vec!["margin", "margin_pct"]);
        assert!(algorithm.non_kpis.contains("revenue_sum"));
        assert!(algorithm.non_kpis.contains("revenue"));
        assert!(!algorithm.non_kpis.contains("margin"));
        // Synthetic leaves resolve as atomics but are not scheduled.
        assert!(algorithm.atomic("revenue").is_some());
        assert_eq!(algorithm.schedule_len(), 4);
    }

    #[test]
    fn test_schedule_orders_dependencies_first() {
        let algorithm = Algorithm::from_str(SAMPLE).unwrap();
        let order: Vec<&str> = algorithm.schedule().map(|a| a.name.as_str()).collect();
        let position = |name: &str| order.iter().position(|&n| n == name).unwrap();
        for atomic in algorithm.schedule() {
            for input in &atomic.var {
                if !algorithm.required.contains(input) {
                    assert!(
                        position(input) < position(&atomic.name),
                        "{input} must be scheduled before {}",
                        atomic.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let cyclic = r#"
operations:
  - name: a
    op: Addition
    var: [b]
    is_kpi: false
  - name: b
    op: Addition
    var: [a]
    is_kpi: true
"#;
        assert!(matches!(
            Algorithm::from_str(cyclic),
            Err(AlgorithmError::Cycle(_))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let duplicated = r#"
operations:
  - name: a
    op: DefConst
    constant: 1.0
    is_kpi: false
  - name: a
    op: DefConst
    constant: 2.0
    is_kpi: false
"#;
        assert!(matches!(
            Algorithm::from_str(duplicated),
            Err(AlgorithmError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_unknown_op_rejected() {
        let unknown = r#"
operations:
  - name: a
    op: Frobnicate
    var: []
    is_kpi: false
"#;
        assert!(matches!(
            Algorithm::from_str(unknown),
            Err(AlgorithmError::Parse(_))
        ));
    }

    #[test]
    fn test_constant_rules_checked_at_parse() {
        let missing = r#"
operations:
  - name: a
    op: AdditionConst
    var: [x]
    is_kpi: false
"#;
        assert!(matches!(
            Algorithm::from_str(missing),
            Err(AlgorithmError::Schema { .. })
        ));

        let unused = r#"
operations:
  - name: a
    op: Addition
    var: [x, y]
    constant: 5.0
    is_kpi: false
"#;
        assert!(matches!(
            Algorithm::from_str(unused),
            Err(AlgorithmError::Schema { .. })
        ));
    }

    #[test]
    fn test_unknown_yaml_fields_ignored() {
        let extra = r#"
operations:
  - name: a
    op: DefConst
    constant: 1.5
    is_kpi: true
    comment: irrelevant annotation
"#;
        let algorithm = Algorithm::from_str(extra).unwrap();
        assert_eq!(algorithm.kpis, vec!["a"]);
    }

    #[test]
    fn test_multiplicative_depths_with_barriers() {
        let chained = r#"
operations:
  - name: doubled
    op: MultiplicationConst
    var: [x]
    constant: 2.0
    is_kpi: false
  - name: squared
    op: Multiplication
    var: [doubled, doubled]
    is_kpi: false
  - name: ratio
    op: Division
    var: [squared, x]
    is_kpi: false
  - name: rescaled
    op: MultiplicationConst
    var: [ratio]
    constant: 0.5
    is_kpi: true
"#;
        let algorithm = Algorithm::from_str(chained).unwrap();
        let depths = algorithm.multiplicative_depths();
        assert_eq!(depths["doubled"], 1);
        assert_eq!(depths["squared"], 2);
        assert_eq!(depths["ratio"], 2);
        // Division offloads, so the chain restarts below it.
        assert_eq!(depths["rescaled"], 1);
    }
}
