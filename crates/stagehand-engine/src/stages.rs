//! Stage computation: dependency levels of a flow's step graph.

use std::collections::{BTreeMap, BTreeSet};

use stagehand_types::id::StepName;
use stagehand_types::spec::FlowSpec;
use stagehand_types::SpecError;

/// Compute the minimum sequence of stages such that every step within a
/// stage is mutually independent and every dependency is satisfied by an
/// earlier stage.
///
/// Level assignment: repeatedly emit the set of steps with no unsatisfied
/// dependencies, then remove them from the graph. Stage order is total;
/// the order of steps *within* a stage carries no meaning (the emitted
/// order happens to be lexicographic).
///
/// # Errors
///
/// Returns [`SpecError::CyclicDependency`] when no ready set exists while
/// steps remain, meaning the dependency graph contains a directed cycle
/// (a self-dependency is the one-step case).
pub fn compute_stages(spec: &FlowSpec) -> Result<Vec<Vec<StepName>>, SpecError> {
    let mut remaining: BTreeMap<StepName, BTreeSet<StepName>> = spec
        .steps
        .keys()
        .map(|step| {
            let deps = spec
                .dependencies
                .get(step)
                .map(|deps| deps.iter().cloned().collect())
                .unwrap_or_default();
            (step.clone(), deps)
        })
        .collect();

    let mut stages = Vec::new();
    while !remaining.is_empty() {
        let ready: Vec<StepName> = remaining
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(step, _)| step.clone())
            .collect();

        if ready.is_empty() {
            return Err(SpecError::CyclicDependency);
        }

        for step in &ready {
            remaining.remove(step);
        }
        for deps in remaining.values_mut() {
            for step in &ready {
                deps.remove(step);
            }
        }
        stages.push(ready);
    }

    Ok(stages)
}
