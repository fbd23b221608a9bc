//! Pipeline builder with validation.
//!
//! Dependencies come from two places: explicit names on the [`StageSpec`] and
//! file hazards between stages. For each stage in declaration order, an input
//! file depends on its last earlier writer (read-after-write), and an output
//! file depends on its last earlier writer plus every reader since that
//! writer (write-after-write, write-after-read).

use super::{StageGraph, StageSpec};
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use crate::stages::Stage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Stage specifications in declaration order.
    stages: Vec<StageSpec>,
    /// Index into `stages` by name.
    index: HashMap<String, usize>,
    /// Last stage to write each file.
    last_writer: HashMap<String, String>,
    /// Stages that read each file since its last write.
    readers: HashMap<String, Vec<String>>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            index: HashMap::new(),
            last_writer: HashMap::new(),
            readers: HashMap::new(),
        }
    }

    /// Adds a stage with explicit dependencies on earlier stages.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (duplicate name, missing
    /// dependency, cycle).
    pub fn stage(
        mut self,
        runner: Arc<dyn Stage>,
        dependencies: &[&str],
    ) -> Result<Self, PipelineValidationError> {
        let spec = StageSpec::new(runner).with_dependencies(dependencies.iter().copied());
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Adds a fully specified stage.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_stage_spec(&mut self, mut spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.index.contains_key(&spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is declared twice",
                spec.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE",
                    format!("Duplicate stage name '{}'", spec.name),
                )
                .with_fix_hint("Every stage needs a unique name."),
            ));
        }

        for dep in &spec.dependencies {
            if !self.index.contains_key(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' depends on unknown stage '{}'",
                    spec.name, dep
                ))
                .with_stages(vec![spec.name.clone(), dep.clone()])
                .with_error_info(
                    ContractErrorInfo::new(
                        "CONTRACT-004-MISSING_DEP",
                        format!("Dependency '{dep}' not found"),
                    )
                    .with_fix_hint("Ensure the dependency is added before the stage that depends on it."),
                ));
            }
        }

        let derived = self.hazards(&spec);
        spec.dependencies.extend(derived);
        self.track_files(&spec);

        self.index.insert(spec.name.clone(), self.stages.len());
        self.stages.push(spec);

        self.detect_cycles()?;

        Ok(())
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        Ok(StageGraph::new(self.name, self.stages))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Dependencies implied by the files `spec` touches.
    fn hazards(&self, spec: &StageSpec) -> HashSet<String> {
        let mut deps = HashSet::new();

        for file in &spec.reads {
            if let Some(writer) = self.last_writer.get(file) {
                deps.insert(writer.clone());
            }
        }
        for file in &spec.writes {
            if let Some(writer) = self.last_writer.get(file) {
                deps.insert(writer.clone());
            }
            if let Some(readers) = self.readers.get(file) {
                deps.extend(readers.iter().cloned());
            }
        }

        deps.remove(&spec.name);
        deps
    }

    fn track_files(&mut self, spec: &StageSpec) {
        for file in &spec.reads {
            self.readers.entry(file.clone()).or_default().push(spec.name.clone());
        }
        for file in &spec.writes {
            self.last_writer.insert(file.clone(), spec.name.clone());
            self.readers.remove(file);
        }
    }

    /// Detects cycles in the dependency graph.
    fn detect_cycles(&self) -> Result<(), CycleDetectedError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for spec in &self.stages {
            if !visited.contains(&spec.name) {
                if let Some(cycle) = self.dfs_cycle(&spec.name, &mut visited, &mut rec_stack, &mut path) {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(spec) = self.index.get(node).map(|&i| &self.stages[i]) {
            for dep in &spec.dependencies {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let cycle_start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}
