//! Deployment graph: resource declarations and the edges between them.
//!
//! A declaration depends on another either implicitly, by embedding one of its
//! computed attributes in a property, or explicitly through `depends_on`. The
//! graph rejects duplicate names as they are added and checks references,
//! exported attributes and acyclicity in [`DeploymentGraph::validate`].
//!
//! Key re-exports:
//! - [`DeploymentGraph`] - the complete set of declarations for one run
//! - [`Declaration`] - desired state of one resource

mod declaration;
mod error;
mod kind;

pub use declaration::{AttrRef, Declaration, LogicalName, Property};
pub use error::GraphError;
pub use kind::ResourceKind;

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentGraph {
    declarations: Vec<Declaration>,
    #[serde(skip)]
    index: HashMap<LogicalName, usize>,
}

impl DeploymentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration and returns its name for wiring dependents.
    ///
    /// Names are never merged: a second declaration with the same name is an
    /// error. Embedded policy documents are checked here.
    pub fn add(&mut self, declaration: Declaration) -> Result<LogicalName, GraphError> {
        let name = declaration.name().clone();
        if self.index.contains_key(&name) {
            return Err(GraphError::DuplicateName(name));
        }
        declaration.check_policies()?;

        tracing::debug!(
            name = %name,
            kind = %declaration.kind(),
            dependencies = declaration.dependencies().len(),
            "Declared resource"
        );

        self.index.insert(name.clone(), self.declarations.len());
        self.declarations.push(declaration);
        Ok(name)
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.index.get(name).map(|&i| &self.declarations[i])
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declarations in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Direct dependencies of `name`, implicit and explicit.
    pub fn dependencies(&self, name: &str) -> Result<Vec<&LogicalName>, GraphError> {
        self.get(name)
            .map(Declaration::dependencies)
            .ok_or_else(|| GraphError::UnknownDeclaration(name.to_string()))
    }

    /// Checks that every reference resolves to a declared, exported attribute
    /// and that the graph is acyclic.
    pub fn validate(&self) -> Result<(), GraphError> {
        for declaration in &self.declarations {
            for reference in declaration.references() {
                let target = self.get(reference.resource.as_str()).ok_or_else(|| {
                    GraphError::UndefinedDependency {
                        from: declaration.name().clone(),
                        missing: reference.resource.clone(),
                    }
                })?;
                if !target.kind().exports_attribute(&reference.attribute) {
                    return Err(GraphError::UnknownAttribute {
                        from: declaration.name().clone(),
                        resource: reference.resource.clone(),
                        attribute: reference.attribute.clone(),
                        kind: target.kind(),
                    });
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm; ties go to the earliest declared, so the order is
    /// deterministic. Every declaration comes after all of its dependencies.
    pub fn topological_order(&self) -> Result<Vec<&Declaration>, GraphError> {
        let edges = self.dependency_edges()?;
        let dependents = invert(&edges);

        let mut in_degree: Vec<usize> = edges.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.declarations.len());
        while let Some(next) = ready.pop_first() {
            order.push(&self.declarations[next]);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.declarations.len() {
            return Err(GraphError::Cycle(self.find_cycle(&edges, &in_degree)));
        }
        Ok(order)
    }

    /// Every declaration that depends on `name`, directly or transitively, in
    /// insertion order.
    pub fn dependents_transitive(&self, name: &str) -> Result<Vec<&LogicalName>, GraphError> {
        let start = *self
            .index
            .get(name)
            .ok_or_else(|| GraphError::UnknownDeclaration(name.to_string()))?;
        let dependents = invert(&self.dependency_edges()?);

        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &dependent in &dependents[current] {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        seen.remove(&start);

        Ok(seen
            .into_iter()
            .map(|i| self.declarations[i].name())
            .collect())
    }

    /// Whether `dependent` is ordered after `dependency` by some path of edges.
    pub fn requires(&self, dependent: &str, dependency: &str) -> Result<bool, GraphError> {
        Ok(self
            .dependents_transitive(dependency)?
            .iter()
            .any(|name| *name == dependent))
    }

    /// Declarations nothing depends on.
    pub fn sinks(&self) -> Result<Vec<&LogicalName>, GraphError> {
        let dependents = invert(&self.dependency_edges()?);
        Ok(dependents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_empty())
            .map(|(i, _)| self.declarations[i].name())
            .collect())
    }

    /// The stage every publicly invokable declaration leads to.
    ///
    /// Restricted to the public-surface kinds, the graph must have exactly one
    /// sink and it must be a stage. The graph is acyclic, so every surface
    /// declaration reaches some sink of the restricted graph; with one sink,
    /// all of them reach it.
    pub fn public_sink(&self) -> Result<&LogicalName, GraphError> {
        let dependents = invert(&self.dependency_edges()?);
        let is_surface = |i: usize| self.declarations[i].kind().is_public_surface();

        let surface: Vec<usize> = (0..self.declarations.len())
            .filter(|&i| is_surface(i))
            .collect();
        if surface.is_empty() {
            return Err(GraphError::PublicSurface(
                "no publicly invokable declarations".to_string(),
            ));
        }

        let sinks: Vec<&Declaration> = surface
            .iter()
            .filter(|&&i| !dependents[i].iter().any(|&d| is_surface(d)))
            .map(|&i| &self.declarations[i])
            .collect();

        match sinks.as_slice() {
            &[sink] if sink.kind() == ResourceKind::ApiStage => Ok(sink.name()),
            &[sink] => Err(GraphError::PublicSurface(format!(
                "{} is the only sink but is a {}, not a stage",
                sink.name(),
                sink.kind()
            ))),
            [] => Err(GraphError::PublicSurface("no sink".to_string())),
            many => Err(GraphError::PublicSurface(format!(
                "expected one stage sink, found {}",
                many.iter()
                    .map(|d| d.name().as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Dependency indices per declaration, deduplicated.
    fn dependency_edges(&self) -> Result<Vec<Vec<usize>>, GraphError> {
        self.declarations
            .iter()
            .map(|declaration| {
                declaration
                    .dependencies()
                    .into_iter()
                    .map(|dep| {
                        self.index.get(dep.as_str()).copied().ok_or_else(|| {
                            GraphError::UndefinedDependency {
                                from: declaration.name().clone(),
                                missing: dep.clone(),
                            }
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Walks dependency edges among the declarations Kahn's algorithm could
    /// not place. Each of those still has an unplaced dependency, so the walk
    /// must revisit a node; the revisited stretch is a cycle. Each name
    /// depends on the next.
    fn find_cycle(&self, edges: &[Vec<usize>], in_degree: &[usize]) -> Vec<LogicalName> {
        let Some(start) = in_degree.iter().position(|&d| d > 0) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = path.iter().position(|&i| i == current) {
                let mut cycle: Vec<LogicalName> = path[pos..]
                    .iter()
                    .map(|&i| self.declarations[i].name().clone())
                    .collect();
                cycle.push(self.declarations[current].name().clone());
                return cycle;
            }
            path.push(current);
            match edges[current].iter().find(|&&dep| in_degree[dep] > 0) {
                Some(&dep) => current = dep,
                None => return Vec::new(),
            }
        }
    }
}

fn invert(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut dependents = vec![Vec::new(); edges.len()];
    for (node, deps) in edges.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(node);
        }
    }
    dependents
}
