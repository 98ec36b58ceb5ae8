use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Errors returned when addressing parts or variables of a [`Model`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model part `{0}` does not exist")]
    UnknownPart(String),

    #[error("variable `{0}` has not been added to the model")]
    UnknownVariable(String),

    #[error("model part `{0}` already exists")]
    DuplicatePart(String),
}

/// A named set of scalar solution values.
///
/// Values are keyed by variable name. A variable that has been added to the
/// owning [`Model`] but never assigned on this part reads as `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelPart {
    name: String,
    values: BTreeMap<String, f64>,
    dofs: BTreeSet<String>,
    fixed: BTreeSet<String>,
}

impl ModelPart {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of `variable` on this part, `0.0` if never assigned.
    ///
    /// Unlike [`Model::value`] this does not check that the variable has been
    /// added to the model.
    #[must_use]
    pub fn value(&self, variable: &str) -> f64 {
        self.values.get(variable).copied().unwrap_or(0.0)
    }

    /// Returns the degrees of freedom registered on this part.
    pub fn dofs(&self) -> impl Iterator<Item = &str> {
        self.dofs.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_dof(&self, variable: &str) -> bool {
        self.dofs.contains(variable)
    }

    /// Returns whether `variable` is currently constrained on this part.
    #[must_use]
    pub fn is_fixed(&self, variable: &str) -> bool {
        self.fixed.contains(variable)
    }
}

/// The shared state hooks and solvers operate on.
///
/// A model has a root part, named after the analysis, and any number of
/// sub-parts addressed by name. Variables are added once for the whole model
/// and then carry a value on every part.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    root: ModelPart,
    sub_parts: BTreeMap<String, ModelPart>,
    variables: BTreeSet<String>,
}

impl Model {
    /// Creates a model whose root part is called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: ModelPart::new(name),
            sub_parts: BTreeMap::new(),
            variables: BTreeSet::new(),
        }
    }

    /// Returns the name of the root part.
    #[must_use]
    pub fn name(&self) -> &str {
        self.root.name()
    }

    #[must_use]
    pub fn root(&self) -> &ModelPart {
        &self.root
    }

    /// Creates an empty sub-part.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicatePart`] if `name` is already taken by the
    /// root or another sub-part.
    pub fn create_sub_part(&mut self, name: impl Into<String>) -> Result<(), ModelError> {
        let name = name.into();
        if name == self.root.name || self.sub_parts.contains_key(&name) {
            return Err(ModelError::DuplicatePart(name));
        }
        self.sub_parts.insert(name.clone(), ModelPart::new(name));
        Ok(())
    }

    /// Returns the part called `name`, which may be the root.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownPart`] if no part has that name.
    pub fn part(&self, name: &str) -> Result<&ModelPart, ModelError> {
        if name == self.root.name {
            return Ok(&self.root);
        }
        self.sub_parts
            .get(name)
            .ok_or_else(|| ModelError::UnknownPart(name.to_owned()))
    }

    fn part_mut(&mut self, name: &str) -> Result<&mut ModelPart, ModelError> {
        if name == self.root.name {
            return Ok(&mut self.root);
        }
        self.sub_parts
            .get_mut(name)
            .ok_or_else(|| ModelError::UnknownPart(name.to_owned()))
    }

    /// Returns the root followed by every sub-part in name order.
    pub fn parts(&self) -> impl Iterator<Item = &ModelPart> {
        std::iter::once(&self.root).chain(self.sub_parts.values())
    }

    fn parts_mut(&mut self) -> impl Iterator<Item = &mut ModelPart> {
        std::iter::once(&mut self.root).chain(self.sub_parts.values_mut())
    }

    /// Returns the names of all parts, root first.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts().map(ModelPart::name)
    }

    /// Adds a solution variable to the model. Adding it twice is harmless.
    pub fn add_variable(&mut self, variable: impl Into<String>) {
        self.variables.insert(variable.into());
    }

    #[must_use]
    pub fn has_variable(&self, variable: &str) -> bool {
        self.variables.contains(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    fn check_variable(&self, variable: &str) -> Result<(), ModelError> {
        if self.has_variable(variable) {
            Ok(())
        } else {
            Err(ModelError::UnknownVariable(variable.to_owned()))
        }
    }

    /// Reads `variable` on `part`.
    ///
    /// # Errors
    ///
    /// Returns an error if the part does not exist or the variable has not
    /// been added to the model.
    pub fn value(&self, part: &str, variable: &str) -> Result<f64, ModelError> {
        self.check_variable(variable)?;
        Ok(self.part(part)?.value(variable))
    }

    /// Assigns `variable` on `part`.
    ///
    /// # Errors
    ///
    /// Returns an error if the part does not exist or the variable has not
    /// been added to the model.
    pub fn set_value(&mut self, part: &str, variable: &str, value: f64) -> Result<(), ModelError> {
        self.check_variable(variable)?;
        self.part_mut(part)?
            .values
            .insert(variable.to_owned(), value);
        Ok(())
    }

    /// Registers `variable` as a degree of freedom on every part.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownVariable`] if the variable has not been
    /// added to the model.
    pub fn add_dof(&mut self, variable: &str) -> Result<(), ModelError> {
        self.check_variable(variable)?;
        for part in self.parts_mut() {
            part.dofs.insert(variable.to_owned());
        }
        Ok(())
    }

    /// Constrains `variable` on `part` so solvers leave it unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the part does not exist or the variable has not
    /// been added to the model.
    pub fn fix(&mut self, part: &str, variable: &str) -> Result<(), ModelError> {
        self.check_variable(variable)?;
        self.part_mut(part)?.fixed.insert(variable.to_owned());
        Ok(())
    }

    /// Releases a constraint set with [`fix`](Self::fix).
    ///
    /// # Errors
    ///
    /// Returns an error if the part does not exist or the variable has not
    /// been added to the model.
    pub fn free(&mut self, part: &str, variable: &str) -> Result<(), ModelError> {
        self.check_variable(variable)?;
        self.part_mut(part)?.fixed.remove(variable);
        Ok(())
    }
}
