//! System state module: snapshot histories for tracked components.

use crate::component::{ComponentKey, Matrix};
use crate::engine::SystemView;
use crate::error::{Result, TrecsError};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct TrackedVariable {
    name: String,
    key: ComponentKey,
    history: Vec<Matrix>,
}

/// Tracks components by key and keeps one deep copy per timestep.
///
/// Invariant: every history has `timestep + 1` entries, and the last entry
/// equals the live value of the component.
#[derive(Debug, Clone, Default)]
pub struct SystemStateModule {
    variables: Vec<TrackedVariable>,
}

impl SystemStateModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `key` under `name`, taking snapshot 0 from `view`.
    pub fn add_state_variable(
        &mut self,
        name: impl Into<String>,
        key: ComponentKey,
        view: &SystemView<'_>,
    ) -> Result<()> {
        let name = name.into();
        if view.timestep > 0 {
            return Err(TrecsError::usage_order(format!(
                "state variable '{}' registered at timestep {}",
                name, view.timestep
            )));
        }
        if self.variables.iter().any(|v| v.name == name) {
            return Err(TrecsError::DuplicateName(name));
        }

        let component = view
            .component(&key)
            .ok_or_else(|| TrecsError::UnknownComponent(key.to_string()))?;

        self.variables.push(TrackedVariable {
            name,
            history: vec![component.snapshot()],
            key,
        });
        Ok(())
    }

    /// Appends one snapshot per tracked variable.
    pub fn record(&mut self, view: &SystemView<'_>) -> Result<()> {
        for variable in &mut self.variables {
            let component = view
                .component(&variable.key)
                .ok_or_else(|| TrecsError::UnknownComponent(variable.key.to_string()))?;
            variable.history.push(component.snapshot());
        }
        Ok(())
    }

    /// Replaces the newest snapshot of every variable with the live value.
    pub fn refresh_last(&mut self, view: &SystemView<'_>) -> Result<()> {
        for variable in &mut self.variables {
            let component = view
                .component(&variable.key)
                .ok_or_else(|| TrecsError::UnknownComponent(variable.key.to_string()))?;
            if let Some(last) = variable.history.last_mut() {
                *last = component.snapshot();
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// History of one variable.
    pub fn history(&self, name: &str) -> Option<&[Matrix]> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.history.as_slice())
    }

    /// Name → ordered snapshot history for every tracked variable.
    pub fn get_system_state(&self) -> Result<BTreeMap<String, Vec<Matrix>>> {
        if self.variables.is_empty() {
            return Err(TrecsError::NoStateVariables);
        }
        Ok(self
            .variables
            .iter()
            .map(|v| (v.name.clone(), v.history.clone()))
            .collect())
    }

    /// Checks length alignment and that the last snapshot equals the live value.
    pub fn is_consistent(&self, view: &SystemView<'_>) -> bool {
        self.variables.iter().all(|v| {
            v.history.len() == view.timestep + 1
                && match (v.history.last(), view.component(&v.key)) {
                    (Some(last), Some(live)) => last == live.value(),
                    _ => false,
                }
        })
    }
}
