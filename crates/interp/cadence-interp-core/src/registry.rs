//! Per-object registry of tracked attributes.
//!
//! Each [`VariableBinding`] owns the attribute's live value, its sample history and
//! its policy flags. The registry drives the per-frame interpolation pass for one
//! object and answers whether that object can be retired from it.

use indexmap::IndexMap;
use tracing::debug;

use crate::config::InterpSettings;
use crate::error::{InterpError, InterpResult};
use crate::history::{NoteOutcome, SampleHistory};
use crate::policy::{interpolate, VarFlags};
use crate::value::Value;

#[derive(Clone, Debug)]
pub struct VariableBinding {
    name: String,
    live: Value,
    history: SampleHistory<Value>,
    flags: VarFlags,
    needs_interpolation: bool,
}

impl VariableBinding {
    fn new(name: &str, initial: Value, flags: VarFlags, settings: &InterpSettings) -> Self {
        Self {
            name: name.to_string(),
            live: initial,
            history: SampleHistory::with_capacity(settings.history_capacity),
            flags,
            needs_interpolation: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn live(&self) -> &Value {
        &self.live
    }

    #[inline]
    pub fn history(&self) -> &SampleHistory<Value> {
        &self.history
    }

    #[inline]
    pub fn flags(&self) -> VarFlags {
        self.flags
    }

    #[inline]
    pub fn needs_interpolation(&self) -> bool {
        self.needs_interpolation
    }

    fn check_kind(&self, value: &Value) -> InterpResult<()> {
        if self.live.kind() == value.kind() {
            Ok(())
        } else {
            Err(InterpError::KindMismatch {
                name: self.name.clone(),
                expected: self.live.kind(),
                actual: value.kind(),
            })
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VarRegistry {
    vars: IndexMap<String, VariableBinding>,
    settings: InterpSettings,
    /// Retention applied to every history (interpolation amount + extra history).
    retention: Option<f32>,
    last_query_time: Option<f32>,
}

impl VarRegistry {
    pub fn new(settings: InterpSettings) -> Self {
        Self {
            vars: IndexMap::new(),
            settings,
            retention: None,
            last_query_time: None,
        }
    }

    #[inline]
    pub fn settings(&self) -> &InterpSettings {
        &self.settings
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Bindings in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &VariableBinding> {
        self.vars.values()
    }

    pub fn get(&self, name: &str) -> Option<&VariableBinding> {
        self.vars.get(name)
    }

    /// Start tracking `name`. Re-adding an existing variable keeps it unless its
    /// auto-interpolate exclusion changed, in which case it is rebuilt.
    pub fn add_var(&mut self, name: &str, initial: Value, flags: VarFlags) {
        if let Some(existing) = self.vars.get(name) {
            if existing.flags.exclude_auto_interpolate == flags.exclude_auto_interpolate {
                return;
            }
            debug!(var = name, "rebuilding variable with new interpolation exclusion");
        }
        let mut binding = VariableBinding::new(name, initial, flags, &self.settings);
        binding.history.set_retention(self.retention);
        self.vars.insert(name.to_string(), binding);
    }

    pub fn remove_var(&mut self, name: &str) -> InterpResult<VariableBinding> {
        self.vars
            .shift_remove(name)
            .ok_or_else(|| InterpError::VariableNotFound { name: name.into() })
    }

    fn binding(&self, name: &str) -> InterpResult<&VariableBinding> {
        self.vars
            .get(name)
            .ok_or_else(|| InterpError::VariableNotFound { name: name.into() })
    }

    fn binding_mut(&mut self, name: &str) -> InterpResult<&mut VariableBinding> {
        self.vars
            .get_mut(name)
            .ok_or_else(|| InterpError::VariableNotFound { name: name.into() })
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.vars.get(name).map(|b| &b.live)
    }

    /// Overwrite the live value without recording a sample.
    pub fn set_value(&mut self, name: &str, value: Value) -> InterpResult<()> {
        let binding = self.binding_mut(name)?;
        binding.check_kind(&value)?;
        binding.live = value;
        Ok(())
    }

    pub fn history(&self, name: &str) -> Option<&SampleHistory<Value>> {
        self.vars.get(name).map(|b| &b.history)
    }

    pub fn history_mut(&mut self, name: &str) -> Option<&mut SampleHistory<Value>> {
        self.vars.get_mut(name).map(|b| &mut b.history)
    }

    pub fn flags(&self, name: &str) -> InterpResult<VarFlags> {
        self.binding(name).map(|b| b.flags)
    }

    pub fn set_flags(&mut self, name: &str, flags: VarFlags) -> InterpResult<()> {
        self.binding_mut(name)?.flags = flags;
        Ok(())
    }

    pub fn set_looping(&mut self, name: &str, looping: bool) -> InterpResult<()> {
        self.binding_mut(name)?.flags.looping = looping;
        Ok(())
    }

    /// Keep `amount` seconds of history (plus the configured extra) on every variable.
    pub fn set_interpolation_amount(&mut self, amount: f32) {
        let retention = Some(amount + self.settings.extra_history);
        self.retention = retention;
        for binding in self.vars.values_mut() {
            binding.history.set_retention(retention);
        }
    }

    /// Record an observed value for `name` and make it the live value.
    pub fn note_changed(
        &mut self,
        name: &str,
        now: f32,
        change_time: f32,
        value: Value,
        update_baseline: bool,
    ) -> InterpResult<NoteOutcome> {
        let binding = self.binding_mut(name)?;
        binding.check_kind(&value)?;
        let outcome = binding
            .history
            .note_changed(now, change_time, value.clone(), update_baseline);
        if outcome != NoteOutcome::Dropped {
            binding.live = value;
        }
        if outcome.needs_interpolation() {
            binding.needs_interpolation = true;
        }
        Ok(outcome)
    }

    /// Record the current live value of every auto-latched variable at `change_time`.
    /// Returns true when any history gained a new value.
    pub fn latch(&mut self, now: f32, change_time: f32, update_baseline: bool) -> bool {
        let mut changed = false;
        for binding in self.vars.values_mut() {
            if binding.flags.exclude_auto_latch {
                continue;
            }
            let outcome =
                binding
                    .history
                    .note_changed(now, change_time, binding.live.clone(), update_baseline);
            if outcome.needs_interpolation() {
                binding.needs_interpolation = true;
                changed = true;
            }
        }
        changed
    }

    /// Write the value at `query_time` into every live slot that still needs it.
    /// Returns true when nothing will change again until a new sample arrives.
    pub fn interpolate(&mut self, query_time: f32) -> bool {
        // Going back in time invalidates every retirement decision.
        if self.last_query_time.is_some_and(|last| query_time < last) {
            self.mark_all_dirty();
        }
        self.last_query_time = Some(query_time);

        let mut all_done = true;
        for binding in self.vars.values_mut() {
            if !binding.needs_interpolation || binding.flags.exclude_auto_interpolate {
                continue;
            }
            match interpolate(&binding.history, query_time, binding.flags, &self.settings) {
                Some(result) => {
                    binding.live = result.value;
                    if result.no_more_changes {
                        binding.needs_interpolation = false;
                    } else {
                        all_done = false;
                    }
                }
                None => binding.needs_interpolation = false,
            }
        }
        all_done
    }

    pub fn needs_interpolation(&self) -> bool {
        self.vars.values().any(|b| b.needs_interpolation)
    }

    pub fn mark_all_dirty(&mut self) {
        for binding in self.vars.values_mut() {
            binding.needs_interpolation = !binding.history.is_empty();
        }
    }

    /// Jump every variable to its newest sample and forget older ones.
    pub fn snap_to_latest(&mut self) {
        for binding in self.vars.values_mut() {
            if let Some(newest) = binding.history.newest() {
                binding.live = newest.value.clone();
            }
            binding.history.collapse_to_newest();
            binding.needs_interpolation = false;
        }
    }

    /// Put every live value back to its last authoritative sample. Histories are untouched.
    pub fn restore_to_last_networked(&mut self) {
        for binding in self.vars.values_mut() {
            if let Some(value) = binding.history.last_networked() {
                binding.live = value.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> VarRegistry {
        let mut r = VarRegistry::new(InterpSettings::default());
        r.add_var("x", Value::Float(0.0), VarFlags::linear());
        r
    }

    #[test]
    fn add_var_twice_keeps_history() {
        let mut r = registry();
        r.note_changed("x", 0.0, 0.0, Value::Float(1.0), true).unwrap();
        r.add_var("x", Value::Float(0.0), VarFlags::linear());
        assert_eq!(r.history("x").map(|h| h.len()), Some(1));

        let excluded = VarFlags {
            exclude_auto_interpolate: true,
            ..VarFlags::linear()
        };
        r.add_var("x", Value::Float(0.0), excluded);
        assert_eq!(r.history("x").map(|h| h.len()), Some(0));
    }

    #[test]
    fn remove_unknown_var_errors() {
        let mut r = registry();
        assert!(matches!(
            r.remove_var("nope"),
            Err(InterpError::VariableNotFound { .. })
        ));
        assert!(r.remove_var("x").is_ok());
        assert!(r.is_empty());
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut r = registry();
        let err = r
            .note_changed("x", 0.0, 0.0, Value::Int(3), true)
            .unwrap_err();
        assert!(matches!(err, InterpError::KindMismatch { .. }));
    }

    #[test]
    fn interpolation_retires_when_done() {
        let mut r = registry();
        r.note_changed("x", 0.0, 0.0, Value::Float(0.0), true).unwrap();
        r.note_changed("x", 0.0, 1.0, Value::Float(1.0), true).unwrap();
        assert!(!r.interpolate(0.5));
        assert_eq!(r.value("x"), Some(&Value::Float(0.5)));
        assert!(r.interpolate(1.5));
        assert!(!r.needs_interpolation());
        // rewinding marks everything again
        assert!(!r.interpolate(0.25));
        assert_eq!(r.value("x"), Some(&Value::Float(0.25)));
    }

    #[test]
    fn latch_records_live_values() {
        let mut r = registry();
        r.add_var(
            "skip",
            Value::Float(9.0),
            VarFlags {
                exclude_auto_latch: true,
                ..VarFlags::default()
            },
        );
        r.set_value("x", Value::Float(2.0)).unwrap();
        assert!(r.latch(0.0, 0.0, true));
        assert_eq!(r.history("x").map(|h| h.len()), Some(1));
        assert_eq!(r.history("skip").map(|h| h.len()), Some(0));
        // same value again: stored, but nothing new to interpolate
        assert!(!r.latch(0.1, 0.1, true));
    }

    #[test]
    fn restore_uses_baseline() {
        let mut r = registry();
        r.note_changed("x", 0.0, 0.0, Value::Float(1.0), true).unwrap();
        r.note_changed("x", 0.0, 0.1, Value::Float(5.0), false).unwrap();
        r.restore_to_last_networked();
        assert_eq!(r.value("x"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn snap_collapses_history() {
        let mut r = registry();
        r.note_changed("x", 0.0, 0.0, Value::Float(1.0), true).unwrap();
        r.note_changed("x", 0.0, 1.0, Value::Float(3.0), true).unwrap();
        r.set_value("x", Value::Float(2.0)).unwrap();
        r.snap_to_latest();
        assert_eq!(r.value("x"), Some(&Value::Float(3.0)));
        assert_eq!(r.history("x").map(|h| h.len()), Some(1));
    }
}
