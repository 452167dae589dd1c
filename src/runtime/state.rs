use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::Value,
};
use std::sync::Arc;

pub const INITIAL_CAPACITY: usize = 2;

/// Top-level variables of one submission, indexed by slot.
#[derive(Clone, Debug)]
pub struct SubmissionRecord {
    names: Arc<[String]>,
    values: Vec<Option<Value>>,
}

impl SubmissionRecord {
    fn new(names: Arc<[String]>) -> Self {
        let values = vec![None; names.len()];
        Self { names, values }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Assigned slots, in declaration order.
    pub fn assigned(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names
            .iter()
            .zip(&self.values)
            .filter_map(|(name, value)| value.as_ref().map(|value| (name.as_str(), value)))
    }
}

#[derive(Clone, Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Record(SubmissionRecord),
}

/// Per-session table of submission records, indexed by ordinal - 1.
///
/// The table only grows; a slot stays empty when its submission was
/// accepted but never ran to `InitSubmission`.
#[derive(Clone, Debug)]
pub struct SubmissionState {
    slots: Vec<Slot>,
}

impl Default for SubmissionState {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl SubmissionState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Grows to hold at least `needed` records. Doubles at minimum; existing
    /// records keep their positions.
    pub fn ensure_len(&mut self, needed: usize) {
        let len = self.slots.len();
        if needed > len {
            let new_len = needed.max(len * 2);
            tracing::debug!(target: "runtime", from = len, to = new_len, "growing submission state");
            self.slots.resize(new_len, Slot::Empty);
        }
    }

    pub fn init_record(&mut self, index: usize, names: Arc<[String]>) {
        self.ensure_len(index + 1);
        self.slots[index] = Slot::Record(SubmissionRecord::new(names));
    }

    pub fn record(&self, index: usize) -> Option<&SubmissionRecord> {
        match self.slots.get(index) {
            Some(Slot::Record(record)) => Some(record),
            _ => None,
        }
    }

    pub fn load(&self, record: usize, slot: usize) -> RuntimeResult<Value> {
        let entry = self
            .record(record)
            .ok_or(RuntimeError::MissingSubmission { ordinal: record + 1 })?;
        match entry.values.get(slot) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(RuntimeError::UnassignedVariable {
                name: entry.names[slot].clone(),
            }),
            None => Err(RuntimeError::invalid(format!(
                "slot {slot} out of range for submission #{}",
                record + 1
            ))),
        }
    }

    pub fn store(&mut self, record: usize, slot: usize, value: Value) -> RuntimeResult<()> {
        let entry = match self.slots.get_mut(record) {
            Some(Slot::Record(entry)) => entry,
            _ => return Err(RuntimeError::MissingSubmission { ordinal: record + 1 }),
        };
        let target = entry.values.get_mut(slot).ok_or_else(|| {
            RuntimeError::invalid(format!(
                "slot {slot} out of range for submission #{}",
                record + 1
            ))
        })?;
        *target = Some(value);
        Ok(())
    }

    /// Every visible session variable with its current value. A name
    /// redeclared by a later submission shows the later value.
    pub fn variables(&self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = Vec::new();
        for slot in &self.slots {
            let Slot::Record(record) = slot else { continue };
            for (name, value) in record.assigned() {
                match out.iter_mut().find(|(existing, _)| existing == name) {
                    Some(entry) => entry.1 = value.clone(),
                    None => out.push((name.to_string(), value.clone())),
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Arc<[String]> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn growth_doubles_and_keeps_records() {
        let mut state = SubmissionState::default();
        assert_eq!(state.len(), 2);
        state.init_record(0, names(&["x"]));
        state.store(0, 0, Value::Int(7)).expect("store");

        state.ensure_len(3);
        assert_eq!(state.len(), 4);
        state.ensure_len(9);
        assert_eq!(state.len(), 9);
        state.ensure_len(4);
        assert_eq!(state.len(), 9);

        assert!(matches!(state.load(0, 0), Ok(Value::Int(7))));
    }

    #[test]
    fn unassigned_and_missing_are_distinct() {
        let mut state = SubmissionState::default();
        state.init_record(0, names(&["x"]));
        assert!(matches!(
            state.load(0, 0),
            Err(RuntimeError::UnassignedVariable { name }) if name == "x"
        ));
        assert!(matches!(
            state.load(1, 0),
            Err(RuntimeError::MissingSubmission { ordinal: 2 })
        ));
    }

    #[test]
    fn variables_prefer_later_submissions() {
        let mut state = SubmissionState::default();
        state.init_record(0, names(&["x", "y"]));
        state.store(0, 0, Value::Int(1)).expect("store");
        state.store(0, 1, Value::Int(2)).expect("store");
        state.init_record(1, names(&["x"]));
        state.store(1, 0, Value::Int(3)).expect("store");

        let vars: Vec<_> = state
            .variables()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        assert_eq!(vars, vec!["x=3", "y=2"]);
    }
}
