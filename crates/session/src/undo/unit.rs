use shelf_primitives::{DocumentContext, FieldChange, Record, RecordId};

/// Why records were removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
	/// Plain delete: asks for confirmation and cleans up linked files.
	Delete,
	/// Removal as the second half of a cut.
	Cut,
}

/// Observable effect of applying or reverting an undo unit.
///
/// Deltas are forwarded to the index and to event subscribers in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextDelta {
	Added(Vec<Record>),
	Removed(Vec<RecordId>),
	FieldChanged(FieldChange),
}

/// Self-contained, reversible edit.
///
/// Positions are captured at the time of the edit so reverting restores the
/// original record order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoUnit {
	/// Records inserted at the given positions, in insertion order.
	InsertRecords { records: Vec<(usize, Record)> },
	/// Records removed from the given positions, in removal order.
	RemoveRecords { records: Vec<(usize, Record)>, kind: DeleteKind },
	ChangeField(FieldChange),
	/// Several units undone and redone as one step.
	Compound { label: String, units: Vec<UndoUnit> },
}

impl UndoUnit {
	/// Short description used in logs and menus.
	pub fn label(&self) -> String {
		match self {
			Self::InsertRecords { records } => plural("insert", records.len()),
			Self::RemoveRecords { records, kind: DeleteKind::Delete } => plural("delete", records.len()),
			Self::RemoveRecords { records, kind: DeleteKind::Cut } => plural("cut", records.len()),
			Self::ChangeField(change) => format!("change {}", change.field),
			Self::Compound { label, .. } => label.clone(),
		}
	}

	/// Reverses this unit against `ctx`.
	pub fn revert(&self, ctx: &mut DocumentContext) -> Vec<ContextDelta> {
		match self {
			Self::InsertRecords { records } => {
				let ids = records.iter().rev().filter_map(|(_, record)| ctx.remove(record.id()).map(|_| record.id())).collect();
				vec![ContextDelta::Removed(ids)]
			}
			Self::RemoveRecords { records, .. } => {
				for (index, record) in records.iter().rev() {
					ctx.insert_at(*index, record.clone());
				}
				vec![ContextDelta::Added(records.iter().map(|(_, r)| r.clone()).collect())]
			}
			Self::ChangeField(change) => {
				let inverse = change.inverted();
				ctx.apply_field_change(&inverse);
				vec![ContextDelta::FieldChanged(inverse)]
			}
			Self::Compound { units, .. } => units.iter().rev().flat_map(|unit| unit.revert(ctx)).collect(),
		}
	}

	/// Re-applies this unit against `ctx`.
	pub fn reapply(&self, ctx: &mut DocumentContext) -> Vec<ContextDelta> {
		match self {
			Self::InsertRecords { records } => {
				for (index, record) in records {
					ctx.insert_at(*index, record.clone());
				}
				vec![ContextDelta::Added(records.iter().map(|(_, r)| r.clone()).collect())]
			}
			Self::RemoveRecords { records, .. } => {
				let ids = records.iter().filter_map(|(_, record)| ctx.remove(record.id()).map(|_| record.id())).collect();
				vec![ContextDelta::Removed(ids)]
			}
			Self::ChangeField(change) => {
				ctx.apply_field_change(change);
				vec![ContextDelta::FieldChanged(change.clone())]
			}
			Self::Compound { units, .. } => units.iter().flat_map(|unit| unit.reapply(ctx)).collect(),
		}
	}
}

fn plural(verb: &str, count: usize) -> String {
	if count == 1 { format!("{verb} entry") } else { format!("{verb} {count} entries") }
}
