//! Export normalizer
//!
//! Filters each compiled unit down to its exported, non-entry functions and
//! rewrites unit-relative metadata into self-contained form: data segment
//! indices become owned segments with function-relative offsets, exception
//! ids become resolved descriptors, and the name-keyed positional locals
//! map becomes a slot-ordered list.
//!
//! Resolution misses here are not errors: a stale data or exception index
//! points at metadata nothing will use, so the reference is dropped and the
//! function survives.

use std::collections::HashMap;

use tracing::debug;

use crate::ir::{BuiltinFunction, CompiledUnit, DataSegment, ExceptionDescriptor, FuncIr, Global, Local};

/// A unit reduced to what the rewrite pass needs
#[derive(Debug, Default)]
pub struct NormalizedUnit {
    /// Exported non-entry functions, normalized, in frontend order
    pub funcs: Vec<BuiltinFunction>,
    /// Unit globals in name order
    pub globals: Vec<Global>,
    /// Unit-local function index to name, over all functions (call
    /// operands may reference unexported helpers)
    pub index: HashMap<u32, String>,
}

/// Normalize one compiled unit
///
/// `entry` is the distinguished entry-point name excluded from the table.
pub fn normalize_unit(unit: CompiledUnit, entry: &str) -> NormalizedUnit {
    let CompiledUnit {
        funcs,
        globals,
        data,
        exceptions,
    } = unit;

    let index = funcs.iter().map(|f| (f.index, f.name.clone())).collect();

    let funcs = funcs
        .into_iter()
        .filter(|f| f.export && f.name != entry)
        .map(|f| normalize_function(f, &data, &exceptions))
        .collect();

    NormalizedUnit {
        funcs,
        globals: globals.into_values().collect(),
        index,
    }
}

fn normalize_function(
    func: FuncIr,
    unit_data: &[DataSegment],
    unit_exceptions: &[ExceptionDescriptor],
) -> BuiltinFunction {
    let data = resolve_data(&func, unit_data);
    let exceptions = resolve_exceptions(&func, unit_exceptions);

    // Invert the name-keyed positional map into slot order
    let mut locals: Vec<Local> = func
        .locals
        .into_iter()
        .map(|(name, decl)| Local {
            index: decl.index,
            name,
            ty: decl.ty,
            type_tag: decl.type_tag,
        })
        .collect();
    locals.sort_by_key(|l| l.index);

    BuiltinFunction {
        name: func.name,
        index: func.index,
        params: func.params,
        returns: func.returns,
        return_type: func.return_type,
        locals,
        body: func.body,
        data,
        exceptions,
        pages: func.pages,
        table: func.table,
        constructor: func.constructor,
    }
}

/// Materialize segment indices and rebase offsets against the function's
/// first referenced segment, so the segments stand alone
fn resolve_data(func: &FuncIr, unit_data: &[DataSegment]) -> Vec<DataSegment> {
    let mut segments: Vec<DataSegment> = func
        .data
        .iter()
        .filter_map(|&i| match unit_data.get(i as usize) {
            Some(segment) => Some(segment.clone()),
            None => {
                debug!(func = %func.name, segment = i, "dropping unmapped data segment");
                None
            }
        })
        .collect();

    let base = segments.first().and_then(|s| s.offset).unwrap_or(0);
    for segment in &mut segments {
        if let Some(offset) = segment.offset.as_mut() {
            *offset = offset.saturating_sub(base);
        }
    }
    segments
}

/// Resolve exception ids to descriptors, attaching the original id so the
/// rewrite pass can tag raises later; unresolvable ids are dropped
fn resolve_exceptions(
    func: &FuncIr,
    unit_exceptions: &[ExceptionDescriptor],
) -> Vec<ExceptionDescriptor> {
    func.exceptions
        .iter()
        .filter_map(|&id| match unit_exceptions.get(id as usize) {
            Some(descriptor) => Some(ExceptionDescriptor {
                id: Some(id),
                ..descriptor.clone()
            }),
            None => {
                debug!(func = %func.name, exception = id, "dropping unmapped exception id");
                None
            }
        })
        .collect()
}
