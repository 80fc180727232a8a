//! Instruction rewrite pass
//!
//! Walks one normalized function's body left to right with a
//! one-instruction lookahead and applies three symbolic rewrites:
//!
//! - **Call-target resolution**: a call operand is a unit-local numeric
//!   index, stale the moment modules are merged; it becomes the callee's
//!   symbolic name.
//! - **Allocation-site tagging**: a constant-push immediately stored into a
//!   heap-typed local whose page-table name is still unclaimed collapses
//!   into a deferred allocate, claimed once for the whole run.
//! - **Exception-raise tagging**: a constant-push of an exception id
//!   immediately followed by a throw collapses into a deferred raise.
//!
//! The pass consumes the original sequence and appends into a fresh one, so
//! a collapse never shifts indices under the scan. The three patterns
//! trigger on disjoint opcodes; position order is what matters.

use std::collections::HashMap;

use tracing::debug;

use crate::ir::{BuiltinFunction, CallTarget, Constant, Instr, ValueType};
use crate::table::TableOp;

use super::registry::AllocationRegistry;

/// Rewrite a function body into table ops
///
/// `index` maps unit-local function indices to names (all functions in the
/// unit, not just exports). `registry` is the run-wide allocation set.
pub fn rewrite(
    func: &BuiltinFunction,
    body: Vec<Instr>,
    index: &HashMap<u32, String>,
    registry: &mut AllocationRegistry,
) -> Vec<TableOp> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        let next = body.get(i + 1);

        // (a) call by unit-local index -> call by name
        if let Instr::Call {
            target: CallTarget::Index(k),
        } = &body[i]
        {
            if let Some(name) = index.get(k) {
                out.push(TableOp::CallNamed { name: name.clone() });
                i += 1;
                continue;
            }
            // Index outside the unit: leave untouched
        }

        // (b) const + store into a heap-typed local -> deferred allocate
        if let (Instr::Const { ty, .. }, Some(store)) = (&body[i], next) {
            if let Some((slot, tee)) = store.store_slot() {
                if let Some(op) = try_allocate(func, *ty, slot, tee, registry) {
                    out.push(op);
                    i += 2;
                    continue;
                }
            }
        }

        // (c) const exception id + throw -> deferred raise
        if let (
            Instr::Const {
                ty: ValueType::I32,
                value: Constant::Int(id),
            },
            Some(Instr::Throw { .. }),
        ) = (&body[i], next)
        {
            let descriptor = u32::try_from(*id)
                .ok()
                .and_then(|id| func.exception_by_id(id));
            if let Some(descriptor) = descriptor {
                out.push(TableOp::Raise {
                    constructor: descriptor.constructor.clone(),
                    message: descriptor.message.clone(),
                });
                i += 2;
                continue;
            }
            // Unknown id resolves to nothing; keep the pair as-is
        }

        out.push(TableOp::Plain(body[i].clone()));
        i += 1;
    }

    out
}

/// Attempt the allocation-site collapse for a const stored into `slot`
///
/// Returns `None` (pair stays untouched) unless the local is heap-typed,
/// a page-table name ends with the local's name (first match wins; the
/// frontend scopes page names by prefixing) and that name is unclaimed.
/// A claimed name means the page was already reserved earlier in the run
/// and the runtime store will simply reuse it.
fn try_allocate(
    func: &BuiltinFunction,
    ty: ValueType,
    slot: u32,
    tee: bool,
    registry: &mut AllocationRegistry,
) -> Option<TableOp> {
    let local = func.local_by_slot(slot)?;
    if !local.type_tag.map(|t| t.is_heap()).unwrap_or(false) {
        return None;
    }

    let page = func.pages.iter().find(|p| p.name.ends_with(&local.name))?;
    if !registry.claim(&page.name) {
        return None;
    }
    debug!(func = %func.name, page = %page.name, "claimed allocation page");

    Some(TableOp::Allocate {
        page: page.name.clone(),
        kind: page.kind.clone(),
        ty,
        local: slot,
        tee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ExceptionDescriptor, Local, Page, TypeTag};

    fn func_with(locals: Vec<Local>, pages: Vec<Page>) -> BuiltinFunction {
        BuiltinFunction {
            name: "at".to_string(),
            index: 2,
            params: vec![ValueType::F64],
            returns: vec![ValueType::F64],
            return_type: None,
            locals,
            body: vec![],
            data: vec![],
            exceptions: vec![ExceptionDescriptor {
                id: Some(3),
                constructor: "RangeError".to_string(),
                message: "out of bounds".to_string(),
            }],
            pages,
            table: false,
            constructor: false,
        }
    }

    fn local(index: u32, name: &str, tag: Option<TypeTag>) -> Local {
        Local {
            index,
            name: name.to_string(),
            ty: ValueType::F64,
            type_tag: tag,
        }
    }

    fn const_f64(v: f64) -> Instr {
        Instr::Const {
            ty: ValueType::F64,
            value: Constant::Float(v),
        }
    }

    fn const_i32(v: i64) -> Instr {
        Instr::Const {
            ty: ValueType::I32,
            value: Constant::Int(v),
        }
    }

    #[test]
    fn test_call_renaming() {
        let func = func_with(vec![], vec![]);
        let index = HashMap::from([(4u32, "f".to_string())]);
        let mut registry = AllocationRegistry::new();

        let body = vec![
            Instr::Call {
                target: CallTarget::Index(4),
            },
            Instr::Call {
                target: CallTarget::Index(9),
            },
        ];
        let out = rewrite(&func, body, &index, &mut registry);

        assert_eq!(
            out[0],
            TableOp::CallNamed {
                name: "f".to_string()
            }
        );
        // Index 9 is not in the batch: untouched
        assert_eq!(
            out[1],
            TableOp::Plain(Instr::Call {
                target: CallTarget::Index(9)
            })
        );
    }

    #[test]
    fn test_raise_collapsing_shrinks_by_one() {
        let func = func_with(vec![], vec![]);
        let mut registry = AllocationRegistry::new();

        let body = vec![
            Instr::LocalGet(0),
            const_i32(3),
            Instr::Throw { tag: 0 },
        ];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        assert_eq!(out.len(), 2);
        assert_eq!(
            out[1],
            TableOp::Raise {
                constructor: "RangeError".to_string(),
                message: "out of bounds".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_exception_id_left_untouched() {
        let func = func_with(vec![], vec![]);
        let mut registry = AllocationRegistry::new();

        let body = vec![const_i32(99), Instr::Throw { tag: 0 }];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], TableOp::Plain(const_i32(99)));
    }

    #[test]
    fn test_allocation_collapsing() {
        let func = func_with(
            vec![local(1, "s", Some(TypeTag::Array))],
            vec![Page {
                name: "arr_s".to_string(),
                kind: "Array".to_string(),
            }],
        );
        let mut registry = AllocationRegistry::new();

        let body = vec![const_f64(0.0), Instr::LocalSet(1)];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        assert_eq!(
            out,
            vec![TableOp::Allocate {
                page: "arr_s".to_string(),
                kind: "Array".to_string(),
                ty: ValueType::F64,
                local: 1,
                tee: false,
            }]
        );
        assert!(registry.is_claimed("arr_s"));
    }

    #[test]
    fn test_claimed_page_leaves_pair_untouched() {
        let func = func_with(
            vec![local(1, "s", Some(TypeTag::Array))],
            vec![Page {
                name: "arr_s".to_string(),
                kind: "Array".to_string(),
            }],
        );
        let mut registry = AllocationRegistry::new();
        registry.claim("arr_s");

        let body = vec![const_f64(0.0), Instr::LocalSet(1)];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        assert_eq!(
            out,
            vec![
                TableOp::Plain(const_f64(0.0)),
                TableOp::Plain(Instr::LocalSet(1)),
            ]
        );
    }

    #[test]
    fn test_non_heap_local_untouched() {
        let func = func_with(
            vec![local(0, "i", Some(TypeTag::Number))],
            vec![Page {
                name: "num_i".to_string(),
                kind: "Number".to_string(),
            }],
        );
        let mut registry = AllocationRegistry::new();

        let body = vec![const_f64(1.0), Instr::LocalSet(0)];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        assert_eq!(out.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tee_store_is_preserved_on_the_op() {
        let func = func_with(
            vec![local(2, "out", Some(TypeTag::ByteString))],
            vec![Page {
                name: "string/trim/out".to_string(),
                kind: "Bytestring".to_string(),
            }],
        );
        let mut registry = AllocationRegistry::new();

        let body = vec![const_i32(0), Instr::LocalTee(2)];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        match &out[0] {
            TableOp::Allocate { page, tee, ty, .. } => {
                // Suffix match against the scoped page name
                assert_eq!(page, "string/trim/out");
                assert!(*tee);
                assert_eq!(*ty, ValueType::I32);
            }
            other => panic!("expected allocate, got {other:?}"),
        }
    }

    #[test]
    fn test_first_suffix_match_wins() {
        let func = func_with(
            vec![local(0, "out", Some(TypeTag::String))],
            vec![
                Page {
                    name: "a/out".to_string(),
                    kind: "String".to_string(),
                },
                Page {
                    name: "b/out".to_string(),
                    kind: "String".to_string(),
                },
            ],
        );
        let mut registry = AllocationRegistry::new();

        let body = vec![const_f64(0.0), Instr::LocalSet(0)];
        let out = rewrite(&func, body, &HashMap::new(), &mut registry);

        match &out[0] {
            TableOp::Allocate { page, .. } => assert_eq!(page, "a/out"),
            other => panic!("expected allocate, got {other:?}"),
        }
        assert!(!registry.is_claimed("b/out"));
    }
}
