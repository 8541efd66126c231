use super::*;
use crate::symbol::{SymbolPayload, MALIGP2_CONSTANT_000, VIEWPORT_TRANSFORM};

// ============================================================================
// Helpers
// ============================================================================

fn stage_table(stage: StageFlags, specs: &[(&str, SymbolKind, u32, u32, Option<u32>)]) -> SymbolTable<'static> {
    let mut table = SymbolTable::new();
    for &(name, kind, entries, count, hint) in specs {
        let symbol = Symbol::new(name, kind, 4, entries, count, None)
            .unwrap()
            .with_address_hint(hint)
            .with_stages(stage);
        table.insert(symbol).unwrap();
    }
    table
}

fn vertex(specs: &[(&str, SymbolKind, u32, u32, Option<u32>)]) -> SymbolTable<'static> {
    stage_table(StageFlags::VERTEX, specs)
}

fn fragment(specs: &[(&str, SymbolKind, u32, u32, Option<u32>)]) -> SymbolTable<'static> {
    stage_table(StageFlags::FRAGMENT, specs)
}

// ============================================================================
// Merge tests
// ============================================================================

#[test]
fn test_attribute_wins_over_varying() {
    let vs = vertex(&[("X", SymbolKind::Varying, 4, 1, None)]);
    let fs = fragment(&[("X", SymbolKind::Attribute, 4, 1, None)]);

    let linked = link(&vs, &fs, None).unwrap();
    let symbol = linked.symbols.lookup("X").unwrap();
    assert_eq!(symbol.kind(), SymbolKind::Attribute);
    assert_eq!(symbol.stages(), StageFlags::VERTEX | StageFlags::FRAGMENT);
}

#[test]
fn test_attribute_wins_over_varying_reverse_order() {
    let vs = vertex(&[("X", SymbolKind::Attribute, 4, 1, None)]);
    let fs = fragment(&[("X", SymbolKind::Varying, 4, 1, None)]);

    let linked = link(&vs, &fs, None).unwrap();
    assert_eq!(linked.symbols.lookup("X").unwrap().kind(), SymbolKind::Attribute);
}

#[test]
fn test_shared_uniform_merges_stage_flags() {
    let vs = vertex(&[("uMvp", SymbolKind::Uniform, 4, 4, None)]);
    let fs = fragment(&[("uMvp", SymbolKind::Uniform, 4, 4, None)]);

    let linked = link(&vs, &fs, None).unwrap();
    assert_eq!(linked.symbols.len(), 1);
    assert_eq!(linked.symbols.lookup("uMvp").unwrap().stages(), StageFlags::VERTEX | StageFlags::FRAGMENT);
}

#[test]
fn test_uniform_footprint_mismatch_fails() {
    let vs = vertex(&[("uColor", SymbolKind::Uniform, 4, 1, None)]);
    let fs = fragment(&[("uColor", SymbolKind::Uniform, 3, 1, None)]);
    assert!(matches!(link(&vs, &fs, None), Err(Error::Link(_))));
}

#[test]
fn test_uniform_attribute_collision_fails() {
    let vs = vertex(&[("X", SymbolKind::Attribute, 4, 1, None)]);
    let fs = fragment(&[("X", SymbolKind::Uniform, 4, 1, None)]);
    assert!(matches!(link(&vs, &fs, None), Err(Error::Link(_))));
}

#[test]
fn test_unwritten_fragment_varying_fails() {
    let vs = vertex(&[("aPosition", SymbolKind::Attribute, 4, 1, None)]);
    let fs = fragment(&[("vColor", SymbolKind::Varying, 4, 1, None)]);
    assert!(matches!(link(&vs, &fs, None), Err(Error::Link(_))));
}

#[test]
fn test_fragment_only_uniform_is_added() {
    let vs = vertex(&[("aPosition", SymbolKind::Attribute, 4, 1, None)]);
    let fs = fragment(&[("uColor", SymbolKind::Uniform, 4, 1, None)]);

    let linked = link(&vs, &fs, None).unwrap();
    assert_eq!(linked.symbols.lookup("uColor").unwrap().stages(), StageFlags::FRAGMENT);
}

// ============================================================================
// Built-in tests
// ============================================================================

#[test]
fn test_builtins_deferred_without_viewport() {
    let vs = vertex(&[("aPosition", SymbolKind::Attribute, 4, 1, None)]);
    let fs = fragment(&[]);

    let linked = link(&vs, &fs, None).unwrap();
    assert!(!linked.builtins_ready);
    assert!(!linked.symbols.contains(VIEWPORT_TRANSFORM));
    assert!(!linked.symbols.contains(MALIGP2_CONSTANT_000));
}

#[test]
fn test_builtins_injected_with_viewport() {
    let vs = vertex(&[("aPosition", SymbolKind::Attribute, 4, 1, None)]);
    let fs = fragment(&[]);

    let linked = link(&vs, &fs, Some(&Viewport::from_size(800, 480))).unwrap();
    assert!(linked.builtins_ready);

    let transform = linked.symbols.lookup(VIEWPORT_TRANSFORM).unwrap();
    assert!(transform.is_physical());
    let values: &[f32] = bytemuck::cast_slice(transform.data().unwrap());
    assert_eq!(&values[..4], &[400.0, 240.0, 0.5, 1.0]);

    let constant = linked.symbols.lookup(MALIGP2_CONSTANT_000).unwrap();
    assert!(matches!(constant.payload(), SymbolPayload::Uniform(_)));
    assert!(linked.locations.uniforms.slot(MALIGP2_CONSTANT_000).unwrap().physical);
}

#[test]
fn test_declared_builtin_keeps_hint_and_gets_value() {
    let mut vs = vertex(&[]);
    vs.insert(Symbol::new(VIEWPORT_TRANSFORM, SymbolKind::Uniform, 4, 4, 2, None)
        .unwrap()
        .with_address_hint(Some(64))
        .with_stages(StageFlags::VERTEX)).unwrap();
    let fs = fragment(&[]);

    let linked = link(&vs, &fs, Some(&Viewport::from_size(2, 2))).unwrap();
    let transform = linked.symbols.lookup(VIEWPORT_TRANSFORM).unwrap();
    assert_eq!(transform.location(), Some(64));
    assert!(transform.is_physical());
    let values: &[f32] = bytemuck::cast_slice(transform.data().unwrap());
    assert_eq!(values, &[1.0, 1.0, 0.5, 1.0, 1.0, 1.0, 0.5, 0.0]);
}

#[test]
fn test_misdeclared_builtin_fails_even_without_viewport() {
    let vs = vertex(&[(VIEWPORT_TRANSFORM, SymbolKind::Uniform, 4, 1, None)]);
    let fs = fragment(&[]);
    assert!(matches!(link(&vs, &fs, None), Err(Error::Link(_))));
}

#[test]
fn test_inject_builtins_refreshes_values() {
    let mut table = vertex(&[]);
    inject_builtins(&mut table, &Viewport::from_size(10, 10)).unwrap();
    inject_builtins(&mut table, &Viewport::from_size(20, 10)).unwrap();

    assert_eq!(table.len(), 2);
    let values: &[f32] = bytemuck::cast_slice(table.lookup(VIEWPORT_TRANSFORM).unwrap().data().unwrap());
    assert_eq!(values[0], 10.0);
}

// ============================================================================
// Location tests
// ============================================================================

#[test]
fn test_uniform_offsets_are_vec4_aligned() {
    let vs = vertex(&[
        ("uScale", SymbolKind::Uniform, 1, 1, None),
        ("uMvp", SymbolKind::Uniform, 4, 4, None),
        ("uTint", SymbolKind::Uniform, 3, 1, None),
    ]);
    let linked = link(&vs, &fragment(&[]), None).unwrap();
    let layout = &linked.locations.uniforms;

    assert_eq!(layout.slot("uScale").unwrap().offset, 0);
    assert_eq!(layout.slot("uMvp").unwrap().offset, 16);
    assert_eq!(layout.slot("uTint").unwrap().offset, 80);
    assert_eq!(layout.size(), 96);
    assert_eq!(linked.symbols.lookup("uMvp").unwrap().location(), Some(16));
}

#[test]
fn test_uniform_hints_honoured_when_free() {
    let vs = vertex(&[
        ("uA", SymbolKind::Uniform, 4, 1, Some(32)),
        ("uB", SymbolKind::Uniform, 4, 1, None),
        ("uC", SymbolKind::Uniform, 4, 1, Some(32)),
        ("uD", SymbolKind::Uniform, 4, 1, Some(8)),
    ]);
    let linked = link(&vs, &fragment(&[]), None).unwrap();
    let layout = &linked.locations.uniforms;

    assert_eq!(layout.slot("uA").unwrap().offset, 32);
    // Conflicting and misaligned hints fall back to first fit
    assert_eq!(layout.slot("uB").unwrap().offset, 0);
    assert_eq!(layout.slot("uC").unwrap().offset, 16);
    assert_eq!(layout.slot("uD").unwrap().offset, 48);
    let offsets: Vec<u32> = layout.slots().iter().map(|slot| slot.offset).collect();
    assert_eq!(offsets, vec![0, 16, 32, 48]);
}

#[test]
fn test_uniform_hint_past_block_end_falls_back() {
    let vs = vertex(&[
        ("uEdge", SymbolKind::Uniform, 4, 1, Some(0xFFFF_FFF0)),
        ("uFar", SymbolKind::Uniform, 4, 1, Some(MAX_UNIFORM_BLOCK_SIZE)),
    ]);
    let linked = link(&vs, &fragment(&[]), None).unwrap();
    let layout = &linked.locations.uniforms;

    assert_eq!(layout.slot("uEdge").unwrap().offset, 0);
    assert_eq!(layout.slot("uFar").unwrap().offset, 16);
    assert_eq!(layout.size(), 32);
}

#[test]
fn test_uniform_block_overflow_fails() {
    let count = MAX_UNIFORM_BLOCK_SIZE / 16 + 1;
    let vs = vertex(&[("uBones", SymbolKind::Uniform, 4, count, None)]);
    assert!(matches!(link(&vs, &fragment(&[]), None), Err(Error::Link(_))));
}

#[test]
fn test_attribute_and_varying_slots() {
    let vs = vertex(&[
        ("aPosition", SymbolKind::Attribute, 4, 1, Some(2)),
        ("aColor", SymbolKind::Attribute, 4, 1, None),
        ("vColor", SymbolKind::Varying, 4, 1, None),
    ]);
    let fs = fragment(&[("vColor", SymbolKind::Varying, 4, 1, None)]);
    let linked = link(&vs, &fs, None).unwrap();

    assert_eq!(linked.symbols.lookup("aPosition").unwrap().location(), Some(2));
    assert_eq!(linked.symbols.lookup("aColor").unwrap().location(), Some(0));
    assert_eq!(linked.symbols.lookup("vColor").unwrap().location(), Some(0));
    assert_eq!(linked.locations.attribute_count, 2);
    assert_eq!(linked.locations.varying_count, 1);
}

#[test]
fn test_too_many_attributes_fails() {
    let names: Vec<String> = (0..=MAX_ATTRIBUTES).map(|i| format!("a{}", i)).collect();
    let specs: Vec<(&str, SymbolKind, u32, u32, Option<u32>)> = names.iter()
        .map(|name| (name.as_str(), SymbolKind::Attribute, 4, 1, None))
        .collect();
    let vs = vertex(&specs);
    assert!(matches!(link(&vs, &fragment(&[]), None), Err(Error::Link(_))));
}

#[test]
fn test_snapshot_places_values_at_offsets() {
    let mut vs = vertex(&[
        ("uA", SymbolKind::Uniform, 1, 1, None),
        ("uB", SymbolKind::Uniform, 1, 1, None),
    ]);
    vs.lookup_mut("uB").unwrap().write(0, &7.0f32.to_ne_bytes()).unwrap();
    let linked = link(&vs, &fragment(&[]), None).unwrap();

    let block = linked.locations.uniforms.snapshot(&linked.symbols);
    assert_eq!(block.len(), 32);
    assert_eq!(&block[16..20], &7.0f32.to_ne_bytes());
    assert_eq!(&block[0..4], &[0u8; 4]);
}
