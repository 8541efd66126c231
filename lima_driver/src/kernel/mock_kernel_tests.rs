use super::*;

#[test]
fn test_allocations_get_page_aligned_addresses() {
    let mut kernel = MockKernel::new();
    let a = kernel.allocate_physical(10).unwrap();
    let b = kernel.allocate_physical(0x1001).unwrap();
    let c = kernel.allocate_physical(4).unwrap();

    assert_eq!(a.physical_address(), MOCK_PHYSICAL_BASE);
    assert_eq!(b.physical_address(), MOCK_PHYSICAL_BASE + 0x1000);
    assert_eq!(c.physical_address(), MOCK_PHYSICAL_BASE + 0x3000);
    assert_eq!(kernel.live_allocations, 3);
}

#[test]
fn test_allocation_limit() {
    let mut kernel = MockKernel::new();
    kernel.allocation_limit = Some(0);
    assert!(matches!(kernel.allocate_physical(4), Err(Error::Allocation(_))));
    assert_eq!(kernel.live_allocations, 0);
}

#[test]
fn test_memory_bounds() {
    let mut memory = MockMemory { physical: 0, bytes: vec![0; 4] };
    assert!(memory.write(2, &[1, 2, 3]).is_err());
    memory.write(2, &[1, 2]).unwrap();
    let mut out = [0u8; 2];
    memory.read(2, &mut out).unwrap();
    assert_eq!(out, [1, 2]);
    assert!(memory.read(3, &mut out).is_err());
}

#[test]
fn test_free_records_event() {
    let mut kernel = MockKernel::new();
    let memory = kernel.allocate_physical(4).unwrap();
    kernel.free_physical(memory);
    assert_eq!(kernel.live_allocations, 0);
    assert_eq!(kernel.events.last(), Some(&KernelEvent::Free { physical: MOCK_PHYSICAL_BASE }));
}
