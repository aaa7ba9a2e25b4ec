//! Property-based tests for the block allocator.
//!
//! Random sequences of allocations, frees and writes are replayed against a
//! fresh allocator and the block list is checked after every step.

use bufalloc::{Allocator, Block, Error, HEADER_SIZE};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    /// Frees the live block at this index (modulo the number of live blocks).
    Free(usize),
    /// Writes `len` bytes into the live block at this index.
    Write(usize, usize, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..40).prop_map(Op::Allocate),
        2 => any::<usize>().prop_map(Op::Free),
        1 => (any::<usize>(), 0usize..48, any::<u8>())
            .prop_map(|(index, len, byte)| Op::Write(index, len, byte)),
    ]
}

fn check_list(allocator: &Allocator) {
    let blocks = allocator.collect();

    assert_eq!(blocks[0].addr, 0, "list must start at 0");

    for pair in blocks.windows(2) {
        assert!(pair[0].addr < pair[1].addr, "addresses must increase: {blocks:?}");
        assert!(!(pair[0].free && pair[1].free), "adjacent free blocks: {blocks:?}");
        assert_eq!(pair[0].next, Some(pair[1].addr));
        assert_eq!(pair[1].prev, Some(pair[0].addr), "stale prev link: {blocks:?}");
        assert_eq!(allocator.align_up(pair[0].addr + HEADER_SIZE + pair[0].size), pair[1].addr);
    }

    let last = blocks[blocks.len() - 1];
    assert!(last.addr + HEADER_SIZE + last.size <= allocator.capacity());
    assert_eq!(last.next, None);

    for block in blocks.iter().filter(|block| block.free) {
        assert_eq!((block.addr + HEADER_SIZE + block.size) % allocator.chunk_size(), 0);
    }
}

fn run(allocator: &mut Allocator, ops: Vec<Op>) {
    let mut live: Vec<Block> = Vec::new();

    for op in ops {
        match op {
            Op::Allocate(size) => match allocator.allocate(size) {
                Ok(block) => {
                    assert_eq!(block.size, size);
                    live.push(block);
                }
                Err(Error::OutOfSpace { requested }) => {
                    assert_eq!(requested, size);
                    let blocks = allocator.collect();
                    assert!(blocks.iter().all(|block| !block.free || block.size < size));
                }
                Err(err) => panic!("unexpected error: {err}"),
            },
            Op::Free(index) if !live.is_empty() => {
                let block = live.remove(index % live.len());
                let merged = allocator.free(block).unwrap();

                assert!(merged.free);
                assert!(merged.size >= allocator.chunk_size() - HEADER_SIZE);
                assert!(allocator.read(&merged).unwrap().iter().all(|&byte| byte == 0));
            }
            Op::Write(index, len, byte) if !live.is_empty() => {
                let block = live[index % live.len()];
                let data = vec![byte; len];

                match allocator.write(&block, &data) {
                    Ok(()) => {
                        let payload = allocator.read(&block).unwrap();
                        assert_eq!(payload.len(), block.size);
                        assert_eq!(&payload[block.size - len..], &data[..]);
                    }
                    Err(Error::Overflow { len: got, size }) => {
                        assert_eq!((got, size), (len, block.size));
                        assert!(len > block.size);
                    }
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            _ => {}
        }

        check_list(allocator);
    }

    // Releasing everything always gives back the whole buffer.
    for block in live {
        allocator.free(block).unwrap();
        check_list(allocator);
    }

    let blocks = allocator.collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].size, allocator.capacity() - HEADER_SIZE);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any sequence of operations keeps the list well formed.
    #[test]
    fn list_stays_well_formed(ops in prop::collection::vec(op(), 0..60)) {
        let mut allocator = Allocator::new(64).unwrap();
        run(&mut allocator, ops);
    }

    /// Same thing on the largest buffer and other chunk sizes.
    #[test]
    fn other_geometries(
        chunk_size in prop::sample::select(vec![2usize, 4, 6, 8, 16]),
        ops in prop::collection::vec(op(), 0..60),
    ) {
        let capacity = bufalloc::MAX_CAPACITY / chunk_size * chunk_size;
        let mut allocator = Allocator::with_chunk_size(capacity, chunk_size).unwrap();
        run(&mut allocator, ops);
    }

    /// Overflowing writes never touch the payload.
    #[test]
    fn overflow_leaves_payload_unchanged(
        size in 0usize..30,
        extra in 1usize..8,
        byte in any::<u8>(),
    ) {
        let mut allocator = Allocator::new(64).unwrap();
        let block = allocator.allocate(size).unwrap();
        allocator.fill(&block, byte).unwrap();

        let data = vec![!byte; size + extra];
        let overflowing = matches!(allocator.write(&block, &data), Err(Error::Overflow { .. }));
        prop_assert!(overflowing);
        prop_assert!(allocator.read(&block).unwrap().iter().all(|&b| b == byte));
    }
}
