//! Basic walkthrough: allocate a few blocks, write to them, resize one,
//! and free everything while watching the break and the free list totals.

use heapsim::Heap;

fn log_alloc(heap: &Heap, label: &str, ptr: heapsim::HeapPtr) {
    println!(
        "{label}: payload at offset {}, {} bytes (break = {}, free = {})",
        ptr.offset(),
        heap.payload(ptr).len(),
        heap.break_offset(),
        heap.free_bytes(),
    );
}

fn main() {
    let mut heap = Heap::new();

    let a = heap.allocate(100).expect("heap exhausted");
    log_alloc(&heap, "a", a);

    let b = heap.zero_allocate(10, 10).expect("heap exhausted");
    log_alloc(&heap, "b", b);
    assert!(heap.payload(b).iter().all(|&byte| byte == 0));

    heap.payload_mut(a)[..13].copy_from_slice(b"Heap Testing!");

    let a = heap.resize(Some(a), 400).expect("heap exhausted");
    log_alloc(&heap, "a resized", a);
    println!(
        "prefix survived the copy: {:?}",
        std::str::from_utf8(&heap.payload(a)[..13]),
    );

    heap.free(Some(a));
    heap.free(Some(b));
    heap.free(None); // null free is a no-op

    println!(
        "all freed: break = {}, free = {} bytes in one run",
        heap.break_offset(),
        heap.free_bytes(),
    );
}
