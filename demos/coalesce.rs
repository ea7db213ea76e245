//! Shows coalescing at work: two adjacent 64-byte blocks are freed and a
//! 128-byte request is served from the merged run without growing the
//! program break.

use heapsim::Heap;

fn main() {
    let mut heap = Heap::new();

    let a = heap.allocate(64).expect("heap exhausted");
    let b = heap.allocate(64).expect("heap exhausted");
    println!("a at {}, b at {}", a.offset(), b.offset());

    let brk = heap.break_offset();

    heap.free(Some(a));
    heap.free(Some(b));

    let c = heap.allocate(128).expect("heap exhausted");
    println!("c ({} bytes) at {}", heap.payload(c).len(), c.offset());

    if c == a && heap.break_offset() == brk {
        println!("merged: 128 bytes reused a's address, break still {brk}");
    } else {
        println!(
            "not merged: break moved from {brk} to {}",
            heap.break_offset()
        );
    }
}
