//! Restore page order from results that arrive in completion order.
//!
//! Results are parked in a min-heap keyed by sequence number. Whenever the
//! smallest parked sequence is the next one expected, it is popped and its
//! lines are trimmed, run through the line filter and appended to the output
//! buffer. A failed page stops reassembly at that point: pages before it are
//! already in the buffer, nothing from it or any later page is.

use crate::error::PageError;
use crate::pipeline::PageResult;
use crate::rules::Filter;
use futures::{Stream, StreamExt};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::trace;

/// Heap entry ordered so that the lowest sequence number is on top.
struct Pending(PageResult);

impl Pending {
    fn sequence(&self) -> usize {
        self.0.request.sequence
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.sequence() == other.sequence()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other.sequence().cmp(&self.sequence())
    }
}

pub struct Reassembler<'f> {
    heap: BinaryHeap<Pending>,
    next: usize,
    output: Vec<u8>,
    filter: &'f Filter,
}

impl<'f> Reassembler<'f> {
    pub fn new(filter: &'f Filter) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next: 0,
            output: Vec::new(),
            filter,
        }
    }

    /// Accept one result and emit every page that is now in order.
    pub fn push(&mut self, result: PageResult) -> Result<(), PageError> {
        trace!(
            "Result for sequence {} arrived, expecting {}",
            result.request.sequence,
            self.next
        );
        self.heap.push(Pending(result));

        while self.heap.peek().is_some_and(|p| p.sequence() == self.next) {
            let Some(Pending(result)) = self.heap.pop() else {
                break;
            };
            let text = result.text?;
            self.emit(&text);
            self.next += 1;
        }
        Ok(())
    }

    /// Consume `results` to the end, stopping at the first failed page.
    pub async fn drain<S>(&mut self, results: S) -> Result<(), PageError>
    where
        S: Stream<Item = PageResult>,
    {
        let mut results = std::pin::pin!(results);
        while let Some(result) = results.next().await {
            self.push(result)?;
        }
        Ok(())
    }

    fn emit(&mut self, text: &[u8]) {
        for line in text.split_inclusive(|&b| b == b'\n') {
            let filtered = self.filter.apply(trim_line_end(line));
            self.output.extend_from_slice(&filtered);
            self.output.push(b'\n');
        }
    }

    /// Number of pages written to the output so far.
    pub fn emitted(&self) -> usize {
        self.next
    }

    /// Number of results parked waiting for an earlier page.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Take the output buffer.
    ///
    /// # Panics
    ///
    /// If results are still parked: every result that reached the heap must
    /// have been emitted by the time the stream ends.
    pub fn finish(self) -> Vec<u8> {
        assert!(
            self.heap.is_empty(),
            "reassembly ended with {} parked results, next expected sequence {}",
            self.heap.len(),
            self.next
        );
        self.output
    }
}

/// Strip the line terminator and any other trailing whitespace.
///
/// Only the valid UTF-8 tail after the last invalid byte is examined; an
/// invalid byte at the very end stops trimming.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let Some(tail) = line.utf8_chunks().last() else {
        return line;
    };
    if !tail.invalid().is_empty() {
        return line;
    }
    let valid = tail.valid();
    &line[..line.len() - valid.len() + valid.trim_end().len()]
}
