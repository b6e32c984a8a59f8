// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn drives_a_future_to_completion() {
    let value = block_on(async { 21 * 2 }).unwrap();
    assert_eq!(value, 42);
}

#[test]
fn sequential_calls_on_one_thread_are_fine() {
    for i in 0..3 {
        assert_eq!(block_on(async move { i }).unwrap(), i);
    }
}

#[test]
fn drives_mpsc_sends_without_a_reactor_task() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<u32>(1);
    block_on(tx.send(5)).unwrap().unwrap();
    assert_eq!(rx.try_recv().unwrap(), 5);
}
