//! Many handles on one device from many threads.

use std::collections::HashMap;
use std::thread;

use istack::{Capacity, DeviceConfig, DeviceHandle, StackDevice, INT_SIZE, IOC_SET_SIZE};

fn device(capacity: usize) -> StackDevice {
    StackDevice::new(&DeviceConfig::default().with_capacity(Capacity::new(capacity).unwrap()))
        .unwrap()
}

fn pop(handle: &DeviceHandle) -> Option<i32> {
    let mut buf = [0u8; INT_SIZE];
    match handle.read(&mut buf).unwrap() {
        0 => None,
        _ => Some(i32::from_ne_bytes(buf)),
    }
}

#[test]
fn test_concurrent_pushers_lose_nothing() {
    const THREADS: i32 = 8;
    const PER_THREAD: i32 = 500;
    let device = device((THREADS * PER_THREAD) as usize);

    thread::scope(|s| {
        for t in 0..THREADS {
            let device = device.clone();
            s.spawn(move || {
                let handle = device.open();
                for i in 0..PER_THREAD {
                    handle.write(&(t * PER_THREAD + i).to_ne_bytes()).unwrap();
                }
            });
        }
    });

    let handle = device.open();
    let mut seen = HashMap::new();
    while let Some(v) = pop(&handle) {
        *seen.entry(v).or_insert(0) += 1;
    }
    assert_eq!(seen.len(), (THREADS * PER_THREAD) as usize);
    assert!(seen.values().all(|&n| n == 1));
}

#[test]
fn test_resize_under_contention() {
    let device = device(32);

    thread::scope(|s| {
        for t in 0..4i32 {
            let device = device.clone();
            s.spawn(move || {
                let handle = device.open();
                for i in 0..2_000 {
                    let _ = handle.write(&(t * 10_000 + i).to_ne_bytes());
                    if i % 3 == 0 {
                        pop(&handle);
                    }
                }
            });
        }
        let device = device.clone();
        s.spawn(move || {
            let handle = device.open();
            for i in 0..500u32 {
                handle.ioctl(IOC_SET_SIZE, &(1 + i % 40).to_ne_bytes()).unwrap();
                let stats = device.stats();
                assert!(stats.count <= stats.capacity, "{:?}", stats);
            }
        });
    });

    let stats = device.stats();
    assert!(stats.count <= stats.capacity);
    assert_eq!(stats.open_handles, 0);
}
