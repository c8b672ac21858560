//! Scripts run end to end against an in-process device.

use istack::error::errno;
use istack::{Capacity, DeviceConfig, StackDevice};
use istack_cli::script::run_script;
use istack_cli::stress::{self, StressConfig};

fn device(capacity: usize) -> StackDevice {
    StackDevice::new(&DeviceConfig::default().with_capacity(Capacity::new(capacity).unwrap()))
        .unwrap()
}

fn run(device: &StackDevice, script: &str) -> (Result<usize, istack_cli::CliError>, String) {
    let mut out = Vec::new();
    let result = run_script(device, script.as_bytes(), &mut out);
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn test_grow_keeps_everything() {
    let device = device(3);
    let (result, out) = run(
        &device,
        "push 1\npush 2\npush 3\nset-size 100\nunwind\npop\n",
    );
    result.unwrap();
    assert_eq!(out, "3\n2\n1\nNULL\n");
    assert_eq!(device.stats().capacity, 100);
}

#[test]
fn test_invalid_size_leaves_stack_alone() {
    let device = device(2);
    let (result, _) = run(&device, "push 5\nset-size 0\n");
    let err = result.unwrap_err();
    assert_eq!(err.errno(), errno::EINVAL);
    assert_eq!(err.to_string(), "line 2: size should be > 0");
    let stats = device.stats();
    assert_eq!((stats.count, stats.capacity), (1, 2));
}

#[test]
fn test_bad_int_reported() {
    let device = device(2);
    let (result, _) = run(&device, "push twelve\n");
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "line 1: bad int 'twelve'");
    assert_eq!(err.errno(), errno::EINVAL);
}

#[test]
fn test_scripts_share_one_device() {
    let device = device(4);
    run(&device, "push 7\npush 8\n").0.unwrap();
    let (result, out) = run(&device, "unwind\n");
    result.unwrap();
    assert_eq!(out, "8\n7\n");
}

#[test]
fn test_stress_many_threads() {
    let report = stress::run(&StressConfig {
        threads: 8,
        ops_per_thread: 2_000,
        resize_every: 20,
        seed: 3,
        capacity: Capacity::new(8).unwrap(),
    })
    .unwrap();
    assert!(report.passed, "{:?}", report);
    assert!(report.conserved);
}
