//! Interpreter micro-benchmarks, run with `cargo bench -p evm`.

use criterion::{criterion_group, criterion_main, Criterion};
use evm::{Factory, VMType};
use std::sync::Arc;
use vm::tests::FakeExt;
use vm::{ActionParams, Exec, Schedule};

fn run(code: &[u8], gas: u64) {
    let factory = Factory::new(VMType::Interpreter, 1024);
    let schedule = Schedule::new_cancun();
    let mut ext = FakeExt::new();
    let params = ActionParams {
        code: Some(Arc::new(code.to_vec())),
        gas: gas.into(),
        ..ActionParams::default()
    };
    let exec = factory.create(params, &schedule, 0);
    let _ = exec.exec(&mut ext);
}

fn bench_arithmetic(c: &mut Criterion) {
    // PUSH1 0 (acc=0); JUMPDEST; PUSH1 1 ADD (acc+=1); DUP1 PUSH2 1000 GT;
    // PUSH1 2 JUMPI (loop while acc<=1000); STOP.
    let code = hex_literal::hex!("60005b600101806103e81160025700");
    c.bench_function("arithmetic_loop", |b| b.iter(|| run(&code, 10_000_000)));
}

fn bench_sha3(c: &mut Criterion) {
    // PUSH1 32, PUSH1 0, SHA3, POP, STOP
    let code = hex_literal::hex!("60206000205000");
    c.bench_function("sha3_32_bytes", |b| b.iter(|| run(&code, 1_000_000)));
}

criterion_group!(benches, bench_arithmetic, bench_sha3);
criterion_main!(benches);
