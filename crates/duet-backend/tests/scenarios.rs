//! End-to-end two-party scenarios over in-memory transports.

use duet_backend::{BackendError, Config, TwoPartyBackend};
use duet_comm::memory_transport_pair;
use duet_core::BitVec;
use duet_engine::{Operation, OutputRecipient, Protocol};
use duet_gmw::circuits;

async fn backend_pair() -> (TwoPartyBackend, TwoPartyBackend) {
    let (t0, t1) = memory_transport_pair();
    let (b0, b1) = tokio::join!(
        TwoPartyBackend::new(t0, Config::new(0)),
        TwoPartyBackend::new(t1, Config::new(1)),
    );
    (b0.unwrap(), b1.unwrap())
}

fn bits_of(value: u64, k: usize) -> Vec<BitVec> {
    (0..k).map(|j| BitVec::single(value >> j & 1 == 1)).collect()
}

fn value_of(bits: &[BitVec]) -> u64 {
    bits.iter()
        .enumerate()
        .map(|(j, b)| (b.get(0) as u64) << j)
        .sum()
}

/// Party 0 contributes `x`, party 1 contributes `y`; both learn `x + y`.
async fn addition_64(backend: TwoPartyBackend, x: u64, y: u64) -> u64 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();

    let (px, wx) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_64_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_64_input_gate_other(0, 1).unwrap())
    };
    let (py, wy) = if my_id == 1 {
        let (p, w) = factory.make_arithmetic_64_input_gate_my(1, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_64_input_gate_other(1, 1).unwrap())
    };

    let sum = factory.make_binary_gate(Operation::Add, &wx, &wy).unwrap();
    let output = factory
        .make_arithmetic_64_output_gate_my(OutputRecipient::Both, &sum)
        .unwrap();

    if let Some(p) = px {
        p.send(vec![x]).unwrap();
    }
    if let Some(p) = py {
        p.send(vec![y]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_addition_arithmetic_gmw_64() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(addition_64(b0, 7, 35), addition_64(b1, 7, 35));
    assert_eq!(r0, 42);
    assert_eq!(r1, 42);
}

/// Beaver multiplication, 32-bit.
async fn multiplication_32(backend: TwoPartyBackend, x: u32, y: u32) -> u32 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();

    let (px, wx) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_32_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_32_input_gate_other(0, 1).unwrap())
    };
    let (py, wy) = if my_id == 1 {
        let (p, w) = factory.make_arithmetic_32_input_gate_my(1, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_32_input_gate_other(1, 1).unwrap())
    };

    let product = factory.make_binary_gate(Operation::Mul, &wx, &wy).unwrap();
    let output = factory
        .make_arithmetic_32_output_gate_my(OutputRecipient::Both, &product)
        .unwrap();

    if let Some(p) = px {
        p.send(vec![x]).unwrap();
    }
    if let Some(p) = py {
        p.send(vec![y]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_multiplication_via_triples_32() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(
        multiplication_32(b0, 123_456, 789),
        multiplication_32(b1, 123_456, 789),
    );
    assert_eq!(r0, 97_406_784);
    assert_eq!(r1, 97_406_784);
}

/// Boolean AND of one wire with eight SIMD lanes.
async fn boolean_and_simd8(backend: TwoPartyBackend, x: u8, y: u8) -> u8 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::BooleanGmw).unwrap();

    let (px, wx) = if my_id == 0 {
        let (p, w) = factory.make_boolean_input_gate_my(0, 1, 8).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_boolean_input_gate_other(0, 1, 8).unwrap())
    };
    let (py, wy) = if my_id == 1 {
        let (p, w) = factory.make_boolean_input_gate_my(1, 1, 8).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_boolean_input_gate_other(1, 1, 8).unwrap())
    };

    let and = factory.make_binary_gate(Operation::And, &wx, &wy).unwrap();
    let output = factory
        .make_boolean_output_gate_my(OutputRecipient::Both, &and)
        .unwrap();

    if let Some(p) = px {
        p.send(vec![BitVec::from_bytes(vec![x], 8)]).unwrap();
    }
    if let Some(p) = py {
        p.send(vec![BitVec::from_bytes(vec![y], 8)]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0].as_bytes()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_boolean_and_simd_8() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(
        boolean_and_simd8(b0, 0b1100_1010, 0b1010_1111),
        boolean_and_simd8(b1, 0b1100_1010, 0b1010_1111),
    );
    assert_eq!(r0, 0b1000_1010);
    assert_eq!(r1, 0b1000_1010);
}

/// Input-then-output round trip for every arithmetic width and boolean.
macro_rules! roundtrip_scenario {
    ($name:ident, $input_my:ident, $input_other:ident, $output_my:ident, $ty:ty) => {
        async fn $name(backend: TwoPartyBackend, value: $ty, num_simd: usize) -> Vec<$ty> {
            let my_id = backend.my_id();
            let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();
            let (promise, wire) = if my_id == 0 {
                let (p, w) = factory.$input_my(0, num_simd).unwrap();
                (Some(p), w)
            } else {
                (None, factory.$input_other(0, num_simd).unwrap())
            };
            let output = factory
                .$output_my(OutputRecipient::Both, &wire)
                .unwrap();
            if let Some(p) = promise {
                p.send(vec![value; num_simd]).unwrap();
            }
            backend.run().await.unwrap();
            output.await.unwrap()
        }
    };
}

roundtrip_scenario!(
    roundtrip_8,
    make_arithmetic_8_input_gate_my,
    make_arithmetic_8_input_gate_other,
    make_arithmetic_8_output_gate_my,
    u8
);
roundtrip_scenario!(
    roundtrip_16,
    make_arithmetic_16_input_gate_my,
    make_arithmetic_16_input_gate_other,
    make_arithmetic_16_output_gate_my,
    u16
);
roundtrip_scenario!(
    roundtrip_32,
    make_arithmetic_32_input_gate_my,
    make_arithmetic_32_input_gate_other,
    make_arithmetic_32_output_gate_my,
    u32
);
roundtrip_scenario!(
    roundtrip_64,
    make_arithmetic_64_input_gate_my,
    make_arithmetic_64_input_gate_other,
    make_arithmetic_64_output_gate_my,
    u64
);

#[tokio::test(flavor = "multi_thread")]
async fn test_input_output_roundtrip_all_widths() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(roundtrip_8(b0, 0xab, 4), roundtrip_8(b1, 0xab, 4));
    assert_eq!(r0, vec![0xab; 4]);
    assert_eq!(r1, vec![0xab; 4]);

    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(roundtrip_16(b0, 0xbeef, 1), roundtrip_16(b1, 0xbeef, 1));
    assert_eq!(r0, vec![0xbeef]);
    assert_eq!(r1, vec![0xbeef]);

    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(
        roundtrip_32(b0, 0xdead_beef, 2),
        roundtrip_32(b1, 0xdead_beef, 2)
    );
    assert_eq!(r0, vec![0xdead_beef; 2]);
    assert_eq!(r1, vec![0xdead_beef; 2]);

    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(
        roundtrip_64(b0, u64::MAX - 1, 1),
        roundtrip_64(b1, u64::MAX - 1, 1)
    );
    assert_eq!(r0, vec![u64::MAX - 1]);
    assert_eq!(r1, vec![u64::MAX - 1]);
}

async fn boolean_roundtrip(backend: TwoPartyBackend, value: u64) -> u64 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::BooleanGmw).unwrap();
    let (promise, wires) = if my_id == 1 {
        let (p, w) = factory.make_boolean_input_gate_my(1, 16, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_boolean_input_gate_other(1, 16, 1).unwrap())
    };
    let output = factory
        .make_boolean_output_gate_my(OutputRecipient::Both, &wires)
        .unwrap();
    if let Some(p) = promise {
        p.send(bits_of(value, 16)).unwrap();
    }
    backend.run().await.unwrap();
    value_of(&output.await.unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_boolean_input_output_roundtrip() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(boolean_roundtrip(b0, 0x1234), boolean_roundtrip(b1, 0x1234));
    assert_eq!(r0, 0x1234);
    assert_eq!(r1, 0x1234);
}

/// `x + (-x)` reconstructs to zero.
async fn add_neg_zero(backend: TwoPartyBackend, value: u64) -> u64 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();
    let (promise, wire) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_64_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_64_input_gate_other(0, 1).unwrap())
    };
    let negated = factory.make_unary_gate(Operation::Neg, &wire).unwrap();
    let sum = factory
        .make_binary_gate(Operation::Add, &wire, &negated)
        .unwrap();
    let output = factory
        .make_arithmetic_64_output_gate_my(OutputRecipient::Both, &sum)
        .unwrap();
    if let Some(p) = promise {
        p.send(vec![value]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_neg_reconstructs_zero() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(add_neg_zero(b0, 0x0123_4567_89ab_cdef), add_neg_zero(b1, 0));
    assert_eq!(r0, 0);
    assert_eq!(r1, 0);
}

/// Squaring via square pairs.
async fn square_32(backend: TwoPartyBackend, value: u32) -> u32 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();
    let (promise, wire) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_32_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_32_input_gate_other(0, 1).unwrap())
    };
    let squared = factory.make_unary_gate(Operation::Sqr, &wire).unwrap();
    let output = factory
        .make_arithmetic_32_output_gate_my(OutputRecipient::Both, &squared)
        .unwrap();
    if let Some(p) = promise {
        p.send(vec![value]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_square_via_square_pairs() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(square_32(b0, 12_345), square_32(b1, 12_345));
    assert_eq!(r0, 12_345u32.wrapping_mul(12_345));
    assert_eq!(r1, r0);
}

/// Boolean→arithmetic conversion of a 16-bit value.
async fn b2a_16(backend: TwoPartyBackend, value: u64) -> u16 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::BooleanGmw).unwrap();
    let (promise, wires) = if my_id == 0 {
        let (p, w) = factory.make_boolean_input_gate_my(0, 16, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_boolean_input_gate_other(0, 16, 1).unwrap())
    };
    let arith = factory.convert(Protocol::ArithmeticGmw, &wires).unwrap();
    let output = factory
        .make_arithmetic_16_output_gate_my(OutputRecipient::Both, &arith)
        .unwrap();
    if let Some(p) = promise {
        p.send(bits_of(value, 16)).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_boolean_to_arithmetic_conversion() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(b2a_16(b0, 0xbeef), b2a_16(b1, 0xbeef));
    assert_eq!(r0, 0xbeef);
    assert_eq!(r1, 0xbeef);
}

/// Arithmetic→boolean→arithmetic round trip.
async fn a2b2a_16(backend: TwoPartyBackend, value: u16) -> u16 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();
    let (promise, wire) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_16_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_16_input_gate_other(0, 1).unwrap())
    };
    let boolean = factory.convert(Protocol::BooleanGmw, &wire).unwrap();
    assert_eq!(boolean.len(), 16);
    let back = factory.convert(Protocol::ArithmeticGmw, &boolean).unwrap();
    let output = factory
        .make_arithmetic_16_output_gate_my(OutputRecipient::Both, &back)
        .unwrap();
    if let Some(p) = promise {
        p.send(vec![value]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_conversion_roundtrip() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(a2b2a_16(b0, 0xbeef), a2b2a_16(b1, 0xbeef));
    assert_eq!(r0, 0xbeef);
    assert_eq!(r1, 0xbeef);
}

/// max(x+y, y+z, x+z) via two greater-than/multiplex stages in the boolean
/// domain, with arithmetic additions and conversions on either side.
async fn gt_mux_max(backend: TwoPartyBackend, x: u64, y: u64, z: u64) -> u64 {
    let my_id = backend.my_id();
    let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();

    // Party 0 contributes x and z, party 1 contributes y.
    let (px, wx) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_64_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_64_input_gate_other(0, 1).unwrap())
    };
    let (py, wy) = if my_id == 1 {
        let (p, w) = factory.make_arithmetic_64_input_gate_my(1, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_64_input_gate_other(1, 1).unwrap())
    };
    let (pz, wz) = if my_id == 0 {
        let (p, w) = factory.make_arithmetic_64_input_gate_my(0, 1).unwrap();
        (Some(p), w)
    } else {
        (None, factory.make_arithmetic_64_input_gate_other(0, 1).unwrap())
    };

    let s1 = factory.make_binary_gate(Operation::Add, &wx, &wy).unwrap();
    let s2 = factory.make_binary_gate(Operation::Add, &wy, &wz).unwrap();
    let s3 = factory.make_binary_gate(Operation::Add, &wx, &wz).unwrap();

    let b1 = factory.convert(Protocol::BooleanGmw, &s1).unwrap();
    let b2 = factory.convert(Protocol::BooleanGmw, &s2).unwrap();
    let b3 = factory.convert(Protocol::BooleanGmw, &s3).unwrap();

    let gt = circuits::greater_than(factory, &b1, &b2).unwrap();
    let m1 = circuits::multiplex(factory, &gt, &b1, &b2).unwrap();
    let gt = circuits::greater_than(factory, &m1, &b3).unwrap();
    let m2 = circuits::multiplex(factory, &gt, &m1, &b3).unwrap();

    let result = factory.convert(Protocol::ArithmeticGmw, &m2).unwrap();
    let output = factory
        .make_arithmetic_64_output_gate_my(OutputRecipient::Both, &result)
        .unwrap();

    if let Some(p) = px {
        p.send(vec![x]).unwrap();
    }
    if let Some(p) = py {
        p.send(vec![y]).unwrap();
    }
    if let Some(p) = pz {
        p.send(vec![z]).unwrap();
    }
    backend.run().await.unwrap();
    output.await.unwrap()[0]
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gt_mux_composite() {
    let (b0, b1) = backend_pair().await;
    let (r0, r1) = tokio::join!(gt_mux_max(b0, 10, 25, 7), gt_mux_max(b1, 10, 25, 7));
    assert_eq!(r0, 35);
    assert_eq!(r1, 35);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sync_between_setup_and_online() {
    let (t0, t1) = memory_transport_pair();
    let mut cfg0 = Config::new(0);
    cfg0.sync_between_setup_and_online = true;
    let mut cfg1 = Config::new(1);
    cfg1.sync_between_setup_and_online = true;
    let (b0, b1) = tokio::join!(TwoPartyBackend::new(t0, cfg0), TwoPartyBackend::new(t1, cfg1));
    let (r0, r1) = tokio::join!(addition_64(b0.unwrap(), 1, 2), addition_64(b1.unwrap(), 1, 2));
    assert_eq!(r0, 3);
    assert_eq!(r1, 3);
}

#[tokio::test]
async fn test_unsupported_protocol_factory() {
    let (b0, _b1) = backend_pair().await;
    assert!(matches!(
        b0.gate_factory(Protocol::Yao),
        Err(BackendError::UnsupportedProtocol(Protocol::Yao))
    ));
    assert!(matches!(
        b0.gate_factory(Protocol::ArithmeticBeavy),
        Err(BackendError::UnsupportedProtocol(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reset_allows_second_repetition() {
    let (mut b0, mut b1) = backend_pair().await;

    async fn once(backend: &mut TwoPartyBackend, value: u64) -> u64 {
        let my_id = backend.my_id();
        let factory = backend.gate_factory(Protocol::ArithmeticGmw).unwrap();
        let (promise, wire) = if my_id == 0 {
            let (p, w) = factory.make_arithmetic_64_input_gate_my(0, 1).unwrap();
            (Some(p), w)
        } else {
            (None, factory.make_arithmetic_64_input_gate_other(0, 1).unwrap())
        };
        let output = factory
            .make_arithmetic_64_output_gate_my(OutputRecipient::Both, &wire)
            .unwrap();
        if let Some(p) = promise {
            p.send(vec![value]).unwrap();
        }
        backend.run().await.unwrap();
        output.await.unwrap()[0]
    }

    let (r0, r1) = tokio::join!(once(&mut b0, 5), once(&mut b1, 5));
    assert_eq!((r0, r1), (5, 5));

    b0.reset();
    b1.reset();

    let (r0, r1) = tokio::join!(once(&mut b0, 9), once(&mut b1, 9));
    assert_eq!((r0, r1), (9, 9));
}
