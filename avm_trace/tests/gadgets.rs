use anyhow::{Context, Result};
use avm_trace::config::TraceConfig;
use avm_trace::errors::AvmError;
use avm_trace::gadgets::conversion::{from_radix_le, to_radix_le, LimbOrder};
use avm_trace::gadgets::ecc::AffinePoint;
use avm_trace::hints::ExecutionHints;
use avm_trace::instruction::Instruction;
use avm_trace::memory::{MemoryCell, MemoryTag};
use avm_trace::testing_utils::{init_logger, test_public_inputs};
use avm_trace::trace::AvmTraceBuilder;
use avm_trace::util::{ff_to_u64, parse_ff, FF};
use rand::Rng;

fn builder() -> AvmTraceBuilder {
    init_logger();
    AvmTraceBuilder::new(
        test_public_inputs(),
        vec![],
        ExecutionHints::default(),
        TraceConfig::testing(),
    )
}

fn set(trace: &mut AvmTraceBuilder, tag: MemoryTag, value: FF, dst: u32) -> Result<()> {
    let error = trace.execute(&Instruction::set(tag, value, dst))?;
    anyhow::ensure!(error.is_ok(), "SET failed: {error}");
    Ok(())
}

fn cell(trace: &AvmTraceBuilder, addr: u32) -> MemoryCell {
    trace.memory().unconstrained_read(0, addr)
}

fn generator() -> Result<AffinePoint> {
    let y = parse_ff("17631683881184975370165255887551781615748388533673675138860")
        .context("generator y")?;
    Ok(AffinePoint::new(FF::from(1u64), y))
}

fn set_point(trace: &mut AvmTraceBuilder, point: AffinePoint, addr: u32) -> Result<()> {
    set(trace, MemoryTag::FF, point.x, addr)?;
    set(trace, MemoryTag::FF, point.y, addr + 1)?;
    set(trace, MemoryTag::U1, FF::from(point.is_infinity as u64), addr + 2)
}

fn read_point(trace: &AvmTraceBuilder, addr: u32) -> AffinePoint {
    AffinePoint {
        x: cell(trace, addr).val,
        y: cell(trace, addr + 1).val,
        is_infinity: cell(trace, addr + 2).val != FF::from(0u64),
    }
}

/// One compression of the padded block of "abc" from the initial hash value
/// gives the SHA-256 digest of "abc".
#[test]
fn sha256_compression_of_abc() -> Result<()> {
    const IV: [u32; 8] = [
        0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab,
        0x5be0cd19,
    ];
    const DIGEST: [u32; 8] = [
        0xba7816bf, 0x8f01cfea, 0x414140de, 0x5dae2223, 0xb00361a3, 0x96177a9c, 0xb410ff61,
        0xf20015ad,
    ];
    let mut block = [0u32; 16];
    block[0] = 0x61626380;
    block[15] = 24;

    let mut trace = builder();
    for (i, word) in IV.iter().enumerate() {
        set(&mut trace, MemoryTag::U32, FF::from(*word), i as u32)?;
    }
    for (i, word) in block.iter().enumerate() {
        set(&mut trace, MemoryTag::U32, FF::from(*word), 8 + i as u32)?;
    }
    let error = trace.execute(&Instruction::Sha256Compression {
        indirect: 0,
        output: 100,
        state: 0,
        input: 8,
    })?;
    assert_eq!(error, AvmError::NoError);

    for (i, word) in DIGEST.iter().enumerate() {
        let out = cell(&trace, 100 + i as u32);
        assert_eq!((out.val, out.tag), (FF::from(*word), MemoryTag::U32));
    }
    Ok(())
}

#[test]
fn ec_add_doubles_the_generator() -> Result<()> {
    let g = generator()?;
    assert!(g.is_on_curve());

    let mut trace = builder();
    set_point(&mut trace, g, 0)?;
    set_point(&mut trace, g, 3)?;
    let error = trace.execute(&Instruction::EcAdd {
        indirect: 0,
        p1_x: 0,
        p1_y: 1,
        p1_inf: 2,
        p2_x: 3,
        p2_y: 4,
        p2_inf: 5,
        output: 10,
    })?;
    assert_eq!(error, AvmError::NoError);

    let sum = read_point(&trace, 10);
    assert_eq!(sum, g.double());
    assert!(sum.is_on_curve());
    assert_eq!(cell(&trace, 12).tag, MemoryTag::U1);

    // P + (-P) is the point at infinity.
    set_point(&mut trace, g.negate(), 3)?;
    trace.execute(&Instruction::EcAdd {
        indirect: 0,
        p1_x: 0,
        p1_y: 1,
        p1_inf: 2,
        p2_x: 3,
        p2_y: 4,
        p2_inf: 5,
        output: 10,
    })?;
    assert!(read_point(&trace, 10).is_infinity);
    Ok(())
}

#[test]
fn msm_of_two_points() -> Result<()> {
    let g = generator()?;
    let g2 = g.double();

    let mut trace = builder();
    set_point(&mut trace, g, 0)?;
    set_point(&mut trace, g2, 3)?;
    // Scalars as (lo, hi) pairs: 2 and 3.
    for (i, limb) in [2u64, 0, 3, 0].into_iter().enumerate() {
        set(&mut trace, MemoryTag::FF, FF::from(limb), 10 + i as u32)?;
    }
    set(&mut trace, MemoryTag::U32, FF::from(6u64), 20)?;

    let error = trace.execute(&Instruction::Msm {
        indirect: 0,
        points: 0,
        scalars: 10,
        output: 30,
        point_length: 20,
    })?;
    assert_eq!(error, AvmError::NoError);
    // 2G + 3(2G) = 8G
    assert_eq!(read_point(&trace, 30), g.scalar_mul(FF::from(8u64)));
    Ok(())
}

#[test]
fn msm_rejects_untagged_points() -> Result<()> {
    let mut trace = builder();
    // The infinity flag of the only point is stored as a field element.
    set(&mut trace, MemoryTag::FF, FF::from(1u64), 0)?;
    set(&mut trace, MemoryTag::FF, FF::from(1u64), 1)?;
    set(&mut trace, MemoryTag::FF, FF::from(0u64), 2)?;
    set(&mut trace, MemoryTag::U32, FF::from(3u64), 20)?;
    let error = trace.execute(&Instruction::Msm {
        indirect: 0,
        points: 0,
        scalars: 10,
        output: 30,
        point_length: 20,
    })?;
    assert_eq!(error, AvmError::TagError);
    assert_eq!(cell(&trace, 30).val, FF::from(0u64));
    Ok(())
}

/// Random values in random radixes: the written digits match the reference
/// decomposition in both limb orders and recompose to the input.
#[test]
fn to_radix_random_values() -> Result<()> {
    const NUM_LIMBS: u32 = 64;
    let mut rng = rand::thread_rng();
    let mut trace = builder();

    for _ in 0..20 {
        let value = rng.gen::<u64>();
        let radix = rng.gen_range(2..=256u32);
        set(&mut trace, MemoryTag::FF, FF::from(value), 0)?;
        set(&mut trace, MemoryTag::U32, FF::from(radix), 1)?;

        let expected = to_radix_le(FF::from(value), radix, NUM_LIMBS as usize);
        assert_eq!(from_radix_le(&expected, radix), FF::from(value));

        for order in [LimbOrder::LittleEndian, LimbOrder::BigEndian] {
            let error = trace.execute(&Instruction::ToRadix {
                order,
                indirect: 0,
                src: 0,
                dst: 100,
                radix: 1,
                num_limbs: NUM_LIMBS,
                output_bits: false,
            })?;
            assert_eq!(error, AvmError::NoError);

            let mut limbs: Vec<u8> = (100..100 + NUM_LIMBS)
                .map(|addr| ff_to_u64(cell(&trace, addr).val) as u8)
                .collect();
            if order == LimbOrder::BigEndian {
                limbs.reverse();
            }
            assert_eq!(limbs, expected);
            assert_eq!(cell(&trace, 100).tag, MemoryTag::U8);
        }
    }
    Ok(())
}

#[test]
fn to_radix_bits() -> Result<()> {
    let mut trace = builder();
    set(&mut trace, MemoryTag::FF, FF::from(0b1011u64), 0)?;
    set(&mut trace, MemoryTag::U32, FF::from(2u64), 1)?;
    let error = trace.execute(&Instruction::ToRadix {
        order: LimbOrder::BigEndian,
        indirect: 0,
        src: 0,
        dst: 10,
        radix: 1,
        num_limbs: 6,
        output_bits: true,
    })?;
    assert_eq!(error, AvmError::NoError);
    let bits: Vec<u64> = (10..16).map(|addr| ff_to_u64(cell(&trace, addr).val)).collect();
    assert_eq!(bits, vec![0, 0, 1, 0, 1, 1]);
    assert!((10..16).all(|addr| cell(&trace, addr).tag == MemoryTag::U1));

    // Bit output requires radix 2.
    set(&mut trace, MemoryTag::U32, FF::from(4u64), 1)?;
    let error = trace.execute(&Instruction::ToRadix {
        order: LimbOrder::BigEndian,
        indirect: 0,
        src: 0,
        dst: 10,
        radix: 1,
        num_limbs: 6,
        output_bits: true,
    })?;
    assert_eq!(error, AvmError::RadixOutOfBounds);
    Ok(())
}
