// Integration tests for the stream codec

use std::io::Cursor;

use chunkio::codec::varint;
use chunkio::{Endian, Error, StreamReader, StreamWriter};
use proptest::prelude::*;

fn writer(endian: Endian) -> StreamWriter<Vec<u8>> {
    StreamWriter::new(Vec::new(), endian)
}

fn reader(bytes: Vec<u8>, endian: Endian) -> StreamReader<Cursor<Vec<u8>>> {
    StreamReader::new(Cursor::new(bytes), endian)
}

fn endian_strategy() -> impl Strategy<Value = Endian> {
    prop_oneof![Just(Endian::Big), Just(Endian::Little)]
}

proptest! {
    #[test]
    fn primitives_survive_both_byte_orders(
        endian in endian_strategy(),
        a in any::<i16>(),
        b in any::<i32>(),
        c in any::<i64>(),
        d in -0x80_0000i32..0x80_0000,
        e in any::<u16>(),
        f in any::<f64>().prop_filter("NaN compares unequal", |v| !v.is_nan()),
    ) {
        let mut w = writer(endian);
        w.write_i16(a).unwrap();
        w.write_i32(b).unwrap();
        w.write_i64(c).unwrap();
        w.write_i24(d).unwrap();
        w.write_char(e).unwrap();
        w.write_f64(f).unwrap();
        let bytes = w.into_inner().unwrap();
        prop_assert_eq!(bytes.len(), 2 + 4 + 8 + 3 + 2 + 8);

        let mut r = reader(bytes, endian);
        prop_assert_eq!(r.read_i16().unwrap(), a);
        prop_assert_eq!(r.read_i32().unwrap(), b);
        prop_assert_eq!(r.read_i64().unwrap(), c);
        prop_assert_eq!(r.read_i24().unwrap(), d);
        prop_assert_eq!(r.read_char().unwrap(), e);
        prop_assert_eq!(r.read_f64().unwrap(), f);
        prop_assert!(matches!(r.read_u8(), Err(Error::EndOfStream)));
    }

    #[test]
    fn bit_runs_straddle_bytes(runs in proptest::collection::vec((1u32..=32, any::<u32>()), 1..20)) {
        let runs: Vec<(u32, u32)> = runs
            .into_iter()
            .map(|(count, value)| (count, if count == 32 { value } else { value & ((1 << count) - 1) }))
            .collect();

        let mut w = writer(Endian::Little);
        for &(count, value) in &runs {
            w.write_int_bits(count, value).unwrap();
        }
        let bytes = w.into_inner().unwrap();
        let total: u32 = runs.iter().map(|(count, _)| count).sum();
        prop_assert_eq!(bytes.len() as u32, total.div_ceil(8));

        let mut r = reader(bytes, Endian::Little);
        for &(count, value) in &runs {
            prop_assert_eq!(r.read_int_bits(count).unwrap(), value);
        }
    }

    #[test]
    fn long_bit_runs(value in any::<u64>(), lead in 1u32..8) {
        let mut w = writer(Endian::Big);
        w.write_int_bits(lead, 1).unwrap();
        w.write_long_bits(64, value).unwrap();
        let mut r = reader(w.into_inner().unwrap(), Endian::Big);
        prop_assert_eq!(r.read_int_bits(lead).unwrap(), 1);
        prop_assert_eq!(r.read_long_bits(64).unwrap(), value);
    }

    #[test]
    fn varints_are_minimal(value in 0i64..=i64::MAX) {
        let mut w = writer(Endian::Little);
        w.write_variable_length_long(value).unwrap();
        let bytes = w.into_inner().unwrap();
        prop_assert_eq!(bytes.len(), varint::encoded_len(value as u64));
        prop_assert!(bytes.len() <= varint::MAX_LONG_BYTES);
        prop_assert_eq!(reader(bytes, Endian::Little).read_variable_length_long().unwrap(), value);
    }

    #[test]
    fn int_varints(value in 0i32..=varint::MAX_INT) {
        let encoded = varint::encode_int(value).unwrap();
        prop_assert!(encoded.len() <= varint::MAX_INT_BYTES);
        prop_assert_eq!(varint::decode_int(&encoded).unwrap(), (value, encoded.len()));
    }

    #[test]
    fn strings_and_obfuscation(text in "\\PC{0,40}", endian in endian_strategy()) {
        let mut w = writer(endian);
        w.write_string(&text).unwrap();
        w.write_obfuscated_string(&text).unwrap();
        let mut r = reader(w.into_inner().unwrap(), endian);
        prop_assert_eq!(r.read_string().unwrap(), text.clone());
        prop_assert_eq!(r.read_obfuscated_string().unwrap(), text);
    }
}

fn finite_f32() -> impl Strategy<Value = f32> {
    any::<f32>().prop_filter("NaN compares unequal", |v| !v.is_nan())
}

fn finite_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("NaN compares unequal", |v| !v.is_nan())
}

proptest! {
    #[test]
    fn remaining_scalars(
        endian in endian_strategy(),
        a in any::<u8>(),
        b in any::<i8>(),
        c in any::<bool>(),
        d in any::<u32>(),
        e in any::<u64>(),
        f in finite_f32(),
        g in 0u32..0x100_0000,
        h in any::<u16>(),
    ) {
        let mut w = writer(endian);
        w.write_u8(a).unwrap();
        w.write_i8(b).unwrap();
        w.write_bool(c).unwrap();
        w.write_u32(d).unwrap();
        w.write_u64(e).unwrap();
        w.write_f32(f).unwrap();
        w.write_u24(g).unwrap();
        w.write_u16(h).unwrap();
        let bytes = w.into_inner().unwrap();
        prop_assert_eq!(bytes.len(), 1 + 1 + 1 + 4 + 8 + 4 + 3 + 2);

        let mut r = reader(bytes, endian);
        prop_assert_eq!(r.read_u8().unwrap(), a);
        prop_assert_eq!(r.read_i8().unwrap(), b);
        prop_assert_eq!(r.read_bool().unwrap(), c);
        prop_assert_eq!(r.read_u32().unwrap(), d);
        prop_assert_eq!(r.read_u64().unwrap(), e);
        prop_assert_eq!(r.read_f32().unwrap(), f);
        prop_assert_eq!(r.read_u24().unwrap(), g);
        prop_assert_eq!(r.read_u16().unwrap(), h);
    }

    #[test]
    fn prefixed_arrays(
        endian in endian_strategy(),
        bytes in proptest::collection::vec(any::<u8>(), 0..16),
        shorts in proptest::collection::vec(any::<i16>(), 0..16),
        longs in proptest::collection::vec(any::<i64>(), 0..16),
        floats in proptest::collection::vec(finite_f32(), 0..16),
        doubles in proptest::collection::vec(finite_f64(), 0..16),
        units in proptest::collection::vec(any::<u16>(), 0..16),
        flags in proptest::collection::vec(any::<bool>(), 0..70),
    ) {
        let mut w = writer(endian);
        w.write_byte_array(&bytes).unwrap();
        w.write_i16_array(&shorts).unwrap();
        w.write_i64_array(&longs).unwrap();
        w.write_f32_array(&floats).unwrap();
        w.write_f64_array(&doubles).unwrap();
        w.write_char_array(&units).unwrap();
        w.write_bool_array(&flags).unwrap();

        let mut r = reader(w.into_inner().unwrap(), endian);
        prop_assert_eq!(r.read_byte_array().unwrap(), bytes);
        prop_assert_eq!(r.read_i16_array().unwrap(), shorts);
        prop_assert_eq!(r.read_i64_array().unwrap(), longs);
        prop_assert_eq!(r.read_f32_array().unwrap(), floats);
        prop_assert_eq!(r.read_f64_array().unwrap(), doubles);
        prop_assert_eq!(r.read_char_array().unwrap(), units);
        prop_assert_eq!(r.read_bool_array().unwrap(), flags);
        prop_assert!(matches!(r.read_u8(), Err(Error::EndOfStream)));
    }

    #[test]
    fn nested_arrays_three_deep(
        endian in endian_strategy(),
        ints in proptest::collection::vec(
            proptest::collection::vec(proptest::collection::vec(any::<i32>(), 0..4), 0..4),
            0..4,
        ),
        shorts in proptest::collection::vec(
            proptest::collection::vec(proptest::collection::vec(any::<i16>(), 0..4), 0..4),
            0..4,
        ),
        rows in proptest::collection::vec(proptest::collection::vec(any::<i32>(), 0..4), 0..4),
    ) {
        let mut w = writer(endian);
        w.write_i32_array_3d(&ints).unwrap();
        w.write_i16_array_3d(&shorts).unwrap();
        w.write_i32_array_2d(&rows).unwrap();

        let mut r = reader(w.into_inner().unwrap(), endian);
        prop_assert_eq!(r.read_i32_array_3d().unwrap(), ints);
        prop_assert_eq!(r.read_i16_array_3d().unwrap(), shorts);
        prop_assert_eq!(r.read_i32_array_2d().unwrap(), rows);
    }

    #[test]
    fn fixed_count_reads(
        endian in endian_strategy(),
        ints in proptest::collection::vec(any::<i32>(), 0..8),
        longs in proptest::collection::vec(any::<i64>(), 0..8),
        floats in proptest::collection::vec(finite_f32(), 0..8),
        doubles in proptest::collection::vec(finite_f64(), 0..8),
        units in proptest::collection::vec(any::<u16>(), 0..8),
    ) {
        let mut w = writer(endian);
        ints.iter().try_for_each(|&v| w.write_i32(v)).unwrap();
        longs.iter().try_for_each(|&v| w.write_i64(v)).unwrap();
        floats.iter().try_for_each(|&v| w.write_f32(v)).unwrap();
        doubles.iter().try_for_each(|&v| w.write_f64(v)).unwrap();
        units.iter().try_for_each(|&v| w.write_char(v)).unwrap();

        let mut r = reader(w.into_inner().unwrap(), endian);
        prop_assert_eq!(r.read_i32s(ints.len()).unwrap(), ints);
        prop_assert_eq!(r.read_i64s(longs.len()).unwrap(), longs);
        prop_assert_eq!(r.read_f32s(floats.len()).unwrap(), floats);
        prop_assert_eq!(r.read_f64s(doubles.len()).unwrap(), doubles);
        prop_assert_eq!(r.read_chars(units.len()).unwrap(), units);
    }

    #[test]
    fn obfuscated_string_arrays(
        endian in endian_strategy(),
        values in proptest::collection::vec("\\PC{0,12}", 0..6),
    ) {
        let mut w = writer(endian);
        w.write_obfuscated_string_array(&values).unwrap();
        w.write_string_array(&values).unwrap();

        let mut r = reader(w.into_inner().unwrap(), endian);
        prop_assert_eq!(r.read_obfuscated_string_array().unwrap(), values.clone());
        prop_assert_eq!(r.read_string_array().unwrap(), values);
    }

    #[test]
    fn encoded_strings(endian in endian_strategy(), text in "\\PC{0,24}", latin in "[ -~\u{a0}-\u{ff}]{0,24}") {
        let mut w = writer(endian);
        w.write_string_encoded(&text, "utf-8").unwrap();
        w.write_string_encoded(&text, "UTF-16BE").unwrap();
        w.write_string_encoded(&latin, "latin1").unwrap();
        w.write_ascii_string("plain").unwrap();

        let mut r = reader(w.into_inner().unwrap(), endian);
        prop_assert_eq!(r.read_string_encoded("utf-8").unwrap(), text.clone());
        prop_assert_eq!(r.read_string_encoded("UTF-16BE").unwrap(), text);
        prop_assert_eq!(r.read_string_encoded("latin1").unwrap(), latin);
        prop_assert_eq!(r.read_ascii_string().unwrap(), "plain");
    }
}

#[test]
fn mixed_record() {
    let mut w = writer(Endian::Big);
    w.write_ascii("HDR!").unwrap();
    w.write_i32_array(&[1, -2, 3]).unwrap();
    w.write_bool_array(&[true, false, true, true]).unwrap();
    w.write_string_array(&["a", "bc"]).unwrap();
    w.write_i16_array_2d(&[vec![1, 2], vec![], vec![3]]).unwrap();
    w.write_bit(true).unwrap();
    w.write_bit(false).unwrap();
    w.write_u8(0xEE).unwrap();
    let bytes = w.into_inner().unwrap();

    let mut r = reader(bytes, Endian::Big);
    assert_eq!(r.read_ascii(4).unwrap(), "HDR!");
    assert_eq!(r.read_i32_array().unwrap(), vec![1, -2, 3]);
    assert_eq!(r.read_bool_array().unwrap(), vec![true, false, true, true]);
    assert_eq!(r.read_string_array().unwrap(), vec!["a", "bc"]);
    assert_eq!(r.read_i16_array_2d().unwrap(), vec![vec![1, 2], vec![], vec![3]]);
    assert!(r.read_bit().unwrap());
    assert!(!r.read_bit().unwrap());
    r.byte_align();
    assert_eq!(r.read_u8().unwrap(), 0xEE);
}

#[test]
fn endian_switch_mid_stream() {
    let mut w = writer(Endian::Little);
    w.write_u32(0x0102_0304).unwrap();
    w.set_endian(Endian::Big);
    w.write_u32(0x0102_0304).unwrap();
    let bytes = w.into_inner().unwrap();
    assert_eq!(bytes, [4, 3, 2, 1, 1, 2, 3, 4]);

    let mut r = reader(bytes, Endian::Little);
    assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
    r.set_endian(Endian::Big);
    assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
}

#[test]
fn truncation_is_reported() {
    let mut r = reader(vec![0, 0, 0, 5, 1, 2], Endian::Big);
    assert!(matches!(r.read_byte_array(), Err(Error::Truncated { .. })));

    let mut r = reader(vec![0xAA, 0xBB], Endian::Big);
    assert!(matches!(r.read_u32(), Err(Error::Truncated { needed: 4, got: 2 })));

    let mut r = reader(vec![0xFF, 0xFF, 0xFF, 0xFF], Endian::Big);
    assert!(matches!(r.read_i32_array(), Err(Error::InvalidData(_))));
}

#[test]
fn pattern_scan_after_false_start() {
    let mut r = reader(b"xxOgOggSrest".to_vec(), Endian::Little);
    assert!(r.seek_to_pattern(b"OggS").unwrap());
    assert_eq!(r.read_ascii(4).unwrap(), "rest");
    assert!(!r.seek_to_pattern(b"OggS").unwrap());
}

#[test]
fn little_endian_int_layout() {
    let mut w = writer(Endian::Little);
    w.write_i32(0x1234_5678).unwrap();
    let bytes = w.into_inner().unwrap();
    assert_eq!(bytes, [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(reader(bytes, Endian::Little).read_i32().unwrap(), 0x1234_5678);
}
