use super::*;
use proptest::prelude::*;

const SAMPLE_DATA: [f64; 40] = [
    200.00018816645022, 0.0,
    200.00043034083151, 0.0,
    200.00067251579924, 0.0,
    200.00091469135347, 0.0,
    201.10647068550810, 0.0,
    201.10671554643099, 0.0,
    201.10696040795017, 0.0,
    201.10720527006566, 0.0,
    201.10745013277739, 908.68475341796875,
    201.10769499608537, 1266.269287109375,
    201.10793985998967, 1258.114501953125,
    201.10818472449023, 848.79339599609375,
    201.10842958958708, 0.0,
    201.10867445528024, 0.0,
    201.10891932156963, 0.0,
    200.0, 0.0,
    300.0, 1.0,
    400.0, 10.0,
    500.0, 100.0,
    600.0, 1000.0,
];

const ENCODED_32_LITTLE: &str = "DABIQwAAAAAcAEhDAAAAACwASEMAAAAAPABIQwAAAABCG0lDAAAAAFIbSUMAAAAAYhtJQwAAAAByG0lDAAAAAIIbSUPTK2NEkhtJQ55InkSiG0lDqkOdRLIbSUPHMlREwhtJQwAAAADSG0lDAAAAAOIbSUMAAAAAAABIQwAAAAAAAJZDAACAPwAAyEMAACBBAAD6QwAAyEIAABZEAAB6RA==";
const ENCODED_64_LITTLE: &str = "/xedigEAaUAAAAAAAAAAAIV5fYYDAGlAAAAAAAAAAACkK16CBQBpQAAAAAAAAAAAXy4/fgcAaUAAAAAAAAAAAK4HNjVoI2lAAAAAAAAAAACrvLg2aiNpQAAAAAAAAAAAnMM7OGwjaUAAAAAAAAAAAIIcvzluI2lAAAAAAAAAAABax0I7cCNpQAAAAGB6ZYxAJcTGPHIjaUAAAADAE8mTQOUSSz50I2lAAAAAQHWok0CYs88/diNpQAAAAOBYhopAP6ZUQXgjaUAAAAAAAAAAANvq2UJ6I2lAAAAAAAAAAABpgV9EfCNpQAAAAAAAAAAAAAAAAAAAaUAAAAAAAAAAAAAAAAAAwHJAAAAAAAAA8D8AAAAAAAB5QAAAAAAAACRAAAAAAABAf0AAAAAAAABZQAAAAAAAwIJAAAAAAABAj0A=";
const ENCODED_32_LITTLE_ZLIB: &str = "eJzjYfBwZgACGSitA6VtoLSTtCeYDoLSSVC6CEo3AenL2skuk4D0PI95LouA9CrnuS6bgPRxoxCXQ1B1l6D0IyjNADWfgWEakG6wZ2A4AaQVHBkYfgHpE04MDGIuDAxVLgB7LB3q";
const ENCODED_64_LITTLE_ZLIB: &str = "eJz7Lz63i5Eh04EBClora9uYkfhLtOOaWJH48Xr2dexI/HXsZqYZygj+6j07zLKQ+HMOW1vkIPGbZPZb5iHxo447WRdA+AlVqT0OqkeO2RRB+AeET052eCrkbVcC4TuUrpjsMGPzefsyCP9BRFuXg/2yEMcKJPNuv7rpVIXEz2yMd6lB4kNFUfkHiqD8D/YQuhLKV4HQDvVQfiSEPtAEFe93AACmsz1+";
const ENCODED_NUMPRESS_LINEAR: &str = "QS69PAAAAAAu7AEMAAAAAA9J0wgQ61LPfgY70wgQbTLPfg4d0wgQ7hLPfgMM1BgQwGKtfgvq1SgQ4UKtfgjc1SgQIyKtfgXO1SgQRAKtfgKw5SgQ78OG4QNVqQugf3Tmpg+6yRCARe2G9wiYdBGAecaFZgs+qjKwizv8oQVa5SgQS0GtfgJM5SgQjCGtfgwC5BgQApLPfgicxA4Q5MmQzQzK9+kgoDYaDQAvNdQwS+AZrAhzqAY5hKD/kA==";
const ENCODED_NUMPRESS_LINEAR_ZLIB: &str = "eJxz1NtrwwAEem8YeUA0v+dlDoHXQefr2KyBjFyj83V8skDGO6Hzdcw8VyQEDiStreN+dVVD4KHT2jqOO0CGstLaOtZzQIYL09o6pg1PNQTeH257yBy6kntBfcmzZfy7Tgo0uL5t+84xo0SwofJYaxq33SqjDd3WfxayRgEVezsCdfkAGT2Ka+t4mJ5ICDBNOl/HMecIn8CTkxPO8pz6/lJhgZkUL4O+6RUD7weSaziKV7BZtiz4PwEAkp1KXg==";
const ENCODED_NUMPRESS_SLOF: &str = "QMHqAAAAAAACvgAAAr4AAAK+AAACvgAANL4AADS+AAA0vgAANL4AADS+GvQ0vvr/NL6//zS+qfE0vgAANL4AADS+AAACvgAAeszWGMHW6VW73lqlQOWH9w==";
const ENCODED_NUMPRESS_SLOF_ZLIB: &str = "eJxzOPiKAQSY9qFiEwws9cVk36//Jvv2A/HKj8hyIPVVZ65JHLz2MnT3vailDk/bvwMAn1ogtQ==";
const ENCODED_NUMPRESS_PIC: &str = "aMhoyGjIaMhpyGnIachpyGnF2DacUvRpxa5GnFFTachpyGnIaMhcIXFQkXpU8WRlhSWOMA==";
const ENCODED_NUMPRESS_PIC_ZLIB: &str = "eJzLOJEBhpkwePSG2ZygL5lH17nNCQyGiGWciFEsDJhYFfIxJbVVtc8AAAjsG4c=";

fn assert_close(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_eq!(expected.len(), actual.len());
    for (i, (a, b)) in expected.iter().zip(actual).enumerate() {
        assert!((a - b).abs() <= epsilon, "value {}: {} vs {}", i, a, b);
    }
}

/// Lossy comparison used for Numpress: ratio above .999, or within 0.1 of zero.
fn assert_lossy_close(expected: &[f64], actual: &[f64]) {
    assert_eq!(expected.len(), actual.len());
    for (i, (&a, &b)) in expected.iter().zip(actual).enumerate() {
        if a == 0.0 || b == 0.0 {
            assert!((a - b).abs() <= 0.1, "value {}: {} vs {}", i, a, b);
        } else {
            assert!(a.min(b) / a.max(b) > 0.999, "value {}: {} vs {}", i, a, b);
        }
    }
}

fn sample_with_outliers() -> Vec<f64> {
    let mut data = SAMPLE_DATA.to_vec();
    data[1] = f64::MAX - 0.1;
    data[3] = -data[1];
    data[5] = 0.5 * data[1];
    data[7] = 0.5 * data[3];
    data
}

#[test]
fn test_cv_accessions() {
    assert_eq!(Precision::from_cv_accession("MS:1000521"), Some(Precision::Float32));
    assert_eq!(Precision::from_cv_accession("MS:1000523"), Some(Precision::Float64));
    assert_eq!(Precision::from_cv_accession("MS:1000574"), None);

    for compression in Compression::ALL {
        assert_eq!(Compression::from_cv_accession(compression.cv_accession()), Some(compression));
    }
    assert_eq!(Compression::from_cv_accession("MS:1000574"), Some(Compression::Zlib));
    assert_eq!(Compression::from_cv_accession("MS:1002746"), Some(Compression::NumpressLinearZlib));
    assert_eq!(Compression::from_cv_accession("MS:1000521"), None);
}

#[test]
fn test_encode_uncompressed_regression() {
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::None);
    let encoded = BinaryCodec::encode(&SAMPLE_DATA, &spec).unwrap();
    assert_eq!(encoded.text, ENCODED_64_LITTLE);
    assert_eq!(encoded.length, SAMPLE_DATA.len());
    assert_eq!(encoded.encoded_length(), ENCODED_64_LITTLE.len());

    let spec = BinaryArraySpec::new(Precision::Float32, Compression::None);
    let encoded = BinaryCodec::encode(&SAMPLE_DATA, &spec).unwrap();
    assert_eq!(encoded.text, ENCODED_32_LITTLE);
}

#[test]
fn test_float64_uncompressed_is_bit_exact() {
    let values = [1.0, 2.0001];
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::None);
    let encoded = BinaryCodec::encode(&values, &spec).unwrap();
    assert_eq!(encoded.compression, Compression::None);
    assert_eq!(encoded.length, 2);

    let decoded = BinaryCodec::decode(&encoded.text, Precision::Float64, Compression::None, Some(2)).unwrap();
    let bits: Vec<u64> = decoded.iter().map(|v| v.to_bits()).collect();
    assert_eq!(bits, vec![1.0f64.to_bits(), 2.0001f64.to_bits()]);
    assert_eq!(encoded.decode().unwrap(), decoded);

    // 32-bit narrows through f32, so only the narrowed value comes back
    let spec = BinaryArraySpec::new(Precision::Float32, Compression::None);
    let narrowed = BinaryCodec::encode(&values, &spec).unwrap().decode().unwrap();
    assert_eq!(narrowed[1].to_bits(), (2.0001f32 as f64).to_bits());
    assert_ne!(narrowed[1].to_bits(), 2.0001f64.to_bits());
}

#[test]
fn test_decode_uncompressed_regression() {
    let values = BinaryCodec::decode(ENCODED_64_LITTLE, Precision::Float64, Compression::None, Some(40)).unwrap();
    assert_close(&SAMPLE_DATA, &values, 1e-14);

    let values = BinaryCodec::decode(ENCODED_32_LITTLE, Precision::Float32, Compression::None, Some(40)).unwrap();
    assert_close(&SAMPLE_DATA, &values, 1e-4);
}

#[test]
fn test_decode_zlib_regression() {
    let values = BinaryCodec::decode(ENCODED_64_LITTLE_ZLIB, Precision::Float64, Compression::Zlib, None).unwrap();
    assert_close(&SAMPLE_DATA, &values, 1e-14);

    let values = BinaryCodec::decode(ENCODED_32_LITTLE_ZLIB, Precision::Float32, Compression::Zlib, None).unwrap();
    assert_close(&SAMPLE_DATA, &values, 1e-4);
}

#[test]
fn test_zlib_roundtrip_is_exact() {
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::Zlib);
    let encoded = BinaryCodec::encode(&SAMPLE_DATA, &spec).unwrap();
    assert_eq!(encoded.compression, Compression::Zlib);
    assert_eq!(encoded.decode().unwrap(), SAMPLE_DATA.to_vec());
}

#[test]
fn test_numpress_encode_regression() {
    let cases = [
        (Compression::NumpressLinear, ENCODED_NUMPRESS_LINEAR),
        (Compression::NumpressSlof, ENCODED_NUMPRESS_SLOF),
        (Compression::NumpressPic, ENCODED_NUMPRESS_PIC),
    ];
    for (compression, expected) in cases {
        let spec = BinaryArraySpec::new(Precision::Float64, compression);
        let encoded = BinaryCodec::encode(&SAMPLE_DATA, &spec).unwrap();
        assert_eq!(encoded.compression, compression);
        assert_eq!(encoded.text, expected, "{}", compression);
    }
}

#[test]
fn test_numpress_decode_regression() {
    let cases = [
        (Compression::NumpressLinear, ENCODED_NUMPRESS_LINEAR),
        (Compression::NumpressLinearZlib, ENCODED_NUMPRESS_LINEAR_ZLIB),
        (Compression::NumpressSlof, ENCODED_NUMPRESS_SLOF),
        (Compression::NumpressSlofZlib, ENCODED_NUMPRESS_SLOF_ZLIB),
        (Compression::NumpressPic, ENCODED_NUMPRESS_PIC),
        (Compression::NumpressPicZlib, ENCODED_NUMPRESS_PIC_ZLIB),
    ];
    for (compression, text) in cases {
        let values = BinaryCodec::decode(text, Precision::Float64, compression, Some(SAMPLE_DATA.len())).unwrap();
        assert_lossy_close(&SAMPLE_DATA, &values);
    }
}

#[test]
fn test_tolerance_falls_back_to_zlib() {
    let data = sample_with_outliers();
    for compression in [
        Compression::NumpressLinear,
        Compression::NumpressSlof,
        Compression::NumpressPic,
        Compression::NumpressLinearZlib,
    ] {
        let spec = BinaryArraySpec::new(Precision::Float64, compression).with_tolerance(0.01);
        let encoded = BinaryCodec::encode(&data, &spec).unwrap();
        assert_eq!(encoded.compression, Compression::Zlib, "{}", compression);
        assert_eq!(encoded.decode().unwrap(), data);
    }
}

#[test]
fn test_without_tolerance_lossy_result_is_kept() {
    let data = sample_with_outliers();
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::NumpressLinear);
    let encoded = BinaryCodec::encode(&data, &spec).unwrap();
    assert_eq!(encoded.compression, Compression::NumpressLinear);
}

#[test]
fn test_tolerance_met_keeps_numpress() {
    let data: Vec<f64> = (0..1000).map(|i| 400.0 + i as f64 * 0.25).collect();
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::NumpressLinear).with_tolerance(1e-6);
    let encoded = BinaryCodec::encode(&data, &spec).unwrap();
    assert_eq!(encoded.compression, Compression::NumpressLinear);
    let decoded = encoded.decode().unwrap();
    for (a, b) in data.iter().zip(&decoded) {
        assert!(relative_error(*a, *b) <= 1e-6);
    }
}

#[test]
fn test_empty_fallback_reports_violation() {
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::NumpressSlof)
        .with_tolerance(1e-9)
        .with_fallback(Vec::new());
    let err = BinaryCodec::encode(&[1.0, 2.5, 1000.25], &spec).unwrap_err();
    assert!(matches!(err, BinaryError::EncodingViolation { .. }));
}

#[test]
fn test_candidates_only_get_safer() {
    let spec = BinaryArraySpec::new(Precision::Float64, Compression::NumpressSlof)
        .with_fallback(vec![Compression::NumpressPic, Compression::None, Compression::Zlib]);
    assert_eq!(spec.candidates(), vec![Compression::NumpressSlof, Compression::None]);

    let spec = BinaryArraySpec::new(Precision::Float64, Compression::Zlib);
    assert_eq!(spec.candidates(), vec![Compression::Zlib, Compression::None]);

    let spec = BinaryArraySpec::new(Precision::Float64, Compression::NumpressPicZlib);
    assert_eq!(
        spec.candidates(),
        vec![Compression::NumpressPicZlib, Compression::Zlib, Compression::None]
    );
}

#[test]
fn test_float32_narrows_first() {
    let data = [0.1, 1.0 / 3.0, 123456.789];
    let spec = BinaryArraySpec::new(Precision::Float32, Compression::Zlib);
    let decoded = BinaryCodec::encode(&data, &spec).unwrap().decode().unwrap();
    let narrowed: Vec<f64> = data.iter().map(|&v| v as f32 as f64).collect();
    assert_eq!(decoded, narrowed);
}

#[test]
fn test_decode_errors() {
    assert!(matches!(
        BinaryCodec::decode(ENCODED_64_LITTLE, Precision::Float64, Compression::None, Some(39)),
        Err(BinaryError::InvalidLength { expected: 39, actual: 40 })
    ));
    assert!(matches!(
        BinaryCodec::decode("AAAAAAA=", Precision::Float64, Compression::None, None),
        Err(BinaryError::Misaligned { bytes: 5, width: 8 })
    ));
    assert!(matches!(
        BinaryCodec::decode("not base64!", Precision::Float64, Compression::None, None),
        Err(BinaryError::Base64(_))
    ));
    assert!(matches!(
        BinaryCodec::decode(ENCODED_64_LITTLE, Precision::Float64, Compression::Zlib, None),
        Err(BinaryError::Decompression(_))
    ));
    assert!(matches!(
        BinaryCodec::decode("AAAA", Precision::Float64, Compression::NumpressSlof, None),
        Err(BinaryError::Numpress(_))
    ));
}

#[test]
fn test_decode_tolerates_whitespace_and_empty() {
    let wrapped: String = ENCODED_64_LITTLE
        .as_bytes()
        .chunks(76)
        .map(|line| format!("  {}\n", std::str::from_utf8(line).unwrap()))
        .collect();
    let values = BinaryCodec::decode(&wrapped, Precision::Float64, Compression::None, Some(40)).unwrap();
    assert_eq!(values, SAMPLE_DATA.to_vec());

    assert!(BinaryCodec::decode("", Precision::Float32, Compression::Zlib, Some(0)).unwrap().is_empty());
    assert!(BinaryCodec::decode("  \n ", Precision::Float64, Compression::None, None).unwrap().is_empty());
}

#[test]
fn test_relative_error() {
    assert_eq!(relative_error(1.0, 1.0), 0.0);
    assert_eq!(relative_error(0.0, 0.05), 0.05);
    assert!((relative_error(100.0, 99.0) - 0.01).abs() < 1e-12);
    assert_eq!(relative_error(f64::MAX, f64::INFINITY), f64::INFINITY);
    assert_eq!(relative_error(1.0, f64::NAN), f64::INFINITY);
}

#[test]
fn test_spec_from_toml() {
    let spec: BinaryArraySpec = toml::from_str(
        r#"
        precision = "float32"
        compression = "numpress-linear-zlib"
        error_tolerance = 0.0001
        "#,
    )
    .unwrap();
    assert_eq!(spec.precision, Precision::Float32);
    assert_eq!(spec.compression, Compression::NumpressLinearZlib);
    assert_eq!(spec.error_tolerance, Some(0.0001));
    assert_eq!(spec.fallback, vec![Compression::Zlib, Compression::None]);

    let spec: BinaryArraySpec = toml::from_str("fallback = [\"none\"]").unwrap();
    assert_eq!(spec.compression, Compression::Zlib);
    assert_eq!(spec.fallback, vec![Compression::None]);
}

proptest! {
    #[test]
    fn prop_lossless_roundtrip(values in prop::collection::vec(any::<f64>().prop_filter("finite", |v| v.is_finite()), 0..300)) {
        for compression in [Compression::None, Compression::Zlib] {
            let spec = BinaryArraySpec::new(Precision::Float64, compression);
            let encoded = BinaryCodec::encode(&values, &spec).unwrap();
            prop_assert_eq!(encoded.decode().unwrap(), values.clone());
        }
    }

    #[test]
    fn prop_tolerance_is_honoured(
        values in prop::collection::vec(0.0f64..1.0e6, 1..200),
        scheme in prop::sample::select(vec![
            Compression::NumpressLinear,
            Compression::NumpressPic,
            Compression::NumpressSlof,
        ]),
        tolerance in 1e-6f64..1e-2,
    ) {
        let spec = BinaryArraySpec::new(Precision::Float64, scheme).with_tolerance(tolerance);
        let encoded = BinaryCodec::encode(&values, &spec).unwrap();
        let decoded = encoded.decode().unwrap();
        prop_assert_eq!(decoded.len(), values.len());
        for (a, b) in values.iter().zip(&decoded) {
            prop_assert!(relative_error(*a, *b) <= tolerance);
        }
    }
}
