use super::*;
use crate::input::array::{Endian, ScalarKind};
use crate::input::fixtures::{f8_le, npy_f8, npy_raw};

#[test]
fn test_parse_v1_float64_vector() {
    let bytes = npy_f8(&[100.0, 80.0, 64.0]);
    let header = parse_header(&bytes).unwrap();
    assert_eq!(header.version, (1, 0));
    assert_eq!(header.shape, vec![3]);
    assert!(!header.fortran_order);
    assert_eq!(header.data_offset % 64, 0);
    assert_eq!(header.dtype.kind, ScalarKind::Float);

    let arr = parse_npy(&bytes).unwrap();
    assert_eq!(arr.values, vec![100.0, 80.0, 64.0]);
}

#[test]
fn test_parse_v2_header_length_is_u32() {
    let header = "{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }\n";
    let mut bytes = b"\x93NUMPY\x02\x00".to_vec();
    bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(&f8_le(&[1.5, -2.5]));

    let arr = parse_npy(&bytes).unwrap();
    assert_eq!(arr.shape, vec![2]);
    assert_eq!(arr.values, vec![1.5, -2.5]);
}

#[test]
fn test_big_endian_and_integer_dtypes() {
    let be: Vec<u8> = [3.25f64, 7.0]
        .iter()
        .flat_map(|v| v.to_be_bytes())
        .collect();
    let arr = parse_npy(&npy_raw(">f8", "(2,)", &be)).unwrap();
    assert_eq!(arr.values, vec![3.25, 7.0]);
    assert_eq!(DType::parse(">f8").unwrap().endian, Endian::Big);

    let ints: Vec<u8> = [-5i64, 90].iter().flat_map(|v| v.to_le_bytes()).collect();
    let arr = parse_npy(&npy_raw("<i8", "(2,)", &ints)).unwrap();
    assert_eq!(arr.values, vec![-5.0, 90.0]);

    let small: Vec<u8> = [-1i16, 300].iter().flat_map(|v| v.to_le_bytes()).collect();
    let arr = parse_npy(&npy_raw("<i2", "(2,)", &small)).unwrap();
    assert_eq!(arr.values, vec![-1.0, 300.0]);

    let f4: Vec<u8> = [0.5f32, 98.25].iter().flat_map(|v| v.to_le_bytes()).collect();
    let arr = parse_npy(&npy_raw("<f4", "(2,)", &f4)).unwrap();
    assert_eq!(arr.values, vec![0.5, 98.25]);

    let arr = parse_npy(&npy_raw("|u1", "(3,)", &[0, 7, 255])).unwrap();
    assert_eq!(arr.values, vec![0.0, 7.0, 255.0]);
}

#[test]
fn test_scalar_shape_holds_one_value() {
    let arr = parse_npy(&npy_raw("<f8", "()", &f8_le(&[42.0]))).unwrap();
    assert!(arr.shape.is_empty());
    assert_eq!(arr.values, vec![42.0]);
}

#[test]
fn test_two_dimensional_array_is_rejected_as_vector() {
    let arr = parse_npy(&npy_raw("<f8", "(2, 2)", &f8_le(&[1.0, 2.0, 3.0, 4.0]))).unwrap();
    assert_eq!(arr.shape, vec![2, 2]);
    assert!(matches!(
        arr.into_vector(),
        Err(ArrayError::NotOneDimensional(_))
    ));

    let column = parse_npy(&npy_raw("<f8", "(3, 1)", &f8_le(&[1.0, 2.0, 3.0]))).unwrap();
    assert_eq!(column.into_vector().unwrap(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_truncated_data_reports_offset() {
    let mut bytes = npy_f8(&[1.0, 2.0, 3.0]);
    let data_offset = parse_header(&bytes).unwrap().data_offset;
    bytes.truncate(bytes.len() - 4);
    match parse_npy(&bytes) {
        Err(ArrayError::Truncated {
            offset,
            needed,
            available,
        }) => {
            assert_eq!(offset, data_offset);
            assert_eq!(needed, 24);
            assert_eq!(available, 20);
        }
        other => panic!("expected truncation error, got {other:?}"),
    }
}

#[test]
fn test_bad_headers() {
    assert!(matches!(
        parse_header(b"NOTNUMPYxxxxxxxx"),
        Err(ArrayError::Header(_))
    ));

    let header = "{'descr': [('a', '<f8')], 'fortran_order': False, 'shape': (1,), }\n";
    let mut structured = b"\x93NUMPY\x01\x00".to_vec();
    structured.extend_from_slice(&(header.len() as u16).to_le_bytes());
    structured.extend_from_slice(header.as_bytes());
    structured.extend_from_slice(&f8_le(&[1.0]));
    assert!(matches!(
        parse_header(&structured),
        Err(ArrayError::UnsupportedDtype(_))
    ));

    assert!(matches!(
        parse_npy(&npy_raw("<c16", "(1,)", &[0u8; 16])),
        Err(ArrayError::UnsupportedDtype(_))
    ));
    assert!(matches!(
        parse_npy(&npy_raw("<f2", "(1,)", &[0u8; 2])),
        Err(ArrayError::UnsupportedDtype(_))
    ));
}
