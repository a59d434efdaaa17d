use std::fs::{self, File};
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use super::*;
use crate::input::fixtures::{
    make_temp_dir, npy_f8, pickled_f8, sample_run, write_bytes, write_pair_dumps,
};

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

#[test]
fn test_pickle_and_npy_decode_to_same_values() {
    let dir = make_temp_dir("input_formats");
    let values = vec![100.0, 80.0, 64.0, 51.2];
    let pkl = dir.join("a.dat");
    let npy = dir.join("b.dat");
    write_bytes(&pkl, &pickled_f8(&values));
    write_bytes(&npy, &npy_f8(&values));

    assert_eq!(load_array(&pkl).unwrap(), values);
    assert_eq!(load_array(&npy).unwrap(), values);
}

#[test]
fn test_gzip_wrapped_inputs_are_transparent() {
    let dir = make_temp_dir("input_gzip");
    let values = vec![98.1, 97.9];
    let pkl = dir.join("a.dat");
    let npy = dir.join("b.dat");
    write_bytes(&pkl, &gzip(&pickled_f8(&values)));
    write_bytes(&npy, &gzip(&npy_f8(&values)));

    assert_eq!(load_array(&pkl).unwrap(), values);
    assert_eq!(load_array(&npy).unwrap(), values);

    let double = dir.join("c.dat");
    write_bytes(&double, &gzip(&gzip(&npy_f8(&values))));
    assert!(matches!(
        load_array(&double),
        Err(InputError::Decode {
            source: ArrayError::UnknownFormat,
            ..
        })
    ));
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = make_temp_dir("input_missing");
    let path = dir.join(COMPRESSION_FILE);
    match load_array(&path) {
        Err(InputError::NotFound(p)) => assert_eq!(p, path),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_empty_and_unknown_files_fail_to_decode() {
    let dir = make_temp_dir("input_bad");
    let empty = dir.join("empty.dat");
    File::create(&empty).unwrap();
    assert!(matches!(
        load_array(&empty),
        Err(InputError::Decode {
            source: ArrayError::Empty,
            ..
        })
    ));

    let text = dir.join("text.dat");
    fs::write(&text, "100.0,80.0\n").unwrap();
    let err = load_array(&text).unwrap_err();
    assert!(matches!(
        err,
        InputError::Decode {
            source: ArrayError::UnknownFormat,
            ..
        }
    ));
    assert!(err.to_string().contains("text.dat"));
}

#[test]
fn test_load_dumps_reads_all_three_arrays() {
    let root = make_temp_dir("input_dumps");
    let (compression, winning, reinit) = sample_run();
    let dir = write_pair_dumps(&root, "fc1", "mnist", &compression, &winning, &reinit);

    let dumps = load_dumps(&dir).unwrap();
    assert_eq!(dumps.compression, compression);
    assert_eq!(dumps.winning_accuracy, winning);
    assert_eq!(dumps.reinit_accuracy, reinit);
}

#[test]
fn test_load_dumps_stops_at_first_missing_file() {
    let root = make_temp_dir("input_dumps_missing");
    let (compression, winning, reinit) = sample_run();
    let dir = write_pair_dumps(&root, "fc1", "mnist", &compression, &winning, &reinit);
    fs::remove_file(dir.join(WINNING_ACCURACY_FILE)).unwrap();

    match load_dumps(&dir) {
        Err(InputError::NotFound(p)) => assert!(p.ends_with(WINNING_ACCURACY_FILE)),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_dump_paths_follow_fixed_names() {
    let [a, b, c] = dump_paths(Path::new("dumps/lt/fc1/mnist"));
    assert_eq!(a, PathBuf::from("dumps/lt/fc1/mnist/lt_compression.dat"));
    assert_eq!(b, PathBuf::from("dumps/lt/fc1/mnist/lt_bestaccuracy.dat"));
    assert_eq!(c, PathBuf::from("dumps/lt/fc1/mnist/reinit_bestaccuracy.dat"));
}
