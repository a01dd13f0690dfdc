//! End-to-end tests over real on-disk containers.

use hyve::{Dataset, Dataspace, Datatype, Error, File, Object, Predefined, Properties};
use hyve_engine::ErrorKind;
use tempfile::TempDir;

fn scratch(name: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

// ---------------------------------------------------------------------------
// 1. Numeric round-trips: every registered kind, scalar and N-d shapes
// ---------------------------------------------------------------------------

#[test]
fn numeric_round_trips() {
    let (_dir, path) = scratch("numeric.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    macro_rules! round_trip {
        ($ty:ty, $name:expr, $values:expr) => {{
            let values: Vec<$ty> = $values;
            root.create_dataset_from_slice($name, &values).unwrap();
            let back: Vec<$ty> = root.open_dataset($name).unwrap().read_vec().unwrap();
            assert_eq!(back, values);
        }};
    }

    round_trip!(i8, "i8", vec![-1, 0, 127]);
    round_trip!(u8, "u8", vec![0, 128, 255]);
    round_trip!(i32, "i32", vec![-5, 0, 7, i32::MAX]);
    round_trip!(u32, "u32", vec![0, 1, u32::MAX]);
    round_trip!(i64, "i64", vec![i64::MIN, -1, i64::MAX]);
    round_trip!(u64, "u64", vec![0, 42, u64::MAX]);
    round_trip!(f32, "f32", vec![-1.5, 0.0, 3.25]);
    round_trip!(f64, "f64", vec![1e-300, 0.0, 1e300]);
}

#[test]
fn scalar_dataset_round_trip() {
    let (_dir, path) = scratch("scalar.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    root.create_scalar("answer", &42i64).unwrap();
    let ds = root.open_dataset("answer").unwrap();
    assert_eq!(ds.dataspace().unwrap().rank().unwrap(), 0);
    assert_eq!(ds.dataspace().unwrap().npoints().unwrap(), 1);
    let mut out = [0i64];
    ds.read(&mut out).unwrap();
    assert_eq!(out[0], 42);
}

#[test]
fn two_dimensional_round_trip() {
    let (_dir, path) = scratch("twod.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    let space = Dataspace::simple(&[2, 3]).unwrap();
    let ds = root.create_dataset::<f64>("matrix", &space).unwrap();
    let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    ds.write(&values).unwrap();

    let reopened = root.open_dataset("matrix").unwrap();
    assert_eq!(reopened.dataspace().unwrap().dims().unwrap(), vec![2, 3]);
    let back: Vec<f64> = reopened.read_vec().unwrap();
    assert_eq!(back, values);
}

#[test]
fn bool_round_trip_widens_through_bytes() {
    let (_dir, path) = scratch("bools.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    let values = vec![true, false, true, true];
    root.create_dataset_from_slice("flags", &values).unwrap();
    let back: Vec<bool> = root.open_dataset("flags").unwrap().read_vec().unwrap();
    assert_eq!(back, values);
}

// ---------------------------------------------------------------------------
// 2. Variable-length strings: round-trip, write-only &str, and no leaked
//    engine allocations.  All string traffic lives in this one test so the
//    process-wide allocation counter is not racing other tests.
// ---------------------------------------------------------------------------

#[test]
fn string_round_trip_reclaims_engine_buffers() {
    let (_dir, path) = scratch("strings.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    let values = vec![
        "alpha".to_string(),
        String::new(),
        "a much longer string value".to_string(),
    ];
    root.create_dataset_from_slice("names", &values).unwrap();
    let back: Vec<String> = root.open_dataset("names").unwrap().read_vec().unwrap();
    assert_eq!(back, values);

    // &str writes through the same variable-length path.
    root.create_dataset_from_slice("labels", &["x", "yz"]).unwrap();
    let labels: Vec<String> = root.open_dataset("labels").unwrap().read_vec().unwrap();
    assert_eq!(labels, vec!["x".to_string(), "yz".to_string()]);

    // ...but cannot be read back into.
    let ds = root.open_dataset("labels").unwrap();
    let mut slots: Vec<&str> = vec![""; 2];
    let err = ds.read(&mut slots).unwrap_err();
    assert!(matches!(err, Error::UnsupportedType(_)));

    // String attributes share the path.
    root.attrs().set_scalar("note", &"hello").unwrap();
    assert_eq!(root.attrs().get::<String>("note").unwrap(), "hello");
    root.attrs()
        .set_slice("tags", &["a".to_string(), "bb".to_string()])
        .unwrap();
    assert_eq!(
        root.attrs().get_vec::<String>("tags").unwrap(),
        vec!["a".to_string(), "bb".to_string()]
    );

    // Every engine-allocated read buffer was returned on scope exit.
    assert_eq!(hyve::vlen_outstanding(), 0);
}

// ---------------------------------------------------------------------------
// 3. Attribute set semantics: in-place overwrite vs. recreate
// ---------------------------------------------------------------------------

#[test]
fn attribute_set_overwrites_in_place_for_equal_extent() {
    let (_dir, path) = scratch("attrs.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();
    let attrs = root.attrs();

    // Absent name: set is create + write.
    attrs.set_scalar("version", &1.5f64).unwrap();
    assert_eq!(attrs.len().unwrap(), 1);
    assert_eq!(attrs.get::<f64>("version").unwrap(), 1.5);

    // Same type, same extent: overwritten in place.
    attrs.set_scalar("version", &2.5f64).unwrap();
    assert_eq!(attrs.len().unwrap(), 1);
    assert_eq!(attrs.get::<f64>("version").unwrap(), 2.5);

    // Incompatible type, same extent: recreated.
    attrs.set_scalar("version", &7i32).unwrap();
    assert_eq!(attrs.len().unwrap(), 1);
    assert_eq!(attrs.get::<i32>("version").unwrap(), 7);

    // Different extent: recreated with the new shape.
    attrs.set_slice("version", &[1i32, 2, 3, 4]).unwrap();
    assert_eq!(attrs.len().unwrap(), 1);
    assert_eq!(attrs.get_vec::<i32>("version").unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn attribute_set_propagates_read_only_failure() {
    let (_dir, path) = scratch("attrs_ro.hyve");
    {
        let file = File::open(&path, "w").unwrap();
        file.root().unwrap().attrs().set_scalar("v", &1i64).unwrap();
    }

    let file = File::open(&path, "r").unwrap();
    let root = file.root().unwrap();
    // Equal extent and type, so the in-place path is taken; the read-only
    // failure must come back instead of triggering delete + recreate.
    let err = root.attrs().set_scalar("v", &2i64).unwrap_err();
    assert!(matches!(err, Error::EngineCall(e) if e.kind() == ErrorKind::ReadOnly));
    assert_eq!(root.attrs().get::<i64>("v").unwrap(), 1);
}

#[test]
fn attribute_collection_surface() {
    let (_dir, path) = scratch("attrs_misc.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();
    let attrs = root.attrs();

    assert!(attrs.is_empty().unwrap());
    assert_eq!(attrs.try_get::<i64>("missing").unwrap(), None);
    assert!(matches!(
        attrs.get::<i64>("missing").unwrap_err(),
        Error::NameNotFound(_)
    ));

    attrs.set_scalar("a", &1i64).unwrap();
    attrs.set_scalar("b", &2i64).unwrap();
    assert!(attrs.exists("a").unwrap());
    assert_eq!(attrs.len().unwrap(), 2);
    assert_eq!(attrs.try_get::<i64>("a").unwrap(), Some(1));

    attrs.remove("a").unwrap();
    assert!(!attrs.exists("a").unwrap());
    assert_eq!(attrs.len().unwrap(), 1);
    assert!(matches!(
        attrs.remove("a").unwrap_err(),
        Error::NameNotFound(_)
    ));
}

// ---------------------------------------------------------------------------
// 4. File modes
// ---------------------------------------------------------------------------

#[test]
fn mode_r_rejects_writes() {
    let (_dir, path) = scratch("ro.hyve");
    {
        let file = File::open(&path, "w").unwrap();
        file.root()
            .unwrap()
            .create_dataset_from_slice("d", &[1i32, 2])
            .unwrap();
    }

    let file = File::open(&path, "r").unwrap();
    let root = file.root().unwrap();
    // Reads work.
    assert_eq!(
        root.open_dataset("d").unwrap().read_vec::<i32>().unwrap(),
        vec![1, 2]
    );
    // Writes fail.
    let err = root.create_dataset_from_slice("e", &[3i32]).unwrap_err();
    assert!(matches!(err, Error::EngineCall(e) if e.kind() == ErrorKind::ReadOnly));
    let err = root
        .open_dataset("d")
        .unwrap()
        .write(&[9i32, 9])
        .unwrap_err();
    assert!(matches!(err, Error::EngineCall(e) if e.kind() == ErrorKind::ReadOnly));
}

#[test]
fn mode_w_minus_fails_on_existing_file() {
    let (_dir, path) = scratch("excl.hyve");
    File::open(&path, "w-").unwrap().close();
    let err = File::open(&path, "w-").unwrap_err();
    assert!(matches!(err, Error::NameCollision(_)));
}

#[test]
fn mode_a_creates_then_appends() {
    let (_dir, path) = scratch("append.hyve");
    {
        // Absent: "a" creates.
        let file = File::open(&path, "a").unwrap();
        file.root()
            .unwrap()
            .create_dataset_from_slice("first", &[1i32])
            .unwrap();
    }
    {
        // Present: "a" opens read-write and keeps existing content.
        let file = File::open(&path, "a").unwrap();
        let root = file.root().unwrap();
        assert_eq!(
            root.open_dataset("first").unwrap().read_vec::<i32>().unwrap(),
            vec![1]
        );
        root.create_dataset_from_slice("second", &[2i32]).unwrap();
    }
    let file = File::open(&path, "r").unwrap();
    assert_eq!(file.root().unwrap().len().unwrap(), 2);
}

#[test]
fn mode_r_and_r_plus_require_existing_file() {
    let (_dir, path) = scratch("missing.hyve");
    assert!(matches!(
        File::open(&path, "r").unwrap_err(),
        Error::NameNotFound(_)
    ));
    assert!(matches!(
        File::open(&path, "r+").unwrap_err(),
        Error::NameNotFound(_)
    ));
}

#[test]
fn mode_w_truncates_existing_content() {
    let (_dir, path) = scratch("trunc.hyve");
    {
        let file = File::open(&path, "w").unwrap();
        file.root()
            .unwrap()
            .create_dataset_from_slice("d", &[1i32])
            .unwrap();
    }
    {
        let file = File::open(&path, "w").unwrap();
        assert_eq!(file.root().unwrap().len().unwrap(), 0);
    }
}

#[test]
fn unknown_mode_is_rejected() {
    let (_dir, path) = scratch("badmode.hyve");
    let err = File::open(&path, "rw").unwrap_err();
    assert!(matches!(err, Error::EngineCall(e) if e.kind() == ErrorKind::InvalidArgument));
}

// ---------------------------------------------------------------------------
// 5. Group enumeration and the link cursor
// ---------------------------------------------------------------------------

#[test]
fn group_enumeration_order_and_cursor() {
    let (_dir, path) = scratch("links.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    root.create_group("x").unwrap();
    root.create_dataset_from_slice("y", &[1i32]).unwrap();
    root.create_group("z").unwrap();

    assert_eq!(root.len().unwrap(), 3);
    assert!(root.exists("y").unwrap());
    assert!(!root.exists("w").unwrap());
    assert_eq!(root.link_name(0).unwrap(), "x");

    let forward: Vec<String> = root.iter().unwrap().map(|n| n.unwrap()).collect();
    assert_eq!(forward, vec!["x", "y", "z"]);

    let backward: Vec<String> = root.iter().unwrap().rev().map(|n| n.unwrap()).collect();
    assert_eq!(backward, vec!["z", "y", "x"]);

    let cursor = root.iter().unwrap();
    assert_eq!(cursor.len(), 3);
}

#[test]
fn nested_groups_and_paths() {
    let (_dir, path) = scratch("nested.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    let a = root.create_group("a").unwrap();
    let b = a.create_group("b").unwrap();
    assert_eq!(b.name().unwrap(), "/a/b");

    // require_group opens the existing group rather than failing.
    let again = root.require_group("a").unwrap();
    assert_eq!(again.name().unwrap(), "/a");
    assert_eq!(root.len().unwrap(), 1);
    let fresh = root.require_group("c").unwrap();
    assert_eq!(fresh.name().unwrap(), "/c");

    // Path-style open from the root.
    let deep = root.open_group("a/b").unwrap();
    assert_eq!(deep.name().unwrap(), b.name().unwrap());

    assert!(matches!(
        root.open_group("nope").unwrap_err(),
        Error::NameNotFound(_)
    ));
}

#[test]
fn remove_link_hides_object() {
    let (_dir, path) = scratch("remove.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    root.create_dataset_from_slice("d", &[1i32]).unwrap();
    assert!(root.exists("d").unwrap());
    root.remove("d").unwrap();
    assert!(!root.exists("d").unwrap());
    assert!(matches!(
        root.remove("d").unwrap_err(),
        Error::NameNotFound(_)
    ));
}

// ---------------------------------------------------------------------------
// 6. Dataset name collisions and the optional-open probe
// ---------------------------------------------------------------------------

#[test]
fn dataset_name_collision_keeps_existing_object() {
    let (_dir, path) = scratch("collide.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    root.create_dataset_from_slice("dup", &[1i32, 2, 3]).unwrap();
    let err = root
        .create_dataset_from_slice("dup", &[9i32, 9])
        .unwrap_err();
    assert!(matches!(err, Error::NameCollision(_)));

    assert_eq!(
        root.open_dataset("dup").unwrap().read_vec::<i32>().unwrap(),
        vec![1, 2, 3]
    );
}

#[test]
fn try_open_dataset_distinguishes_absent_from_error() {
    let (_dir, path) = scratch("probe.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    root.create_dataset_from_slice("present", &[1i32]).unwrap();
    root.create_group("grp").unwrap();

    assert!(root.try_open_dataset("present").unwrap().is_some());
    assert!(root.try_open_dataset("absent").unwrap().is_none());
    // A link that exists but is not a dataset is still an error.
    assert!(root.try_open_dataset("grp").is_err());
}

// ---------------------------------------------------------------------------
// 7. Hyperslab partial I/O
// ---------------------------------------------------------------------------

#[test]
fn hyperslab_partial_write_and_read() {
    let (_dir, path) = scratch("slab.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    let space = Dataspace::simple(&[6]).unwrap();
    let ds = root.create_dataset::<f64>("d", &space).unwrap();
    ds.write(&[0.0; 6]).unwrap();

    // Write 10, 20, 30 into positions 1, 3, 5.
    let mut file_space = ds.dataspace().unwrap();
    file_space.select_hyperslab(&[1], &[2], &[3], &[1]).unwrap();
    assert_eq!(file_space.selected_npoints().unwrap(), 3);
    let mem_space = Dataspace::simple(&[3]).unwrap();
    ds.write_slab(&[10.0, 20.0, 30.0], &mem_space, &file_space)
        .unwrap();

    let full: Vec<f64> = ds.read_vec().unwrap();
    assert_eq!(full, vec![0.0, 10.0, 0.0, 20.0, 0.0, 30.0]);

    // Read the same selection back through a fresh pair of spaces.
    let mut back = [0.0f64; 3];
    ds.read_slab(&mut back, &mem_space, &file_space).unwrap();
    assert_eq!(back, [10.0, 20.0, 30.0]);
}

#[test]
fn buffer_count_mismatch_is_rejected_before_io() {
    let (_dir, path) = scratch("count.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();

    let space = Dataspace::simple(&[4]).unwrap();
    let ds = root.create_dataset::<i32>("d", &space).unwrap();
    assert!(matches!(
        ds.write(&[1i32, 2]).unwrap_err(),
        Error::ShapeMismatch(_)
    ));
    let mut short = [0i32; 3];
    assert!(matches!(
        ds.read(&mut short).unwrap_err(),
        Error::ShapeMismatch(_)
    ));
}

// ---------------------------------------------------------------------------
// 8. Persistence across reopen
// ---------------------------------------------------------------------------

#[test]
fn full_tree_persists_across_reopen() {
    let (_dir, path) = scratch("persist.hyve");
    {
        let file = File::open(&path, "w").unwrap();
        let root = file.root().unwrap();
        let grp = root.create_group("sensors").unwrap();
        let space = Dataspace::simple(&[2, 2]).unwrap();
        let ds = grp.create_dataset::<f64>("temperature", &space).unwrap();
        ds.write(&[20.0, 21.0, 22.0, 23.0]).unwrap();
        ds.attrs().set_scalar("units_code", &7i32).unwrap();
        grp.attrs().set_slice("calibration", &[1.0f64, 2.0]).unwrap();
        // Dropping every handle persists and closes the container.
    }

    let file = File::open(&path, "r").unwrap();
    let root = file.root().unwrap();
    let grp = root.open_group("sensors").unwrap();
    assert_eq!(
        grp.attrs().get_vec::<f64>("calibration").unwrap(),
        vec![1.0, 2.0]
    );
    let ds = grp.open_dataset("temperature").unwrap();
    assert_eq!(ds.dataspace().unwrap().dims().unwrap(), vec![2, 2]);
    assert_eq!(ds.read_vec::<f64>().unwrap(), vec![20.0, 21.0, 22.0, 23.0]);
    assert_eq!(ds.attrs().get::<i32>("units_code").unwrap(), 7);
    assert_eq!(ds.name().unwrap(), "/sensors/temperature");
}

#[test]
fn flush_persists_without_closing() {
    let (_dir, path) = scratch("flush.hyve");
    let file = File::open(&path, "w").unwrap();
    let root = file.root().unwrap();
    root.create_dataset_from_slice("d", &[5i32]).unwrap();
    file.flush().unwrap();

    // A second read-only open sees the flushed state while the writer is
    // still live.
    let reader = File::open(&path, "r").unwrap();
    assert_eq!(
        reader
            .root()
            .unwrap()
            .open_dataset("d")
            .unwrap()
            .read_vec::<i32>()
            .unwrap(),
        vec![5]
    );
}

// ---------------------------------------------------------------------------
// 9. Creation properties and array descriptors
// ---------------------------------------------------------------------------

#[test]
fn chunked_deflated_dataset_round_trips() {
    let (_dir, path) = scratch("deflate.hyve");
    let values: Vec<f64> = (0..64).map(|i| f64::from(i) / 3.0).collect();
    {
        let file = File::open(&path, "w").unwrap();
        let root = file.root().unwrap();
        let space = Dataspace::simple(&[64]).unwrap();
        let mut props = Properties::chunked(&[16]).unwrap();
        props.set_deflate(6).unwrap();
        let ds = Dataset::create::<f64>(&root, "compressed", &space, Some(&props)).unwrap();
        ds.write(&values).unwrap();
        assert_eq!(ds.read_vec::<f64>().unwrap(), values);
    }

    // The chunked + deflated dataset survives a reopen intact.
    let file = File::open(&path, "r").unwrap();
    let ds = file.root().unwrap().open_dataset("compressed").unwrap();
    assert_eq!(ds.dataspace().unwrap().dims().unwrap(), vec![64]);
    assert_eq!(ds.read_vec::<f64>().unwrap(), values);
}

#[test]
fn array_descriptor_surface() {
    let base = Datatype::predefined(Predefined::F64Le).unwrap();
    let arr = base.array_of(&[2, 3]).unwrap();
    assert_eq!(arr.size().unwrap(), Some(48));

    let same = base.array_of(&[2, 3]).unwrap();
    assert!(arr.equals(&same).unwrap());
    let other = base.array_of(&[4]).unwrap();
    assert!(!arr.equals(&other).unwrap());
    assert!(!arr.equals(&base).unwrap());

    let copy = arr.copy().unwrap();
    assert!(copy.equals(&arr).unwrap());
    arr.lock().unwrap();
    assert!(copy.equals(&arr).unwrap());
}
