use std::fs;
use std::path::Path;
use std::sync::Mutex;

use sensor2kitti::pipeline::prepare_run;
use sensor2kitti::splits::{TEST_FILE, TRAINVAL_FILE, TRAIN_FILE, VAL_FILE};
use sensor2kitti::{
    run, run_with, Args, ConvertError, ConverterSet, CrossModalValidator, ErrorLog, LogNotifier,
    Modality, Notifier, PipelineError, RunContext,
};

fn test_args(root: &Path) -> Args {
    Args {
        root_path: root.to_string_lossy().into_owned(),
        num_threads: 3,
        input_dir: None,
        output_dir: None,
        top_folder: "kitti".to_string(),
        shuffle: false,
        seed: None,
        train_val_ratio: 0.7,
        modalities: Vec::new(),
        extract_archives: false,
        prune_empty_dirs: false,
        no_progress: true,
    }
}

fn touch(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Lay out `count` samples named `frame_NN` across image, point cloud and annotation folders
fn write_samples(root: &Path, count: usize) {
    for i in 0..count {
        touch(&root.join(format!("input/camera/frame_{:02}.jpg", i)), "jpg");
        touch(&root.join(format!("input/lidar/frame_{:02}.pcd", i)), "pcd");
        touch(&root.join(format!("input/label/frame_{:02}.json", i)), "{}");
    }
}

/// Writes the input file stem into the output, so tests can trace provenance
fn stem_writer(input: &Path, output: &Path) -> Result<(), ConvertError> {
    let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
    fs::write(output, format!("{}\n", stem))?;
    Ok(())
}

fn stem_converters() -> ConverterSet {
    ConverterSet {
        image: Box::new(stem_writer),
        point_cloud: Box::new(stem_writer),
        label: Box::new(stem_writer),
        calib: Box::new(stem_writer),
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.to_string())
        .collect()
}

fn kitti_dir(root: &Path) -> std::path::PathBuf {
    root.join("output/kitti")
}

#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(Modality, usize)>>,
}

impl Notifier for RecordingNotifier {
    fn notify_failure(&self, modality: Modality, errors: &ErrorLog) {
        self.calls.lock().unwrap().push((modality, errors.len()));
    }
}

#[test]
fn test_three_sample_run_writes_layout_and_splits() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 3);

    let report = run(&test_args(root), &stem_converters(), &LogNotifier).unwrap();

    assert_eq!(report.sample_count, 3);
    assert_eq!(report.empty_samples, 0);
    for modality in Modality::ALL {
        assert_eq!(report.converted[&modality], 3);
    }

    let kitti = kitti_dir(root);
    for (dir, suffix) in [
        ("training/image", "png"),
        ("training/point_cloud", "bin"),
        ("training/label", "txt"),
        ("training/calib", "txt"),
    ] {
        for i in 0..3 {
            let output = kitti.join(dir).join(format!("{:06}.{}", i, suffix));
            assert_eq!(
                fs::read_to_string(&output).unwrap(),
                format!("frame_{:02}\n", i)
            );
        }
    }
    for dir in ["testing/calib", "testing/image", "testing/point_cloud"] {
        assert!(kitti.join(dir).is_dir());
    }

    let sets = kitti.join("ImageSets");
    assert_eq!(read_lines(&sets.join(TRAIN_FILE)), vec!["000000", "000001"]);
    assert_eq!(read_lines(&sets.join(VAL_FILE)), vec!["000002"]);
    assert_eq!(read_lines(&sets.join(TRAINVAL_FILE)).len(), 3);
    assert_eq!(fs::read_to_string(sets.join(TEST_FILE)).unwrap(), "");
}

#[test]
fn test_failed_batch_stops_later_modalities() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 4);

    let converters = ConverterSet {
        image: Box::new(|input: &Path, output: &Path| -> Result<(), ConvertError> {
            if input.ends_with("frame_01.jpg") {
                return Err(ConvertError::invalid_content(input, "truncated JPEG"));
            }
            stem_writer(input, output)
        }),
        point_cloud: Box::new(stem_writer),
        label: Box::new(stem_writer),
        calib: Box::new(stem_writer),
    };
    let notifier = RecordingNotifier::default();

    let result = run(&test_args(root), &converters, &notifier);

    assert!(matches!(
        result,
        Err(PipelineError::BatchFailed {
            modality: Modality::Image,
            failures: 1
        })
    ));
    assert_eq!(*notifier.calls.lock().unwrap(), vec![(Modality::Image, 1)]);

    let kitti = kitti_dir(root);
    let images: Vec<_> = fs::read_dir(kitti.join("training/image")).unwrap().collect();
    assert_eq!(images.len(), 3);
    for dir in ["training/point_cloud", "training/label", "training/calib", "ImageSets"] {
        assert_eq!(
            fs::read_dir(kitti.join(dir)).unwrap().count(),
            0,
            "{} should be untouched",
            dir
        );
    }
}

#[test]
fn test_count_mismatch_aborts_before_conversion() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 3);
    fs::remove_file(root.join("input/lidar/frame_02.pcd")).unwrap();

    let result = run(&test_args(root), &stem_converters(), &LogNotifier);

    assert!(matches!(
        result,
        Err(PipelineError::CountMismatch {
            modality: Modality::PointCloud,
            expected: 3,
            found: 2
        })
    ));
    assert_eq!(
        fs::read_dir(kitti_dir(root).join("training/image"))
            .unwrap()
            .count(),
        0
    );
}

#[test]
fn test_shuffled_run_keeps_modalities_aligned() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 5);

    let args = Args {
        shuffle: true,
        ..test_args(root)
    };
    let context = RunContext::with_permutation(vec![4, 2, 0, 3, 1]).unwrap();
    run_with(
        &args,
        &stem_converters(),
        &LogNotifier,
        &CrossModalValidator,
        Some(context),
    )
    .unwrap();

    let kitti = kitti_dir(root);
    for (sample, source) in [(4, 0), (2, 1), (0, 2), (3, 3), (1, 4)] {
        let expected = format!("frame_{:02}\n", source);
        for path in [
            format!("training/image/{:06}.png", sample),
            format!("training/point_cloud/{:06}.bin", sample),
            format!("training/label/{:06}.txt", sample),
            format!("training/calib/{:06}.txt", sample),
        ] {
            assert_eq!(fs::read_to_string(kitti.join(&path)).unwrap(), expected, "{}", path);
        }
    }
}

#[test]
fn test_seeded_shuffle_is_a_permutation_of_all_samples() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 8);

    let args = Args {
        shuffle: true,
        seed: Some(11),
        ..test_args(root)
    };
    let (_layout, index) = prepare_run(&args).unwrap();

    let mut samples: Vec<_> = index
        .get(Modality::Image)
        .unwrap()
        .entries
        .iter()
        .map(|e| e.sample.0)
        .collect();
    let labels: Vec<_> = index
        .get(Modality::Label)
        .unwrap()
        .entries
        .iter()
        .map(|e| e.sample.0)
        .collect();
    assert_eq!(samples, labels);
    samples.sort();
    assert_eq!(samples, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_empty_annotations_are_left_out_of_splits() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 4);

    let converters = ConverterSet {
        label: Box::new(|input: &Path, output: &Path| -> Result<(), ConvertError> {
            if input.ends_with("frame_02.json") {
                fs::write(output, "")?;
                return Ok(());
            }
            stem_writer(input, output)
        }),
        ..stem_converters()
    };

    let args = Args {
        train_val_ratio: 0.5,
        ..test_args(root)
    };
    let report = run(&args, &converters, &LogNotifier).unwrap();

    assert_eq!(report.empty_samples, 1);
    let sets = kitti_dir(root).join("ImageSets");
    assert_eq!(
        read_lines(&sets.join(TRAINVAL_FILE)),
        vec!["000000", "000001", "000003"]
    );
    assert_eq!(read_lines(&sets.join(TRAIN_FILE)), vec!["000000", "000001"]);
    assert_eq!(read_lines(&sets.join(VAL_FILE)), vec!["000003"]);
}

#[test]
fn test_selected_modalities_only_convert_those() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 2);

    let args = Args {
        modalities: vec!["point_cloud".to_string()],
        ..test_args(root)
    };
    let report = run(&args, &stem_converters(), &LogNotifier).unwrap();

    assert_eq!(report.converted.len(), 1);
    assert_eq!(report.sample_count, 2);
    let kitti = kitti_dir(root);
    assert_eq!(fs::read_dir(kitti.join("training/point_cloud")).unwrap().count(), 2);
    assert_eq!(fs::read_dir(kitti.join("training/image")).unwrap().count(), 0);
}

#[test]
fn test_unknown_modality_fails_the_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let args = Args {
        modalities: vec!["thermal".to_string()],
        ..test_args(temp_dir.path())
    };

    let result = run(&args, &stem_converters(), &LogNotifier);
    assert!(matches!(result, Err(PipelineError::UnknownExtension(_))));
}

#[test]
fn test_rerun_reuses_layout() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    write_samples(root, 2);

    run(&test_args(root), &stem_converters(), &LogNotifier).unwrap();
    let report = run(&test_args(root), &stem_converters(), &LogNotifier).unwrap();

    assert_eq!(report.sample_count, 2);
    assert_eq!(
        fs::read_dir(kitti_dir(root).join("training/label"))
            .unwrap()
            .count(),
        2
    );
}

#[test]
fn test_archives_are_extracted_before_scanning() {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("downloads")).unwrap();
    let file = fs::File::create(root.join("downloads/batch.zip")).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for i in 0..2 {
        for (dir, ext) in [("camera", "jpg"), ("lidar", "pcd"), ("label", "json")] {
            zip.start_file(format!("{}/frame_{:02}.{}", dir, i, ext), options)
                .unwrap();
            zip.write_all(b"{}").unwrap();
        }
    }
    zip.finish().unwrap();

    let args = Args {
        extract_archives: true,
        ..test_args(root)
    };
    let report = run(&args, &stem_converters(), &LogNotifier).unwrap();

    assert!(root.join("input/camera/frame_01.jpg").is_file());
    assert_eq!(report.sample_count, 2);
    assert_eq!(report.converted[&Modality::Image], 2);
}

#[test]
fn test_archives_extracted_outside_root_are_scanned() {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("dataset");
    let elsewhere = temp_dir.path().join("elsewhere_input");
    fs::create_dir_all(&root).unwrap();
    let file = fs::File::create(root.join("batch.zip")).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for i in 0..3 {
        for (dir, ext) in [("camera", "jpg"), ("lidar", "pcd"), ("label", "json")] {
            zip.start_file(format!("{}/frame_{:02}.{}", dir, i, ext), options)
                .unwrap();
            zip.write_all(b"{}").unwrap();
        }
    }
    zip.finish().unwrap();

    let args = Args {
        input_dir: Some(elsewhere.to_string_lossy().into_owned()),
        extract_archives: true,
        ..test_args(&root)
    };
    let report = run(&args, &stem_converters(), &LogNotifier).unwrap();

    assert!(elsewhere.join("label/frame_02.json").is_file());
    assert_eq!(report.sample_count, 3);
    assert_eq!(report.converted[&Modality::Label], 3);
}
