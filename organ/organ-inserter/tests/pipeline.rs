//! End-to-end insertion runs over small meshes on disk.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use fe_mesh::{Element, ElementShape, Field, MeshLocation, Region};
use fe_mesh_io::{load_document, load_region, save_region};
use fe_registration::node_positions;
use organ_inserter::{
    BusyIndicator, FitWeights, InsertError, InserterConfig, LandmarkRegistrar, MANIFEST_FILE_NAME,
    MarkerSet, NoBusyIndicator, OrganClassifier, OrganEntry, OrganInserter, Registrar,
    RegistrationFailure, RegistrationJob, SchemaError,
};
use tempfile::tempdir;

// =============================================================================
// Fixtures
// =============================================================================

/// Tetrahedron `scale` times the unit one, shifted by `offset`.
fn tetrahedron(scale: f64, offset: [f64; 3]) -> Region {
    let corners = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    let mut region = Region::new();
    let mut coordinates = Field::coordinates("coordinates", 3);
    for (node, c) in (1..).zip(corners.iter()) {
        region.add_node(node).unwrap();
        let p: Vec<f64> = c.iter().zip(offset).map(|(x, o)| x * scale + o).collect();
        coordinates.set_node_values(node, &p).unwrap();
    }
    region.add_field(coordinates).unwrap();
    region
        .add_element(Element::new(1, ElementShape::Tetrahedron4, vec![1, 2, 3, 4]))
        .unwrap();
    region
        .add_element(Element::new(1, ElementShape::Triangle3, vec![1, 2, 3]))
        .unwrap();
    region
}

/// Adds marker nodes from 100 on, each at a local position of element 1.
fn add_markers(region: &mut Region, markers: &[(&str, [f64; 3])]) {
    let mut group = Field::group("marker");
    let mut names = Field::stored_string("marker_name");
    let mut locations = Field::stored_mesh_location("marker_location", 3);
    for (node, (name, xi)) in (100..).zip(markers) {
        region.add_node(node).unwrap();
        group.as_group_mut().unwrap().add_node(node);
        names.set_node_string(node, *name).unwrap();
        locations
            .set_node_location(node, MeshLocation::new(1, *xi))
            .unwrap();
    }
    region.add_field(group).unwrap();
    region.add_field(names).unwrap();
    region.add_field(locations).unwrap();
}

const CORNER_MARKERS: [(&str, [f64; 3]); 4] = [
    ("apex", [0.0, 0.0, 0.0]),
    ("x", [1.0, 0.0, 0.0]),
    ("y", [0.0, 1.0, 0.0]),
    ("z", [0.0, 0.0, 1.0]),
];

struct Inputs {
    _dir: tempfile::TempDir,
    scaffold: PathBuf,
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl Inputs {
    fn new(scaffold: &Region) -> Self {
        let dir = tempdir().unwrap();
        let input_dir = dir.path().join("input");
        fs::create_dir(&input_dir).unwrap();
        let scaffold_path = input_dir.join("whole_body.exf");
        save_region(scaffold, &scaffold_path).unwrap();
        Self {
            scaffold: scaffold_path,
            output_dir: dir.path().join("output"),
            input_dir,
            _dir: dir,
        }
    }

    fn organ(&self, name: &str, region: &Region) -> PathBuf {
        let path = self.input_dir.join(name);
        save_region(region, &path).unwrap();
        path
    }
}

/// Scaffold with markers A and B.
fn two_marker_scaffold() -> Region {
    let mut region = tetrahedron(10.0, [0.0; 3]);
    add_markers(&mut region, &[("A", [0.5, 0.0, 0.0]), ("B", [0.0, 0.5, 0.0])]);
    region
}

/// Stands in for registration by copying files to the expected names.
#[derive(Default)]
struct CopyRegistrar {
    aligned: Vec<PathBuf>,
    fitted: Vec<(PathBuf, FitWeights)>,
}

impl Registrar for CopyRegistrar {
    fn align(&mut self, job: &RegistrationJob) -> Result<PathBuf, RegistrationFailure> {
        assert!(job.markers().exists());
        let output = job.aligned_path();
        fs::copy(job.model(), &output).map_err(|e| RegistrationFailure::Message(e.to_string()))?;
        self.aligned.push(job.model().to_path_buf());
        Ok(output)
    }

    fn fit(
        &mut self,
        job: &RegistrationJob,
        weights: &FitWeights,
    ) -> Result<PathBuf, RegistrationFailure> {
        let output = job.fitted_path();
        fs::copy(job.aligned_path(), &output)
            .map_err(|e| RegistrationFailure::Message(e.to_string()))?;
        self.fitted.push((job.model().to_path_buf(), *weights));
        Ok(output)
    }
}

/// Aligns, then refuses to fit.
struct FailingFit;

impl Registrar for FailingFit {
    fn align(&mut self, job: &RegistrationJob) -> Result<PathBuf, RegistrationFailure> {
        Ok(job.aligned_path())
    }

    fn fit(&mut self, _: &RegistrationJob, _: &FitWeights) -> Result<PathBuf, RegistrationFailure> {
        Err(RegistrationFailure::Message("solver diverged".to_string()))
    }
}

#[derive(Default)]
struct RecordingBusy(RefCell<Vec<String>>);

impl BusyIndicator for RecordingBusy {
    fn busy(&self, label: &str) {
        self.0.borrow_mut().push(format!("busy:{label}"));
    }

    fn ready(&self) {
        self.0.borrow_mut().push("ready".to_string());
    }
}

fn group_names(path: &Path) -> Vec<String> {
    let region = load_region(path).unwrap();
    let mut names: Vec<String> = region
        .fields()
        .filter(|f| f.as_group().is_some())
        .map(|f| f.name().to_string())
        .collect();
    names.sort();
    names
}

fn manifest_lines(output_dir: &Path) -> Vec<String> {
    fs::read_to_string(output_dir.join(MANIFEST_FILE_NAME))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn colon_is_bypassed_and_heart_is_registered() {
    let inputs = Inputs::new(&two_marker_scaffold());
    let colon = inputs.organ("colon_segment.exf", &tetrahedron(1.0, [0.0; 3]));
    let heart = inputs.organ("heart_data.exf", &tetrahedron(1.0, [1.0, 2.0, 3.0]));
    let colon_before = fs::read(&colon).unwrap();

    let mut registrar = CopyRegistrar::default();
    let busy = RecordingBusy::default();
    let report = OrganInserter::default()
        .run(
            &inputs.scaffold,
            &[colon.clone(), heart.clone()],
            &inputs.output_dir,
            &mut registrar,
            &busy,
        )
        .unwrap();

    assert_eq!(report.marker_count, 2);
    let markers = MarkerSet::load(&report.marker_file).unwrap();
    let names: Vec<&str> = markers.points().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_relative_eq!(markers.points()[0].position.x, 5.0, epsilon = 1e-12);
    assert_relative_eq!(markers.points()[1].position.y, 5.0, epsilon = 1e-12);
    assert_eq!(
        report.marker_file,
        inputs.output_dir.join("whole_body_marker_coordinates.exnode")
    );

    let outputs = report.output_files();
    assert_eq!(
        outputs,
        vec![
            inputs.output_dir.join("colon_segment.exf"),
            inputs.output_dir.join("heart_data_transformed_fit1.exf"),
        ]
    );
    assert!(report.organs[0].bypassed);
    assert!(!report.organs[1].bypassed);
    assert_eq!(report.organs[1].group_elements, 1);

    assert_eq!(registrar.aligned, vec![heart.clone()]);
    assert_eq!(registrar.fitted.len(), 1);
    assert_eq!(registrar.fitted[0].1, FitWeights::default());
    assert_eq!(
        *busy.0.borrow(),
        vec!["busy:heart".to_string(), "ready".to_string()]
    );

    assert_eq!(group_names(&outputs[0]), vec!["colon"]);
    assert_eq!(group_names(&outputs[1]), vec!["heart"]);
    let document = load_document(&outputs[1]).unwrap();
    assert_eq!(document.resource_names().collect::<Vec<_>>(), vec!["heart"]);
    assert_eq!(fs::read(&colon).unwrap(), colon_before);

    assert_eq!(
        manifest_lines(&inputs.output_dir),
        vec![
            "Organ name,Source,File name,Transformed file name",
            "whole-body,https://doi.org/10.26275/yibc-wyu2,whole_body.exf,whole_body.exf",
            "colon,colon,colon_segment.exf,colon_segment.exf",
            "heart,https://doi.org/10.26275/rets-qdch,heart_data.exf,heart_data_transformed_fit1.exf",
        ]
    );
}

#[test]
fn unknown_organ_keeps_its_base_name() {
    let inputs = Inputs::new(&two_marker_scaffold());
    let organ = inputs.organ("xyz123.exf", &tetrahedron(1.0, [0.0; 3]));

    let report = OrganInserter::default()
        .run(
            &inputs.scaffold,
            &[organ],
            &inputs.output_dir,
            &mut CopyRegistrar::default(),
            &NoBusyIndicator,
        )
        .unwrap();

    assert_eq!(report.organs[0].organ, "xyz123");
    assert_eq!(
        report.output_files(),
        vec![inputs.output_dir.join("xyz123_transformed_fit1.exf")]
    );
    assert_eq!(group_names(&report.organs[0].output), vec!["xyz123"]);
}

#[test]
fn missing_marker_group_aborts_before_any_organ() {
    let mut scaffold = tetrahedron(1.0, [0.0; 3]);
    let mut names = Field::stored_string("marker_name");
    let mut locations = Field::stored_mesh_location("marker_location", 3);
    scaffold.add_node(100).unwrap();
    names.set_node_string(100, "A").unwrap();
    locations
        .set_node_location(100, MeshLocation::new(1, [0.0; 3]))
        .unwrap();
    scaffold.add_field(names).unwrap();
    scaffold.add_field(locations).unwrap();

    let inputs = Inputs::new(&scaffold);
    let heart = inputs.organ("heart.exf", &tetrahedron(1.0, [0.0; 3]));
    let heart_before = fs::read(&heart).unwrap();
    let mut registrar = CopyRegistrar::default();

    let result = OrganInserter::default().run(
        &inputs.scaffold,
        &[heart.clone()],
        &inputs.output_dir,
        &mut registrar,
        &NoBusyIndicator,
    );

    match result {
        Err(InsertError::Schema(SchemaError::MarkerFieldsNotFound { missing })) => {
            assert_eq!(missing, vec!["group"]);
        }
        other => panic!("expected MarkerFieldsNotFound, got {other:?}"),
    }
    assert!(registrar.aligned.is_empty());
    assert!(!inputs.output_dir.join(MANIFEST_FILE_NAME).exists());
    assert_eq!(fs::read(&heart).unwrap(), heart_before);
}

#[test]
fn rerun_gives_same_outputs_and_groups() {
    let inputs = Inputs::new(&two_marker_scaffold());
    let organs = vec![
        inputs.organ("Colon.exf", &tetrahedron(1.0, [0.0; 3])),
        inputs.organ("lung_left.exf", &tetrahedron(2.0, [0.0; 3])),
    ];
    let inserter = OrganInserter::default();
    let run = || {
        inserter
            .run(
                &inputs.scaffold,
                &organs,
                &inputs.output_dir,
                &mut CopyRegistrar::default(),
                &NoBusyIndicator,
            )
            .unwrap()
    };

    let first = run();
    let first_manifest = manifest_lines(&inputs.output_dir);
    let second = run();

    assert_eq!(first.output_files(), second.output_files());
    for path in second.output_files() {
        assert_eq!(group_names(&path).len(), 1);
    }
    assert_eq!(group_names(&second.organs[1].output), vec!["lung"]);
    assert_eq!(manifest_lines(&inputs.output_dir), first_manifest);
}

#[test]
fn bypassed_organ_inside_output_dir_is_tagged_in_place() {
    let inputs = Inputs::new(&two_marker_scaffold());
    fs::create_dir_all(&inputs.output_dir).unwrap();
    let colon = inputs.output_dir.join("colon.exf");
    save_region(&tetrahedron(1.0, [0.0; 3]), &colon).unwrap();

    let report = OrganInserter::default()
        .run(
            &inputs.scaffold,
            &[colon.clone()],
            &inputs.output_dir,
            &mut CopyRegistrar::default(),
            &NoBusyIndicator,
        )
        .unwrap();

    assert_eq!(report.output_files(), vec![colon.clone()]);
    assert_eq!(group_names(&colon), vec!["colon"]);
}

#[test]
fn failed_fit_leaves_no_manifest_and_releases_busy() {
    let inputs = Inputs::new(&two_marker_scaffold());
    let heart = inputs.organ("heart.exf", &tetrahedron(1.0, [0.0; 3]));
    let busy = RecordingBusy::default();

    let result = OrganInserter::default().run(
        &inputs.scaffold,
        &[heart],
        &inputs.output_dir,
        &mut FailingFit,
        &busy,
    );

    match result {
        Err(InsertError::Registration { organ, source }) => {
            assert_eq!(organ, "heart");
            assert_eq!(source.to_string(), "solver diverged");
        }
        other => panic!("expected a registration failure, got {other:?}"),
    }
    assert_eq!(
        *busy.0.borrow(),
        vec!["busy:heart".to_string(), "ready".to_string()]
    );
    assert!(inputs.output_dir.join("whole_body_marker_coordinates.exnode").exists());
    assert!(!inputs.output_dir.join(MANIFEST_FILE_NAME).exists());
}

#[test]
fn configured_vocabulary_supplies_sources() {
    let inputs = Inputs::new(&two_marker_scaffold());
    let organ = inputs.organ("left_kidney.exf", &tetrahedron(1.0, [0.0; 3]));
    let classifier = OrganClassifier::new(
        vec![OrganEntry::new("kidney").with_source("doi:kidney")],
        Vec::new(),
    );
    let inserter = OrganInserter::new(
        InserterConfig::new()
            .with_classifier(classifier)
            .with_scaffold_source("doi:body"),
    );

    inserter
        .run(
            &inputs.scaffold,
            &[organ],
            &inputs.output_dir,
            &mut CopyRegistrar::default(),
            &NoBusyIndicator,
        )
        .unwrap();

    assert_eq!(
        manifest_lines(&inputs.output_dir)[1..],
        [
            "whole-body,doi:body,whole_body.exf,whole_body.exf".to_string(),
            "kidney,doi:kidney,left_kidney.exf,left_kidney_transformed_fit1.exf".to_string(),
        ]
    );
}

// =============================================================================
// Landmark registration
// =============================================================================

#[test]
fn landmark_registrar_places_organ_in_scaffold_frame() {
    // Scaffold is the organ scaled by 3 and moved; markers sit on its corners.
    let mut scaffold = tetrahedron(3.0, [5.0, -2.0, 1.0]);
    add_markers(&mut scaffold, &CORNER_MARKERS);
    let inputs = Inputs::new(&scaffold);

    let mut organ = tetrahedron(1.0, [0.0; 3]);
    add_markers(&mut organ, &CORNER_MARKERS);
    let heart = inputs.organ("heart.exf", &organ);

    let report = OrganInserter::default()
        .run(
            &inputs.scaffold,
            &[heart],
            &inputs.output_dir,
            &mut LandmarkRegistrar::new(),
            &NoBusyIndicator,
        )
        .unwrap();

    assert_eq!(report.marker_count, 4);
    let output = &report.organs[0].output;
    assert!(inputs.output_dir.join("heart_transformed_align.exf").exists());
    assert_eq!(group_names(output), vec!["heart", "marker"]);

    let region = load_region(output).unwrap();
    let positions = node_positions(&region, "coordinates").unwrap();
    let expected = [
        [5.0, -2.0, 1.0],
        [8.0, -2.0, 1.0],
        [5.0, 1.0, 1.0],
        [5.0, -2.0, 4.0],
    ];
    for ((_, p), e) in positions.iter().zip(expected) {
        assert_relative_eq!(p.x, e[0], epsilon = 1e-6);
        assert_relative_eq!(p.y, e[1], epsilon = 1e-6);
        assert_relative_eq!(p.z, e[2], epsilon = 1e-6);
    }
}
