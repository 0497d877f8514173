use std::path::{Path, PathBuf};

use kindred::config::LayoutConfig;
use kindred::layout::{ConnectorKind, Diagram, FixedWidthMeasure, LabelKind, NodeRole};
use kindred::{
    FamilyGraph, GraphError, LayoutEngine, LoadError, PersonId, load_family_tree,
    parse_family_tree, save_family_tree, write_family_tree,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(name: &str) -> FamilyGraph {
    load_family_tree(&fixture(name)).expect("fixture loads")
}

fn layout(graph: &FamilyGraph, root: &str) -> Diagram {
    let config = LayoutConfig::default();
    LayoutEngine::new(graph, &config)
        .build(root, &FixedWidthMeasure::default())
        .expect("layout succeeds")
}

fn assert_no_row_overlaps(diagram: &Diagram) {
    for generation in -4..=1 {
        let row = diagram.row(generation);
        for pair in row.windows(2) {
            assert!(
                pair[0].x + pair[0].width <= pair[1].x,
                "{} and {} overlap in generation {generation}",
                pair[0].person,
                pair[1].person
            );
        }
    }
}

#[test]
fn scenario_tree_lays_out_parents_partner_and_children() {
    let graph = load("scenario.xml");
    let diagram = layout(&graph, "1");

    let john = diagram.node("1").expect("root drawn");
    assert_eq!(john.role, NodeRole::Root);
    for parent in ["6", "7"] {
        let node = diagram.node(parent).expect("parent drawn");
        assert!(node.y + node.height < john.y, "{parent} is above the root");
    }

    let jane = diagram.node("2").expect("partner drawn");
    assert_eq!(jane.y, john.y);
    let couple = diagram
        .connectors
        .iter()
        .find(|c| c.kind == ConnectorKind::Couple && c.from.y == john.center_y())
        .expect("couple line between 1 and 2");
    assert_eq!(couple.from.x, john.x + john.width);
    assert_eq!(couple.to.x, jane.x);

    let divorce: Vec<_> = diagram.labels_of(LabelKind::Divorce).collect();
    assert_eq!(divorce.len(), 1);
    assert_eq!(divorce[0].text, "✗ 20/06/2010");
    assert!(divorce[0].y > couple.from.y);

    let children: Vec<&str> = diagram.row(1).iter().map(|n| n.person.as_str()).collect();
    assert_eq!(children, vec!["4", "3", "5"]);

    // Grandparents' marriage carries its location.
    let marriages: Vec<&str> = diagram
        .labels_of(LabelKind::Marriage)
        .map(|l| l.text.as_str())
        .collect();
    assert!(marriages.contains(&"♥ 08/08/1965 Leeds, UK"));
    assert!(marriages.contains(&"♥ 20/06/2000"));

    assert_no_row_overlaps(&diagram);
    assert!(diagram.nodes.iter().all(|n| n.x >= 100.0 && n.y >= 100.0));
}

#[test]
fn blended_family_draws_each_partner_with_their_children() {
    let graph = load("blended.xml");
    assert_eq!(graph.partners("10"), vec![PersonId::from("11"), PersonId::from("12")]);
    assert_eq!(graph.current_partners("10"), vec![PersonId::from("12")]);

    let diagram = layout(&graph, "10");
    let first = diagram.node("11").expect("first partner");
    let second = diagram.node("12").expect("second partner");
    assert!(first.x < second.x);

    let children: Vec<&str> = diagram.row(1).iter().map(|n| n.person.as_str()).collect();
    assert_eq!(children, vec!["14", "13", "15", "16"]);
    assert!(diagram.node("17").is_none(), "single-parent child has no couple line");

    let divorce: Vec<_> = diagram.labels_of(LabelKind::Divorce).collect();
    assert_eq!(divorce.len(), 1);
    assert_eq!(divorce[0].text, "✗ 09/09/1990 Paris, France");
    assert_eq!(diagram.labels_of(LabelKind::Marriage).count(), 2);
    assert_no_row_overlaps(&diagram);
}

#[test]
fn every_person_can_be_the_root() {
    for name in ["scenario.xml", "blended.xml"] {
        let graph = load(name);
        for id in graph.ids() {
            let diagram = layout(&graph, id.as_str());
            assert_eq!(&diagram.root, id);
            assert!(diagram.width > 0.0 && diagram.height > 0.0);
            assert_no_row_overlaps(&diagram);
        }
    }
}

#[test]
fn save_then_load_is_lossless() {
    let graph = load("scenario.xml");
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("saved.xml");
    save_family_tree(&graph, &path).expect("save succeeds");

    let reloaded = load_family_tree(&path).expect("reload succeeds");
    assert_eq!(write_family_tree(&reloaded), write_family_tree(&graph));
    assert_eq!(reloaded.len(), graph.len());
    for person in graph.people() {
        let other = reloaded.person(person.id().as_str()).expect("same ids");
        assert_eq!(other.display_name(), person.display_name());
        assert_eq!(other.birth_date(), person.birth_date());
        assert_eq!(other.death_date(), person.death_date());
        assert_eq!(other.parent1(), person.parent1());
        assert_eq!(other.parent2(), person.parent2());
        assert_eq!(other.descendants(), person.descendants());
        assert_eq!(other.marriages(), person.marriages());
    }
}

#[test]
fn failed_save_leaves_existing_file_untouched() {
    let graph = load("scenario.xml");
    let dir = tempfile::tempdir().expect("tempdir");
    let missing_dir = dir.path().join("nope").join("tree.xml");
    assert!(save_family_tree(&graph, &missing_dir).is_err());
    assert!(!missing_dir.exists());

    let target = dir.path().join("tree.xml");
    std::fs::write(&target, "previous contents").expect("seed file");
    save_family_tree(&graph, &target).expect("overwrite succeeds");
    let text = std::fs::read_to_string(&target).expect("read back");
    assert!(text.starts_with("<?xml"));
    let leftovers = std::fs::read_dir(dir.path()).expect("list dir").count();
    assert_eq!(leftovers, 1, "temporary file was persisted or removed");
}

#[test]
fn edits_survive_a_round_trip() {
    let mut graph = load("blended.xml");
    let id = graph.generate_id();
    assert_eq!(id, "18");
    graph
        .add_person(kindred::Person::new(id.clone(), "Zoe"))
        .expect("new id");
    graph.set_parents(id.as_str(), Some("12"), Some("10")).expect("valid parents");
    graph.rename("13", "Uma Jr").expect("known person");
    assert_eq!(graph.remove_marriage("10", "11"), 2);

    let reparsed = parse_family_tree(&write_family_tree(&graph)).expect("valid document");
    let zoe = reparsed.person("18").expect("saved");
    assert_eq!(zoe.parent1().map(PersonId::as_str), Some("12"));
    assert_eq!(zoe.parent2().map(PersonId::as_str), Some("10"));
    assert_eq!(reparsed.person("13").map(|p| p.display_name()), Some("Uma Jr"));
    assert_eq!(reparsed.partners("10"), vec![PersonId::from("12")]);
    assert!(reparsed.shared_descendants("10", "12").contains(&PersonId::from("18")));
}

#[test]
fn load_errors_are_reported() {
    let missing = load_family_tree(Path::new("/definitely/not/here.xml")).unwrap_err();
    assert!(matches!(missing, LoadError::Io { .. }));

    let bad_date = parse_family_tree(
        r#"<familyTree><persons><person id="1" name="A" birthDate="1/2/1990"/></persons></familyTree>"#,
    )
    .unwrap_err();
    assert!(matches!(bad_date, LoadError::Date(_)));

    let duplicate = parse_family_tree(
        r#"<familyTree><persons><person id="1"/><person id="1"/></persons></familyTree>"#,
    )
    .unwrap_err();
    assert!(matches!(
        duplicate,
        LoadError::Graph(GraphError::DuplicateId(ref id)) if id == "1"
    ));

    let wrong_root = parse_family_tree("<people/>").unwrap_err();
    assert!(matches!(wrong_root, LoadError::UnexpectedRoot(ref tag) if tag == "people"));

    assert!(matches!(
        parse_family_tree("<familyTree><persons>").unwrap_err(),
        LoadError::Xml(_)
    ));
}

#[test]
fn provisional_layout_resumes_with_host_measurements() {
    let graph = load("scenario.xml");
    let config = LayoutConfig::default();
    let provisional = LayoutEngine::new(&graph, &config)
        .build_provisional("1")
        .expect("root exists");
    let measure = FixedWidthMeasure {
        char_width: 6.0,
        line_height: 16.0,
    };
    let sizes: Vec<_> = provisional
        .pending_labels()
        .iter()
        .map(|l| kindred::TextMeasure::measure(&measure, &l.text))
        .collect();
    let diagram = provisional.finish(&sizes).expect("sizes match");
    assert_eq!(diagram.labels.len(), sizes.len());
    assert!(diagram.labels.iter().all(|l| l.height == 16.0));
}
