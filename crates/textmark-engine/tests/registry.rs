use pretty_assertions::assert_eq;
use textmark_engine::anchoring::{
    AnchorError, Direction, Endpoint, PartialAtomicSubtreeWarning, PathSelector, TargetSelector,
    resolve,
};
use textmark_engine::markup::{parse, to_markup};
use textmark_engine::profile::DocumentProfile;
use textmark_engine::registry::{
    AnnotationId, AnnotationRegistry, FragmentTarget, InteractionMode, RegistryError,
};
use textmark_engine::tree::{Document, DocumentTree, NodeId};

const ANNOTATIONS: &str = r#"[
    {
        "type": "FragmentTarget",
        "id": "a",
        "source": "paper.html",
        "selector": [
            {"type": "TextQuoteSelector", "exact": "paragraph"},
            {"type": "PathSelector", "startPath": "char(/html/body/p,6)", "endPath": "char(/html/body/p,15)"}
        ]
    },
    {
        "type": "FragmentTarget",
        "id": "b",
        "source": "paper.html",
        "selector": [{
            "type": "PathSelector",
            "startPath": "node(/html/body/h1)",
            "endPath": "char(/html/body/p[2],17)",
            "refinedBy": {"type": "ListSelector", "vals": [
                {"type": "PathSelector", "startPath": "node(/html/body/h1)", "endPath": "after-node(/html/body/h1)"},
                {"type": "PathSelector", "startPath": "char(/html/body/p[2],7)", "endPath": "char(/html/body/p[2],17)"}
            ]}
        }]
    },
    {
        "type": "FragmentTarget",
        "id": "c",
        "source": "paper.html",
        "selector": [{"type": "PathSelector", "startPath": "node(/html/body/section)", "endPath": "after-node(/html/body/section)"}]
    },
    {
        "id": "a",
        "source": "paper.html",
        "selector": [{"type": "PathSelector", "startPath": "node(/html/body/h1)", "endPath": "after-node(/html/body/h1)"}]
    }
]"#;

fn paper() -> Document {
    let markup = std::fs::read_to_string(format!(
        "{}/tests/fixtures/paper.html",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap();
    parse(&markup)
}

fn selector(start: &str, end: &str) -> PathSelector {
    PathSelector::new(start.parse().unwrap(), end.parse().unwrap())
}

fn loaded() -> (Document, AnnotationRegistry<NodeId>) {
    let mut doc = paper();
    let mut registry: AnnotationRegistry<NodeId> = AnnotationRegistry::new(DocumentProfile::default());
    let targets: Vec<FragmentTarget> = serde_json::from_str(ANNOTATIONS).unwrap();
    registry.load(&mut doc, targets);
    (doc, registry)
}

fn path_target(registry: &AnnotationRegistry<NodeId>, id: &str) -> TargetSelector {
    registry
        .get(&id.into())
        .and_then(FragmentTarget::path_selector)
        .cloned()
        .unwrap()
}

#[test]
fn batch_load_skips_failures_and_duplicates() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut doc = paper();
    let mut registry: AnnotationRegistry<NodeId> = AnnotationRegistry::new(DocumentProfile::default());
    let targets: Vec<FragmentTarget> = serde_json::from_str(ANNOTATIONS).unwrap();

    let report = registry.load(&mut doc, targets);

    assert_eq!(report.loaded, vec![AnnotationId::from("a"), AnnotationId::from("b")]);
    assert!(!report.is_clean());
    assert_eq!(report.failed.len(), 2);
    assert!(matches!(
        &report.failed[0],
        (id, RegistryError::Anchor(AnchorError::AnchorResolution { .. })) if id.as_str() == "c"
    ));
    assert!(matches!(
        &report.failed[1],
        (id, RegistryError::DuplicateAnnotation(_)) if id.as_str() == "a"
    ));
    assert!(report.warnings.is_empty());
    assert_eq!(registry.len(), 2);
}

#[test]
fn quotes_join_fragments_with_a_space() {
    let (doc, registry) = loaded();

    assert_eq!(registry.quote(&doc, &"a".into()).unwrap(), "paragraph");
    assert_eq!(registry.quote(&doc, &"b".into()).unwrap(), "Title emphasised");
    assert!(matches!(
        registry.quote(&doc, &"c".into()),
        Err(RegistryError::UnknownAnnotation(_))
    ));
}

#[test]
fn markers_carry_the_annotation_id() {
    let (doc, registry) = loaded();

    let markers = registry.markers(&"b".into()).unwrap();

    assert_eq!(markers.len(), 2);
    for marker in markers {
        assert_eq!(doc.tag_name(marker), Some("annotation-highlight"));
        assert_eq!(doc.attribute(marker, "data-annotation"), Some("b"));
    }
}

#[test]
fn removing_every_annotation_restores_the_document() {
    let pristine = {
        let doc = paper();
        to_markup(&doc, doc.root())
    };
    let (mut doc, mut registry) = loaded();
    assert_ne!(to_markup(&doc, doc.root()), pristine);

    let ids: Vec<AnnotationId> = registry.targets().map(|target| target.id.clone()).collect();
    for id in &ids {
        registry.remove(&mut doc, id).unwrap();
    }

    assert!(registry.is_empty());
    assert_eq!(to_markup(&doc, doc.root()), pristine);
}

#[test]
fn partial_formula_ranges_wrap_the_whole_formula() {
    let mut doc = paper();
    let mut registry: AnnotationRegistry<NodeId> = AnnotationRegistry::new(DocumentProfile::default());
    let target = FragmentTarget::new(
        "m".into(),
        "paper.html",
        selector("char(/html/body/p[3],4)", "char(/html/body/p[3],10)").into(),
    );

    let warnings = registry.add(&mut doc, target).unwrap();

    assert_eq!(
        warnings,
        vec![PartialAtomicSubtreeWarning {
            root_tag: "math".to_string()
        }]
    );
    assert_eq!(registry.quote(&doc, &"m".into()).unwrap(), "ula x=1");
}

#[test]
fn create_encodes_the_live_range() {
    let mut doc = paper();
    let mut registry: AnnotationRegistry<NodeId> = AnnotationRegistry::new(DocumentProfile::default());
    let wanted = selector("node(/html/body/p[2])", "char(/html/body/p[2],6)");
    let range = resolve(&doc, registry.profile(), &wanted).unwrap();

    let id = registry.create(&mut doc, "paper.html", &range).unwrap();

    assert_eq!(path_target(&registry, id.as_str()), TargetSelector::Path(wanted));
    assert_eq!(registry.quote(&doc, &id).unwrap(), "Second");
}

#[test]
fn reselect_commit_replaces_the_target() {
    let (mut doc, mut registry) = loaded();
    let id = AnnotationId::from("a");
    registry.start_reselect(&mut doc, &id).unwrap();
    assert_eq!(registry.mode(), &InteractionMode::Reselect(id.clone()));

    let wanted = selector("node(/html/body/p)", "char(/html/body/p,5)");
    let range = resolve(&doc, registry.profile(), &wanted).unwrap();
    registry.commit_range(&mut doc, &range).unwrap();

    assert_eq!(registry.mode(), &InteractionMode::Idle);
    assert_eq!(path_target(&registry, "a"), TargetSelector::Path(wanted));
    assert_eq!(registry.quote(&doc, &id).unwrap(), "First");
}

#[test]
fn cancelling_reselect_restores_the_committed_target() {
    let (mut doc, mut registry) = loaded();
    let id = AnnotationId::from("a");
    let committed = path_target(&registry, "a");
    registry.start_reselect(&mut doc, &id).unwrap();

    let moved = registry
        .adjust(&mut doc, &id, 0, Endpoint::Start, Direction::Right)
        .unwrap();
    assert_eq!(moved.start.to_string(), "char(/html/body/p,7)");
    assert_eq!(registry.quote(&doc, &id).unwrap(), "aragraph");

    registry.cancel(&mut doc).unwrap();

    assert_eq!(registry.mode(), &InteractionMode::Idle);
    assert_eq!(path_target(&registry, "a"), committed);
    assert_eq!(registry.quote(&doc, &id).unwrap(), "paragraph");
}

#[test]
fn failed_adjustment_leaves_no_detached_markers() {
    let mut doc = parse("<html><body><p>Hello World</p></body></html>");
    let mut registry: AnnotationRegistry<NodeId> = AnnotationRegistry::new(DocumentProfile::default());
    let id = AnnotationId::from("h");
    let target = FragmentTarget::new(
        id.clone(),
        "hello.html",
        selector("char(/html/body/p,2)", "char(/html/body/p,7)").into(),
    );
    registry.add(&mut doc, target).unwrap();

    let marker = registry.markers(&id).unwrap()[0];
    let p = doc.parent(marker).unwrap();
    let body = doc.parent(p).unwrap();
    let div = doc.create_element("div");
    doc.insert_child(body, 0, div);
    doc.insert_child(div, 0, p);

    let result = registry.adjust(&mut doc, &id, 0, Endpoint::Start, Direction::Left);

    assert!(matches!(
        result,
        Err(RegistryError::Anchor(AnchorError::AnchorResolution { .. }))
    ));
    assert_eq!(registry.markers(&id), Some(Vec::new()));
    assert_eq!(
        to_markup(&doc, doc.root()),
        "<html><body><div><p>Hello World</p></div></body></html>"
    );
}

#[test]
fn starting_the_active_mode_again_toggles_it_off() {
    let (mut doc, mut registry) = loaded();
    let id = AnnotationId::from("a");

    registry.start_reselect(&mut doc, &id).unwrap();
    registry.start_reselect(&mut doc, &id).unwrap();
    assert_eq!(registry.mode(), &InteractionMode::Idle);

    registry.start_add_fragment(&mut doc, &id).unwrap();
    registry.start_add_fragment(&mut doc, &id).unwrap();
    assert_eq!(registry.mode(), &InteractionMode::Idle);
}

#[test]
fn starting_a_different_mode_cancels_the_active_one() {
    let (mut doc, mut registry) = loaded();
    let id = AnnotationId::from("a");
    registry.start_reselect(&mut doc, &id).unwrap();
    registry
        .adjust(&mut doc, &id, 0, Endpoint::End, Direction::Left)
        .unwrap();
    assert_eq!(registry.quote(&doc, &id).unwrap(), "paragrap");

    registry.start_add_fragment(&mut doc, &"b".into()).unwrap();

    assert_eq!(registry.mode(), &InteractionMode::AddFragment("b".into()));
    assert_eq!(registry.quote(&doc, &id).unwrap(), "paragraph");
}

#[test]
fn add_fragment_commit_promotes_to_a_discontinuous_target() {
    let (mut doc, mut registry) = loaded();
    let id = AnnotationId::from("a");
    let first = path_target(&registry, "a").fragments()[0].clone();
    registry.start_add_fragment(&mut doc, &id).unwrap();

    let second = selector("node(/html/body/p[2])", "char(/html/body/p[2],6)");
    let range = resolve(&doc, registry.profile(), &second).unwrap();
    registry.commit_range(&mut doc, &range).unwrap();

    let target = path_target(&registry, "a");
    assert!(matches!(target, TargetSelector::Discontinuous(_)));
    assert_eq!(target.fragments(), &[first, second]);
    assert_eq!(registry.quote(&doc, &id).unwrap(), "paragraph Second");
    assert_eq!(registry.mode(), &InteractionMode::Idle);
}

#[test]
fn mode_operations_need_an_active_mode() {
    let (mut doc, mut registry) = loaded();

    assert!(matches!(registry.cancel(&mut doc), Err(RegistryError::NoActiveMode)));
    assert!(matches!(registry.commit(), Err(RegistryError::NoActiveMode)));
    assert!(matches!(
        registry.start_reselect(&mut doc, &"missing".into()),
        Err(RegistryError::UnknownAnnotation(_))
    ));
}

#[test]
fn removing_the_mode_target_clears_the_mode() {
    let (mut doc, mut registry) = loaded();
    let id = AnnotationId::from("b");
    registry.start_add_fragment(&mut doc, &id).unwrap();

    registry.remove(&mut doc, &id).unwrap();

    assert_eq!(registry.mode(), &InteractionMode::Idle);
    assert!(registry.get(&id).is_none());
}

#[test]
fn saved_targets_keep_their_json_shape() {
    let (_, registry) = loaded();

    let saved: Vec<&FragmentTarget> = registry.targets().collect();

    insta::assert_json_snapshot!(saved[0], @r#"
    {
      "type": "FragmentTarget",
      "id": "a",
      "source": "paper.html",
      "selector": [
        {
          "type": "PathSelector",
          "startPath": "char(/html/body/p,6)",
          "endPath": "char(/html/body/p,15)"
        }
      ]
    }
    "#);
}
