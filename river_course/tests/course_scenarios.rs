use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use river_course::{
    course_config::{PlacementConfig, SpatialConfig},
    create_layout,
    patterns::PlacementEngine,
    sample_river, BankSolverConfig, ComposedScene, CourseConfig, EntityCatalog, EntityRule,
    MeanderingRiver, PatternAlgorithm, PatternConfig, PlacementZone, RiverLayout,
    StraightChannel,
};

fn single_track_config(pattern: &str, scene_length: f32) -> CourseConfig {
    CourseConfig::from_json_str(&format!(
        r#"{{
            "entities": [{{ "id": "marker", "radius": [0.1, 0.1] }}],
            "tracks": [{{
                "name": "only",
                "generation": {{
                    "mode": "staged",
                    "patterns": [{pattern}],
                    "stages": [{{
                        "progress": [0.0, 1.0],
                        "scenes": [{{ "length": [{scene_length}, {scene_length}], "patterns": ["p"] }}]
                    }}]
                }}
            }}]
        }}"#
    ))
    .expect("scenario config parses")
}

fn assert_no_overlaps(layout: &RiverLayout) {
    for (i, a) in layout.placements.iter().enumerate() {
        for b in &layout.placements[i + 1..] {
            let distance = a.position.distance(b.position);
            assert!(
                distance >= a.radius + b.radius - 1e-4,
                "{} and {} overlap: {distance} < {}",
                a.entity,
                b.entity,
                a.radius + b.radius
            );
        }
    }
}

#[test]
fn straight_channel_samples_uniform_arc_lengths() {
    let channel = StraightChannel::new(0.0, 50.0);
    let points = sample_river(&channel, 0.0, 1000.0, 10.0, &BankSolverConfig::default())
        .expect("straight channel samples");
    assert_eq!(points.len(), 101);
    for (i, point) in points.iter().enumerate() {
        assert_eq!(point.arc_length, i as f32 * 10.0);
        assert!((point.bank_dist - 25.0).abs() < 1e-4);
    }
}

#[test]
fn builtin_layouts_never_overlap() {
    let config = CourseConfig::builtin();
    let catalog = EntityCatalog::from_rules(&config.entities);
    for seed in [1u64, 2, 3, 40, 500] {
        let river = MeanderingRiver::new(seed * 31);
        let layout = create_layout(&river, &config, &catalog, seed, config.extent.range())
            .expect("builtin layout builds");
        assert!(!layout.placements.is_empty());
        assert_no_overlaps(&layout);
    }
}

#[test]
fn layouts_are_reproducible() {
    let config = CourseConfig::builtin();
    let catalog = EntityCatalog::from_rules(&config.entities);
    let river = MeanderingRiver::new(8);
    let a = create_layout(&river, &config, &catalog, 1234, (0.0, 1500.0)).unwrap();
    let b = create_layout(&river, &config, &catalog, 1234, (0.0, 1500.0)).unwrap();
    assert_eq!(a.points, b.points);
    assert_eq!(a.placements, b.placements);
    assert_eq!(a.metrics, b.metrics);
}

#[test]
fn reversed_course_still_places() {
    let config = CourseConfig::builtin();
    let catalog = EntityCatalog::from_rules(&config.entities);
    let river = MeanderingRiver::new(4);
    let layout = create_layout(&river, &config, &catalog, 9, (1200.0, 0.0)).unwrap();
    assert!(layout.points.first().unwrap().z() > layout.points.last().unwrap().z());
    assert!(!layout.placements.is_empty());
    assert_no_overlaps(&layout);
}

#[test]
fn scatter_honours_min_count() {
    let channel = StraightChannel::new(0.0, 50.0);
    let points = sample_river(&channel, 0.0, 1000.0, 2.0, &BankSolverConfig::default()).unwrap();
    let catalog = EntityCatalog::from_rules(&[EntityRule::new("rock", 1.0)]);
    let placement = PlacementConfig::default();
    let pattern = PatternConfig {
        name: "rocks".to_string(),
        entity: "rock".to_string(),
        density: [1.0, 1.0],
        zone: PlacementZone::Middle,
        min_count: Some(5),
        max_count: None,
        algorithm: PatternAlgorithm::Scatter,
    };
    let scene = ComposedScene {
        name: "whole".to_string(),
        start_arc: 0.0,
        end_arc: 1000.0,
        patterns: vec!["rocks".to_string()],
    };

    for seed in 0..50 {
        let mut engine = PlacementEngine::new(
            &channel,
            &points,
            &catalog,
            &placement,
            &SpatialConfig::default(),
            (0.0, 1000.0),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let placed = engine.place_pattern("obstacles", &pattern, &scene, &mut rng);
        assert!(placed >= 5, "seed {seed} placed {placed}");
    }
}

#[test]
fn gate_layout_forms_two_passable_gates() {
    let config = single_track_config(
        r#"{ "name": "p", "entity": "marker", "density": [1.0, 1.0], "zone": "near_shore",
             "min_count": 4, "max_count": 4, "algorithm": { "kind": "gate" } }"#,
        1000.0,
    );
    let catalog = EntityCatalog::from_rules(&config.entities);
    let channel = StraightChannel::new(0.0, 60.0);
    let layout = create_layout(&channel, &config, &catalog, 5, (0.0, 1000.0)).unwrap();

    assert_eq!(layout.placements.len(), 4);
    let mut indices: Vec<f32> = layout.placements.iter().map(|p| p.path_index).collect();
    indices.dedup();
    assert_eq!(indices.len(), 2);
    for index in indices {
        let sides: Vec<f32> = layout
            .placements
            .iter()
            .filter(|p| p.path_index == index)
            .map(|p| p.offset.signum())
            .collect();
        assert_eq!(sides.len(), 2);
        assert_ne!(sides[0], sides[1]);
    }
}

#[test]
fn constant_density_converges_to_expected_count() {
    let config = single_track_config(
        r#"{ "name": "p", "entity": "marker", "density": [2.0, 2.0], "zone": "near_shore",
             "algorithm": { "kind": "scatter" } }"#,
        130.0,
    );
    let catalog = EntityCatalog::from_rules(&config.entities);
    let channel = StraightChannel::new(0.0, 200.0);

    let runs = 200;
    let mut total = 0u32;
    for seed in 0..runs {
        let layout = create_layout(&channel, &config, &catalog, seed, (0.0, 1000.0)).unwrap();
        total += layout.metrics.placed;
    }
    let mean = total as f32 / runs as f32;
    assert!((mean - 20.0).abs() < 0.5, "mean placed {mean}");
}
