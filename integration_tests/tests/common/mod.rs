use std::path::PathBuf;
use std::sync::{Arc, Once};

use bevy::prelude::*;
use river_course::{
    build_course_app, ActiveSpawn, MeanderingRiver, PlacedEntity, RiverCenterlineModel,
};

static INIT: Once = Once::new();

pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("test_course_config.json")
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path();

        debug_assert!(
            config_path.exists(),
            "missing test course config at {}",
            config_path.display()
        );

        std::env::set_var("COURSE_CONFIG_PATH", &config_path);
    });
}

pub fn test_app(seed: u64) -> App {
    ensure_test_config();
    let model: Arc<dyn RiverCenterlineModel> = Arc::new(MeanderingRiver::new(seed));
    build_course_app(model, seed)
}

/// Run updates until the active spawn finishes. Returns the frame count.
pub fn drain_spawn(app: &mut App) -> usize {
    let mut frames = 0;
    while app.world.contains_resource::<ActiveSpawn>() {
        app.update();
        frames += 1;
        assert!(frames < 10_000, "spawn never finished");
    }
    frames
}

pub fn placed(app: &mut App) -> Vec<PlacedEntity> {
    let mut query = app.world.query::<&PlacedEntity>();
    let mut placed: Vec<PlacedEntity> = query.iter(&app.world).cloned().collect();
    placed.sort_by(|a, b| {
        a.path_index
            .total_cmp(&b.path_index)
            .then_with(|| a.position.x.total_cmp(&b.position.x))
    });
    placed
}
