use std::collections::BTreeMap;
use std::process::ExitCode;

use glam::DVec2;
use hexboard::geometry::{boundary_edges, CellCoord};
use hexboard::persist::{draft, FileStore, LoadSource, ProjectKey};
use hexboard::{Editor, EditorConfig, LoadState};

const DEFAULT_OWNER: &str = "local";

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(project_id) = args.get(1) else {
        let program = args.first().map_or("hexboard", String::as_str);
        eprintln!("usage: {program} <project-id> [owner-id]");
        return ExitCode::FAILURE;
    };
    let owner_id = args.get(2).map(String::as_str).unwrap_or(DEFAULT_OWNER);

    let config = EditorConfig::load();
    let Some(root) = config.storage_root() else {
        eprintln!("no storage directory available; set persistence.storage_root");
        return ExitCode::FAILURE;
    };
    log::info!("storing maps under {}", root.display());

    let drafts = draft::default_dir().map(draft::DraftCache::new);
    let key = ProjectKey::new(project_id.as_str(), owner_id);
    let mut editor = Editor::open(FileStore::new(root), key, &config, drafts);
    if let LoadState::Failed(reason) = editor.load_state() {
        eprintln!("could not load {owner_id}/{project_id}: {reason}");
        return ExitCode::FAILURE;
    }
    editor.set_screen_size(DVec2::new(1280.0, 720.0));
    editor.center_view();

    if editor.load_source() == Some(LoadSource::Fresh) {
        editor.request_save();
    }
    match editor.flush() {
        Ok(Some(version)) => log::info!("saved version {version}"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("save failed: {e}");
            return ExitCode::FAILURE;
        }
    }

    let grid = editor.grid();
    let mut cells: Vec<CellCoord> = grid.allowed_cells().copied().collect();
    cells.sort();
    let outline = boundary_edges(&grid.layout(), &cells);

    let mut per_layer: BTreeMap<&str, usize> = BTreeMap::new();
    for tile in grid.tiles() {
        *per_layer.entry(tile.layer.as_str()).or_default() += 1;
    }

    println!("map {owner_id}/{project_id}");
    println!("  source:   {:?}", editor.load_source().unwrap_or(LoadSource::Fresh));
    println!("  grid:     {}", grid.grid_type().as_str());
    println!("  version:  {}", grid.version());
    println!("  cells:    {} ({} outline edges)", cells.len(), outline.len());
    for layer in grid.layers().iter() {
        let count = per_layer.get(layer.id.as_str()).copied().unwrap_or(0);
        println!("  layer {:<12} {:<6} {count} tiles", layer.name, layer.kind.as_str());
    }
    let scale = editor.machine().viewport.scale;
    println!("  fit scale at 1280x720: {scale:.3}");

    ExitCode::SUCCESS
}
