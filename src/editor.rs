use std::time::Instant;

use glam::DVec2;
use winit::keyboard::KeyCode;

use crate::config::EditorConfig;
use crate::edit::{Edit, InputState, InteractionMachine, Tool};
use crate::geometry::Rect;
use crate::map::{GridModel, LayerId, MapConfiguration, MapDefaults, Rejection};
use crate::persist::{
    reconcile, DraftCache, DraftChoice, LoadSource, MapRepository, MapStore, ProjectKey, SaveQueue,
    StoreError,
};
use crate::view::{ViewTransform, Viewport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Ready,
    /// Load failed; the previous in-memory map is untouched and saving is
    /// paused until [`Editor::retry_load`] succeeds.
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveEvent {
    Saved { version: u64 },
    Failed(String),
}

/// One open map: the grid model, the interaction machine driving it, and
/// the persistence pipeline behind it.
pub struct Editor<S: MapStore> {
    grid: GridModel,
    machine: InteractionMachine,
    repo: MapRepository<S>,
    queue: SaveQueue<MapConfiguration>,
    drafts: Option<DraftCache>,
    load_state: LoadState,
    source: Option<LoadSource>,
    /// Grid revision last handed to the save queue.
    queued_revision: u64,
    screen_size: DVec2,
    padding: f64,
}

impl<S: MapStore> Editor<S> {
    /// Open `key` from `store` and load it straight away.
    pub fn open(store: S, key: ProjectKey, config: &EditorConfig, drafts: Option<DraftCache>) -> Self {
        let viewport = Viewport::with_limits(config.viewport.min_scale, config.viewport.max_scale);
        let machine = InteractionMachine::new(InputState::new(config.key_bindings.clone()), viewport)
            .with_zoom_step(config.viewport.zoom_step)
            .with_pointer_logging(config.debug.log_pointer);
        let grid = GridModel::from_config(MapConfiguration::new(&config.defaults));
        let queued_revision = grid.revision();
        let mut editor = Self {
            grid,
            machine,
            repo: MapRepository::new(store, key, config.defaults.clone()),
            queue: SaveQueue::new(config.persistence.save_debounce()),
            drafts: drafts.filter(|_| config.persistence.draft_cache),
            load_state: LoadState::Ready,
            source: None,
            queued_revision,
            screen_size: DVec2::ZERO,
            padding: config.viewport.padding,
        };
        editor.retry_load();
        editor
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    /// Direct model access for edits outside the pointer flow (layers,
    /// styling, appearance). Changes are picked up by the next `tick`.
    /// `None` while the map has not loaded.
    pub fn grid_mut(&mut self) -> Option<&mut GridModel> {
        if self.refuse_edit() {
            return None;
        }
        Some(&mut self.grid)
    }

    /// Edits are refused until a load succeeds: saving is paused meanwhile
    /// and the next successful load replaces the grid, so anything done to
    /// the placeholder map would be lost.
    fn refuse_edit(&mut self) -> bool {
        if self.load_state == LoadState::Ready {
            return false;
        }
        self.grid.set_status(Rejection::NotLoaded);
        true
    }

    pub fn machine(&self) -> &InteractionMachine {
        &self.machine
    }

    pub fn repository(&self) -> &MapRepository<S> {
        &self.repo
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn load_source(&self) -> Option<LoadSource> {
        self.source
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.grid.revision() != self.queued_revision || !self.queue.is_idle()
    }

    // Loading

    /// (Re)load from storage. On failure the current map stays as it is.
    pub fn retry_load(&mut self) -> bool {
        let loaded = match self.repo.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("loading {} failed: {e}", self.repo.key());
                self.load_state = LoadState::Failed(e.to_string());
                return false;
            }
        };

        let draft = self.drafts.as_ref().and_then(|d| d.load(self.repo.key()));
        let (config, choice) = reconcile(loaded.config, draft);
        match choice {
            DraftChoice::Draft => log::info!("restoring unsaved draft for {}", self.repo.key()),
            DraftChoice::Stored => {
                log::info!("discarding stale draft for {}", self.repo.key());
                if let Some(drafts) = &self.drafts {
                    drafts.clear(self.repo.key());
                }
            }
            DraftChoice::NoDraft => {}
        }

        self.grid = GridModel::from_config(config);
        self.queued_revision = self.grid.revision();
        if choice == DraftChoice::Draft {
            self.queue.request(self.grid.to_config(), Instant::now());
        }
        self.source = Some(loaded.source);
        self.load_state = LoadState::Ready;
        self.center_view();
        true
    }

    // View

    pub fn set_screen_size(&mut self, size: DVec2) {
        self.screen_size = size;
    }

    /// Fit the allowed cells into the screen.
    pub fn center_view(&mut self) {
        if self.screen_size.x <= 0.0 || self.screen_size.y <= 0.0 {
            return;
        }
        let layout = self.grid.layout();
        if let Some(bounds) = layout.bounds(self.grid.allowed_cells()) {
            self.machine
                .viewport
                .center_on(bounds, self.screen_size, self.padding);
        }
    }

    /// Regenerate the default cell set, dropping every tile.
    pub fn reset(&mut self, defaults: &MapDefaults) {
        if self.refuse_edit() {
            return;
        }
        self.grid.reset(defaults);
        self.center_view();
    }

    pub fn on_animation_frame(&mut self) -> Option<ViewTransform> {
        self.machine.on_animation_frame()
    }

    // Input

    pub fn pointer_down(&mut self, screen: DVec2) -> Vec<Edit> {
        if self.refuse_edit() {
            return Vec::new();
        }
        self.machine.pointer_down(screen, &mut self.grid)
    }

    pub fn pointer_move(&mut self, screen: DVec2) -> Vec<Edit> {
        self.machine.pointer_move(screen, &mut self.grid)
    }

    pub fn pointer_up(&mut self, screen: DVec2) -> Vec<Edit> {
        self.machine.pointer_up(screen, &mut self.grid)
    }

    pub fn pointer_leave(&mut self) -> Vec<Edit> {
        self.machine.pointer_leave()
    }

    pub fn wheel(&mut self, screen: DVec2, notches: f64) {
        self.machine.wheel(screen, notches);
    }

    pub fn key(&mut self, code: KeyCode, pressed: bool) -> Vec<Edit> {
        // Releases still go through so no key stays held
        if pressed && self.refuse_edit() {
            return Vec::new();
        }
        self.machine.key(code, pressed, &mut self.grid)
    }

    pub fn focus_lost(&mut self) -> Vec<Edit> {
        self.machine.focus_lost(&mut self.grid)
    }

    pub fn begin_palette_drag(&mut self, tile_type: &str, screen: DVec2) {
        if self.refuse_edit() {
            return;
        }
        self.machine.begin_palette_drag(tile_type, screen);
    }

    pub fn arm(&mut self, tool: Tool) -> bool {
        if self.refuse_edit() {
            return false;
        }
        self.machine.arm(tool, &mut self.grid)
    }

    pub fn set_active_layer(&mut self, id: &LayerId) -> bool {
        if self.refuse_edit() {
            return false;
        }
        self.machine.set_active_layer(id, &mut self.grid)
    }

    pub fn set_delete_zone(&mut self, zone: Option<Rect>) {
        self.machine.set_delete_zone(zone);
    }

    // Saving

    fn queue_edits(&mut self, now: Instant) {
        let revision = self.grid.revision();
        if revision != self.queued_revision {
            self.queued_revision = revision;
            self.queue.request(self.grid.to_config(), now);
        }
    }

    /// Drive persistence: queue new edits and dispatch a save when due.
    pub fn tick(&mut self, now: Instant) -> Option<SaveEvent> {
        if self.load_state != LoadState::Ready {
            return None;
        }
        self.queue_edits(now);
        let payload = self.queue.poll(now)?;

        if let Some(drafts) = &self.drafts {
            drafts.store(self.repo.key(), &payload);
        }
        match self.repo.save(&payload) {
            Ok(saved) => {
                self.grid.mark_saved(saved.version, Some(saved.updated_at));
                self.queue.complete(Ok(()), now);
                if !self.queue.has_pending() {
                    if let Some(drafts) = &self.drafts {
                        drafts.clear(self.repo.key());
                    }
                }
                Some(SaveEvent::Saved {
                    version: saved.version,
                })
            }
            Err(e) => {
                log::warn!("saving {} failed, will retry: {e}", self.repo.key());
                self.queue.complete(Err(payload), now);
                Some(SaveEvent::Failed(e.to_string()))
            }
        }
    }

    /// Re-dispatch a failed save now.
    pub fn retry_save(&mut self, now: Instant) -> Option<SaveEvent> {
        self.queue.retry(now);
        self.tick(now)
    }

    /// Queue the whole map for saving even if nothing changed since load.
    pub fn request_save(&mut self) {
        self.queued_revision = self.grid.revision();
        self.queue.request(self.grid.to_config(), Instant::now());
    }

    /// Save outstanding edits immediately, skipping the debounce.
    pub fn flush(&mut self) -> Result<Option<u64>, StoreError> {
        let now = Instant::now();
        self.queue_edits(now);
        self.queue.retry(now);
        match self.tick(now) {
            Some(SaveEvent::Saved { version }) => Ok(Some(version)),
            Some(SaveEvent::Failed(msg)) => Err(StoreError::Transport(msg)),
            None => Ok(None),
        }
    }
}
